use std::fmt::Display;

use crate::position::Position;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Single-character tokens
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Minus,
    Plus,
    Slash,
    Star,

    // One or two character tokens
    Equal,
    EqualEqual,
    BangEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Literals
    Identifier(String),
    String(String),
    Number(f64),

    // Keywords
    Declarar,
    Variavel,
    Funcao,
    Se,
    Senao,
    Retorne,
    Verdadeiro,
    Falso,
    Repita,
    Enquanto,
    De,
    Ate,

    // End of file
    Eof,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::LeftParen => write!(f, "("),
            TokenType::RightParen => write!(f, ")"),
            TokenType::LeftBrace => write!(f, "{{"),
            TokenType::RightBrace => write!(f, "}}"),
            TokenType::LeftBracket => write!(f, "["),
            TokenType::RightBracket => write!(f, "]"),
            TokenType::Comma => write!(f, ","),
            TokenType::Colon => write!(f, ":"),
            TokenType::Semicolon => write!(f, ";"),
            TokenType::Dot => write!(f, "."),
            TokenType::Minus => write!(f, "-"),
            TokenType::Plus => write!(f, "+"),
            TokenType::Slash => write!(f, "/"),
            TokenType::Star => write!(f, "*"),
            TokenType::Equal => write!(f, "="),
            TokenType::EqualEqual => write!(f, "=="),
            TokenType::BangEqual => write!(f, "!="),
            TokenType::Greater => write!(f, ">"),
            TokenType::GreaterEqual => write!(f, ">="),
            TokenType::Less => write!(f, "<"),
            TokenType::LessEqual => write!(f, "<="),
            TokenType::Identifier(name) => write!(f, "identifier {name}"),
            TokenType::String(s) => write!(f, "string '{s}'"),
            TokenType::Number(n) => write!(f, "number {n}"),
            TokenType::Declarar => write!(f, "declarar"),
            TokenType::Variavel => write!(f, "variavel"),
            TokenType::Funcao => write!(f, "funcao"),
            TokenType::Se => write!(f, "se"),
            TokenType::Senao => write!(f, "senao"),
            TokenType::Retorne => write!(f, "retorne"),
            TokenType::Verdadeiro => write!(f, "Verdadeiro"),
            TokenType::Falso => write!(f, "Falso"),
            TokenType::Repita => write!(f, "repita"),
            TokenType::Enquanto => write!(f, "enquanto"),
            TokenType::De => write!(f, "de"),
            TokenType::Ate => write!(f, "ate"),
            TokenType::Eof => write!(f, "end of input"),
        }
    }
}

/// Exact-match keyword table. Anything else alphabetic is an identifier.
fn keyword(text: &str) -> Option<TokenType> {
    let token_type = match text {
        "declarar" => TokenType::Declarar,
        "variavel" => TokenType::Variavel,
        "funcao" => TokenType::Funcao,
        "se" => TokenType::Se,
        "senao" => TokenType::Senao,
        "retorne" => TokenType::Retorne,
        "Verdadeiro" => TokenType::Verdadeiro,
        "Falso" => TokenType::Falso,
        "repita" => TokenType::Repita,
        "enquanto" => TokenType::Enquanto,
        "de" => TokenType::De,
        "ate" => TokenType::Ate,
        _ => return None,
    };
    Some(token_type)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    /// Source text of the token, quotes included for strings.
    pub lexeme: String,
    pub position: Position,
}

impl Token {
    pub fn token_type(&self) -> &TokenType {
        &self.token_type
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TokenizeError {
    #[error("Unexpected character {character:?} at {position}")]
    UnexpectedCharacter { character: char, position: Position },
    #[error("Unterminated string starting at {position}")]
    UnterminatedString { position: Position },
}

impl TokenizeError {
    pub fn position(&self) -> Position {
        match self {
            TokenizeError::UnexpectedCharacter { position, .. }
            | TokenizeError::UnterminatedString { position } => *position,
        }
    }
}

pub fn tokens(source: &str) -> Result<Vec<Token>, TokenizeError> {
    let mut tokenizer = Tokenizer::new(source);
    let mut tokens = Vec::new();

    loop {
        let token = tokenizer.token()?;
        if token.token_type == TokenType::Eof {
            tokens.push(token);
            break;
        }
        tokens.push(token);
    }

    log::debug!("tokenized {} tokens", tokens.len());
    Ok(tokens)
}

pub struct Tokenizer<'a> {
    source: &'a str,
    current: usize,
    position: Position,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            current: 0,
            position: Position::default(),
        }
    }

    /// Produces the next token. Once the input is exhausted every call
    /// yields `Eof`.
    pub fn token(&mut self) -> Result<Token, TokenizeError> {
        self.skip_whitespace_and_comments();

        let start = self.current;
        let position = self.position;

        let Some(c) = self.advance() else {
            return Ok(Token {
                token_type: TokenType::Eof,
                lexeme: String::new(),
                position,
            });
        };

        let token_type = match c {
            '(' => TokenType::LeftParen,
            ')' => TokenType::RightParen,
            '{' => TokenType::LeftBrace,
            '}' => TokenType::RightBrace,
            '[' => TokenType::LeftBracket,
            ']' => TokenType::RightBracket,
            ',' => TokenType::Comma,
            ':' => TokenType::Colon,
            ';' => TokenType::Semicolon,
            '.' => TokenType::Dot,
            '-' => TokenType::Minus,
            '+' => TokenType::Plus,
            '/' => TokenType::Slash,
            '*' => TokenType::Star,
            '=' => {
                if self.advance_if('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                }
            }
            '!' => {
                if self.advance_if('=') {
                    TokenType::BangEqual
                } else {
                    return Err(TokenizeError::UnexpectedCharacter {
                        character: '!',
                        position,
                    });
                }
            }
            '<' => {
                if self.advance_if('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                }
            }
            '>' => {
                if self.advance_if('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                }
            }
            '\'' => self.string(start, position)?,
            c if c.is_ascii_digit() => self.number(start),
            c if is_alphabetic(c) => self.identifier(start),
            character => {
                return Err(TokenizeError::UnexpectedCharacter {
                    character,
                    position,
                })
            }
        };

        Ok(Token {
            token_type,
            lexeme: self.source[start..self.current].to_string(),
            position,
        })
    }

    fn peek(&self) -> Option<char> {
        self.source[self.current..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        self.source[self.current..].chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.current += c.len_utf8();
        if c == '\n' {
            self.position.line += 1;
            self.position.column = 1;
        } else {
            self.position.column += 1;
        }
        Some(c)
    }

    fn advance_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r' | '\n') => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn string(&mut self, start: usize, position: Position) -> Result<TokenType, TokenizeError> {
        loop {
            match self.advance() {
                Some('\'') => {
                    let contents = &self.source[start + 1..self.current - 1];
                    return Ok(TokenType::String(contents.to_string()));
                }
                Some(_) => {}
                None => return Err(TokenizeError::UnterminatedString { position }),
            }
        }
    }

    fn number(&mut self, start: usize) -> TokenType {
        self.digits();
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            self.digits();
        }

        // `digits(.digits)?` always parses; too many digits saturate to infinity.
        let lexeme = &self.source[start..self.current];
        TokenType::Number(lexeme.parse().unwrap_or(f64::INFINITY))
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn identifier(&mut self, start: usize) -> TokenType {
        while self.peek().is_some_and(is_alphabetic) {
            self.advance();
        }

        let text = &self.source[start..self.current];
        keyword(text).unwrap_or_else(|| TokenType::Identifier(text.to_string()))
    }
}

/// ASCII letters plus the accented letters of Latin-1.
fn is_alphabetic(c: char) -> bool {
    c.is_ascii_alphabetic() || (('\u{C0}'..='\u{FF}').contains(&c) && c != '×' && c != '÷')
}

#[cfg(test)]
mod test {
    use super::*;

    fn token_types(source: &str) -> Vec<TokenType> {
        tokens(source)
            .unwrap()
            .into_iter()
            .map(|token| token.token_type)
            .collect()
    }

    #[test]
    fn test_tokens() {
        let source = "declarar variavel x = 1;";
        let expected = vec![
            TokenType::Declarar,
            TokenType::Variavel,
            TokenType::Identifier("x".to_string()),
            TokenType::Equal,
            TokenType::Number(1.0),
            TokenType::Semicolon,
            TokenType::Eof,
        ];
        assert_eq!(token_types(source), expected);
    }

    #[test]
    fn test_tokens_with_comments() {
        let source = "x = 1; // comentário\ny";
        let expected = vec![
            TokenType::Identifier("x".to_string()),
            TokenType::Equal,
            TokenType::Number(1.0),
            TokenType::Semicolon,
            TokenType::Identifier("y".to_string()),
            TokenType::Eof,
        ];
        assert_eq!(token_types(source), expected);
    }

    #[test]
    fn test_tokens_with_string() {
        let source = "'olá mundo'";
        let tokens = tokens(source).unwrap();
        assert_eq!(
            tokens[0].token_type,
            TokenType::String("olá mundo".to_string())
        );
        assert_eq!(tokens[0].lexeme, "'olá mundo'");
    }

    #[test]
    fn test_tokens_with_number() {
        let expected = vec![
            TokenType::Number(3.25),
            TokenType::Number(1.0),
            TokenType::Dot,
            TokenType::Identifier("a".to_string()),
            TokenType::Eof,
        ];
        assert_eq!(token_types("3.25 1.a"), expected);
    }

    #[test]
    fn test_overlong_number_saturates() {
        let source = "9".repeat(400);
        assert_eq!(
            token_types(&source),
            vec![TokenType::Number(f64::INFINITY), TokenType::Eof]
        );
    }

    #[test]
    fn test_keywords_are_exact_matches() {
        let expected = vec![
            TokenType::Verdadeiro,
            TokenType::Identifier("verdadeiro".to_string()),
            TokenType::Falso,
            TokenType::Repita,
            TokenType::De,
            TokenType::Ate,
            TokenType::Identifier("declararx".to_string()),
            TokenType::Eof,
        ];
        assert_eq!(
            token_types("Verdadeiro verdadeiro Falso repita de ate declararx"),
            expected
        );
    }

    #[test]
    fn test_accented_identifier() {
        let expected = vec![TokenType::Identifier("ação".to_string()), TokenType::Eof];
        assert_eq!(token_types("ação"), expected);
    }

    #[test]
    fn test_two_character_operators() {
        let expected = vec![
            TokenType::EqualEqual,
            TokenType::BangEqual,
            TokenType::LessEqual,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::Greater,
            TokenType::Equal,
            TokenType::Eof,
        ];
        assert_eq!(token_types("== != <= >= < > ="), expected);
    }

    #[test]
    fn test_positions() {
        let tokens = tokens("a\n  bc // x\n'd'").unwrap();
        let positions: Vec<_> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(
            positions,
            vec![
                Position::new(1, 1),
                Position::new(2, 3),
                Position::new(3, 1),
                Position::new(3, 4),
            ]
        );
    }

    #[test]
    fn test_bare_bang_is_an_error() {
        assert_eq!(
            tokens("a !b"),
            Err(TokenizeError::UnexpectedCharacter {
                character: '!',
                position: Position::new(1, 3),
            })
        );
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokens("x = 1\n  @").unwrap_err();
        assert_eq!(err.position(), Position::new(2, 3));
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(
            tokens("x = 'abc"),
            Err(TokenizeError::UnterminatedString {
                position: Position::new(1, 5),
            })
        );
    }

    #[test]
    fn test_relexing_lexemes_is_stable() {
        let source = "declarar funcao f(a,b){retorne a+b*2.5;} se(f(1,'x y')>=3){l[0].k=[1,2];}";
        let first = tokens(source).unwrap();
        let joined = first
            .iter()
            .map(|t| t.lexeme.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let second = tokens(&joined).unwrap();
        let types = |ts: &[Token]| ts.iter().map(|t| t.token_type.clone()).collect::<Vec<_>>();
        assert_eq!(types(&first), types(&second));
    }
}
