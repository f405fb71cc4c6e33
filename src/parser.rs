use std::{cell::RefCell, rc::Rc};

use crate::{
    ast::{Expression, FunctionDecl, InfixOperator, Literal, Program, Statement},
    position::Position,
    tokenizer::{Token, TokenType},
};

#[derive(Debug, Clone)]
pub struct SyntaxError {
    pub error: ParseError,
    pub token: Option<Token>,
    context: Vec<&'static str>,
}

impl SyntaxError {
    fn new(context: &ParseContext, error: ParseError, tokens: &[Token]) -> Self {
        Self {
            error,
            token: tokens.first().cloned(),
            context: context.stack.borrow().clone(),
        }
    }

    pub fn position(&self) -> Option<Position> {
        self.token.as_ref().map(|token| token.position)
    }
}

impl std::error::Error for SyntaxError {}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "While parsing {}", self.context.join(" > "))?;
        write!(f, "{}", self.error)?;
        if let Some(token) = &self.token {
            write!(f, " at {} but found {}", token.position, token.token_type)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Expected \"{0}\"")]
    Expected(TokenType),
    #[error(
        "Expected one of {}",
        .0.iter().map(|t| format!("\"{t}\"")).collect::<Vec<_>>().join(", ")
    )]
    ExpectedOneOf(Vec<TokenType>),
    #[error("Unexpected {0}")]
    Unexpected(TokenType),
    #[error("Expected identifier")]
    ExpectedIdentifier,
    #[error("Invalid assignment target")]
    InvalidAssignmentTarget,
}

#[derive(Debug)]
struct ParseContext {
    stack: RefCell<Vec<&'static str>>,
}

impl ParseContext {
    fn new() -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
        }
    }

    fn push(&self, name: &'static str) -> ParseContextGuard {
        self.stack.borrow_mut().push(name);
        ParseContextGuard::new(self)
    }

    fn pop(&self) {
        self.stack.borrow_mut().pop();
    }
}

struct ParseContextGuard<'a> {
    context: &'a ParseContext,
}

impl<'a> ParseContextGuard<'a> {
    fn new(context: &'a ParseContext) -> Self {
        Self { context }
    }
}

impl<'a> Drop for ParseContextGuard<'a> {
    fn drop(&mut self) {
        self.context.pop();
    }
}

type Parsed<'a, T> = Result<(T, &'a [Token]), SyntaxError>;

pub fn program(tokens: &[Token]) -> Result<Program, SyntaxError> {
    let context = ParseContext::new();
    let _guard = context.push("program");
    let mut statements = Vec::new();
    let mut tokens = tokens;

    while !matches!(peek(tokens), None | Some(TokenType::Eof)) {
        let (statement, rest) = declaration(&context, tokens)?;
        statements.push(statement);
        tokens = rest;
    }

    log::debug!("parsed {} top-level statements", statements.len());
    Ok(Program(statements))
}

fn peek(tokens: &[Token]) -> Option<&TokenType> {
    tokens.first().map(Token::token_type)
}

/// Statement terminators are never required.
fn skip_optional<'a>(tokens: &'a [Token], token_type: &TokenType) -> &'a [Token] {
    match peek(tokens) {
        Some(t) if t == token_type => &tokens[1..],
        _ => tokens,
    }
}

fn declaration<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("declaration");
    match peek(tokens) {
        Some(TokenType::Declarar) => match peek(&tokens[1..]) {
            Some(TokenType::Funcao) => function(context, &tokens[2..]),
            _ => var_declaration(context, &tokens[1..]),
        },
        Some(TokenType::Retorne) => return_statement(context, &tokens[1..]),
        Some(TokenType::Se) => if_statement(context, &tokens[1..]),
        Some(TokenType::Enquanto) => while_statement(context, &tokens[1..]),
        Some(TokenType::Repita) => repeat_statement(context, &tokens[1..]),
        Some(TokenType::LeftBrace) => {
            let (body, tokens) = block(context, tokens)?;
            Ok((Statement::Block(body), tokens))
        }
        _ => expression_statement(context, tokens),
    }
}

fn var_declaration<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("var_declaration");
    let tokens = skip_optional(tokens, &TokenType::Variavel);
    let (name, tokens) = match_identifier(context, tokens)?;
    let (init, tokens) = match peek(tokens) {
        Some(TokenType::Equal) => {
            let (expr, tokens) = expression(context, &tokens[1..])?;
            (Some(expr), tokens)
        }
        _ => (None, tokens),
    };
    let tokens = skip_optional(tokens, &TokenType::Semicolon);
    Ok((Statement::VarDeclaration(name, init), tokens))
}

fn function<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("function");
    let (name, tokens) = match_identifier(context, tokens)?;
    let tokens = consume(context, tokens, TokenType::LeftParen)?;
    let (params, tokens) =
        comma_separated(context, tokens, TokenType::RightParen, match_identifier)?;
    let (body, tokens) = block(context, tokens)?;
    Ok((
        Statement::FunctionDeclaration(Rc::new(FunctionDecl { name, params, body })),
        tokens,
    ))
}

fn return_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("return_statement");
    let (value, tokens) = match peek(tokens) {
        None | Some(TokenType::Semicolon | TokenType::RightBrace | TokenType::Eof) => {
            (None, tokens)
        }
        _ => {
            let (expr, tokens) = expression(context, tokens)?;
            (Some(expr), tokens)
        }
    };
    let tokens = skip_optional(tokens, &TokenType::Semicolon);
    Ok((Statement::Return(value), tokens))
}

fn if_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("if_statement");
    let tokens = consume(context, tokens, TokenType::LeftParen)?;
    let (condition, tokens) = expression(context, tokens)?;
    let tokens = consume(context, tokens, TokenType::RightParen)?;
    let (then_branch, tokens) = block(context, tokens)?;
    if let Some(TokenType::Senao) = peek(tokens) {
        let (else_branch, tokens) = block(context, &tokens[1..])?;
        Ok((
            Statement::If(condition, then_branch, Some(else_branch)),
            tokens,
        ))
    } else {
        Ok((Statement::If(condition, then_branch, None), tokens))
    }
}

fn while_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("while_statement");
    let tokens = consume(context, tokens, TokenType::LeftParen)?;
    let (condition, tokens) = expression(context, tokens)?;
    let tokens = consume(context, tokens, TokenType::RightParen)?;
    let (body, tokens) = block(context, tokens)?;
    Ok((Statement::While(condition, body), tokens))
}

/// `repita de <counter> ate <limit> { ... }`
fn repeat_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("repeat_statement");
    let tokens = consume(context, tokens, TokenType::De)?;
    let (counter, tokens) = match_identifier(context, tokens)?;
    let tokens = consume(context, tokens, TokenType::Ate)?;
    let (limit, tokens) = expression(context, tokens)?;
    let (body, tokens) = block(context, tokens)?;
    Ok((
        Statement::RepeatTo {
            counter,
            limit,
            body,
        },
        tokens,
    ))
}

fn block<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Vec<Statement>> {
    let _guard = context.push("block");
    let mut tokens = consume(context, tokens, TokenType::LeftBrace)?;
    let mut statements = Vec::new();

    loop {
        match peek(tokens) {
            Some(TokenType::RightBrace) => return Ok((statements, &tokens[1..])),
            None | Some(TokenType::Eof) => {
                return Err(SyntaxError::new(
                    context,
                    ParseError::Expected(TokenType::RightBrace),
                    tokens,
                ))
            }
            _ => {
                let (statement, rest) = declaration(context, tokens)?;
                statements.push(statement);
                tokens = rest;
            }
        }
    }
}

fn expression_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("expression_statement");
    let (expr, tokens) = expression(context, tokens)?;
    let tokens = skip_optional(tokens, &TokenType::Semicolon);
    Ok((Statement::Expression(expr), tokens))
}

fn expression<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("expression");
    assignment(context, tokens)
}

fn assignment<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("assignment");
    let (expr, rest) = equality(context, tokens)?;

    let Some(TokenType::Equal) = peek(rest) else {
        return Ok((expr, rest));
    };

    let (value, after) = assignment(context, &rest[1..])?;
    let value = Box::new(value);
    let expr = match expr {
        Expression::Identifier(name) => Expression::Assign { name, value },
        Expression::Member(object, property) => Expression::AssignMember {
            object,
            property,
            value,
        },
        Expression::Index(list, index) => Expression::AssignIndex { list, index, value },
        _ => {
            return Err(SyntaxError::new(
                context,
                ParseError::InvalidAssignmentTarget,
                rest,
            ))
        }
    };
    Ok((expr, after))
}

fn binary<'a>(
    context: &ParseContext,
    precedence: impl Fn(&ParseContext, &'a [Token]) -> Parsed<'a, Expression>,
    operator: impl Fn(&TokenType) -> Option<InfixOperator>,
    tokens: &'a [Token],
) -> Parsed<'a, Expression> {
    let (mut expr, mut tokens) = precedence(context, tokens)?;

    while let Some(op) = peek(tokens).and_then(&operator) {
        let (right, rest) = precedence(context, &tokens[1..])?;
        expr = Expression::Binary(Box::new(expr), op, Box::new(right));
        tokens = rest;
    }

    Ok((expr, tokens))
}

fn equality<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("equality");
    binary(
        context,
        comparison,
        |token_type| match token_type {
            TokenType::EqualEqual => Some(InfixOperator::Equal),
            TokenType::BangEqual => Some(InfixOperator::NotEqual),
            _ => None,
        },
        tokens,
    )
}

fn comparison<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("comparison");
    binary(
        context,
        term,
        |token_type| match token_type {
            TokenType::Greater => Some(InfixOperator::GreaterThan),
            TokenType::GreaterEqual => Some(InfixOperator::GreaterThanOrEqual),
            TokenType::Less => Some(InfixOperator::LessThan),
            TokenType::LessEqual => Some(InfixOperator::LessThanOrEqual),
            _ => None,
        },
        tokens,
    )
}

fn term<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("term");
    binary(
        context,
        factor,
        |token_type| match token_type {
            TokenType::Plus => Some(InfixOperator::Plus),
            TokenType::Minus => Some(InfixOperator::Minus),
            _ => None,
        },
        tokens,
    )
}

fn factor<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("factor");
    binary(
        context,
        call,
        |token_type| match token_type {
            TokenType::Star => Some(InfixOperator::Multiply),
            TokenType::Slash => Some(InfixOperator::Divide),
            _ => None,
        },
        tokens,
    )
}

/// Postfix chain: any mix of `(args)`, `.name` and `[index]`.
fn call<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("call");
    let (mut expr, mut tokens) = primary(context, tokens)?;

    loop {
        match peek(tokens) {
            Some(TokenType::LeftParen) => {
                let (args, rest) =
                    comma_separated(context, &tokens[1..], TokenType::RightParen, expression)?;
                expr = Expression::Call(Box::new(expr), args);
                tokens = rest;
            }
            Some(TokenType::Dot) => {
                let (property, rest) = match_identifier(context, &tokens[1..])?;
                expr = Expression::Member(Box::new(expr), property);
                tokens = rest;
            }
            Some(TokenType::LeftBracket) => {
                let (index, rest) = expression(context, &tokens[1..])?;
                let rest = consume(context, rest, TokenType::RightBracket)?;
                expr = Expression::Index(Box::new(expr), Box::new(index));
                tokens = rest;
            }
            _ => break,
        }
    }

    Ok((expr, tokens))
}

fn primary<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("primary");
    let Some(token_type) = peek(tokens) else {
        return Err(SyntaxError::new(
            context,
            ParseError::Unexpected(TokenType::Eof),
            tokens,
        ));
    };

    match token_type {
        TokenType::Number(n) => Ok((Expression::Literal(Literal::Number(*n)), &tokens[1..])),
        TokenType::String(s) => Ok((
            Expression::Literal(Literal::String(s.clone())),
            &tokens[1..],
        )),
        TokenType::Verdadeiro => Ok((Expression::Literal(Literal::Boolean(true)), &tokens[1..])),
        TokenType::Falso => Ok((Expression::Literal(Literal::Boolean(false)), &tokens[1..])),
        TokenType::Identifier(name) => Ok((Expression::Identifier(name.clone()), &tokens[1..])),
        TokenType::LeftBracket => {
            let (elements, rest) =
                comma_separated(context, &tokens[1..], TokenType::RightBracket, expression)?;
            Ok((Expression::Array(elements), rest))
        }
        TokenType::LeftBrace => {
            let (entries, rest) =
                comma_separated(context, &tokens[1..], TokenType::RightBrace, object_entry)?;
            Ok((Expression::Object(entries), rest))
        }
        TokenType::LeftParen => {
            let (expr, rest) = expression(context, &tokens[1..])?;
            let tokens = consume(context, rest, TokenType::RightParen)?;
            Ok((expr, tokens))
        }
        token_type => Err(SyntaxError::new(
            context,
            ParseError::Unexpected(token_type.clone()),
            tokens,
        )),
    }
}

fn object_entry<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
) -> Parsed<'a, (String, Expression)> {
    let _guard = context.push("object_entry");
    let (key, tokens) = match_identifier(context, tokens)?;
    let tokens = consume(context, tokens, TokenType::Colon)?;
    let (value, tokens) = expression(context, tokens)?;
    Ok(((key, value), tokens))
}

/// Parses `item (, item)* closing`, or just `closing`. The opening
/// delimiter must already be consumed.
fn comma_separated<'a, T>(
    context: &ParseContext,
    tokens: &'a [Token],
    closing: TokenType,
    item: impl Fn(&ParseContext, &'a [Token]) -> Parsed<'a, T>,
) -> Parsed<'a, Vec<T>> {
    let mut items = Vec::new();
    if peek(tokens) == Some(&closing) {
        return Ok((items, &tokens[1..]));
    }

    let mut tokens = tokens;
    loop {
        let (value, rest) = item(context, tokens)?;
        items.push(value);
        match peek(rest) {
            Some(TokenType::Comma) => tokens = &rest[1..],
            Some(t) if *t == closing => return Ok((items, &rest[1..])),
            _ => {
                return Err(SyntaxError::new(
                    context,
                    ParseError::ExpectedOneOf(vec![TokenType::Comma, closing]),
                    rest,
                ))
            }
        }
    }
}

fn consume<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    token_type: TokenType,
) -> Result<&'a [Token], SyntaxError> {
    match peek(tokens) {
        Some(t) if t == &token_type => Ok(&tokens[1..]),
        _ => Err(SyntaxError::new(
            context,
            ParseError::Expected(token_type),
            tokens,
        )),
    }
}

fn match_identifier<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, String> {
    match peek(tokens) {
        Some(TokenType::Identifier(name)) => Ok((name.clone(), &tokens[1..])),
        _ => Err(SyntaxError::new(
            context,
            ParseError::ExpectedIdentifier,
            tokens,
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tokenizer::tokens;

    fn parse(source: &str) -> Result<Program, SyntaxError> {
        program(&tokens(source).unwrap())
    }

    fn parse_to_string(source: &str) -> String {
        parse(source).unwrap().to_string()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(parse_to_string("1 + 2 * 3;"), "(+ 1 (* 2 3));\n");
        assert_eq!(
            parse_to_string("a == b < c - d / e"),
            "(== a (< b (- c (/ d e))));\n"
        );
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(parse_to_string("1 - 2 - 3"), "(- (- 1 2) 3);\n");
        assert_eq!(parse_to_string("8 / 4 / 2"), "(/ (/ 8 4) 2);\n");
    }

    #[test]
    fn test_grouping() {
        assert_eq!(parse_to_string("(1 + 2) * 3"), "(* (+ 1 2) 3);\n");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let program = parse("a = b = 1").unwrap();
        let [Statement::Expression(Expression::Assign { name, value })] = program.0.as_slice()
        else {
            panic!("expected assignment, got {program}");
        };
        assert_eq!(name, "a");
        assert!(matches!(**value, Expression::Assign { ref name, .. } if name == "b"));
    }

    #[test]
    fn test_member_and_index_assignment() {
        let program = parse("o.k = 1; l[0] = 2;").unwrap();
        assert!(matches!(
            program.0[0],
            Statement::Expression(Expression::AssignMember { ref property, .. }) if property == "k"
        ));
        assert!(matches!(
            program.0[1],
            Statement::Expression(Expression::AssignIndex { .. })
        ));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse("1 + 2 = 3").unwrap_err();
        assert!(matches!(err.error, ParseError::InvalidAssignmentTarget));
        assert_eq!(err.position(), Some(Position::new(1, 7)));
    }

    #[test]
    fn test_postfix_chain() {
        assert_eq!(parse_to_string("a.b[0](x).c"), "a.b[0](x).c;\n");
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            parse_to_string("[1, 'a', Verdadeiro, Falso, []]"),
            "[1, 'a', Verdadeiro, Falso, []];\n"
        );
        assert_eq!(
            parse_to_string("x = { a: 1, b: [2] }"),
            "x = { a: 1, b: [2] };\n"
        );
    }

    #[test]
    fn test_declarations() {
        let program = parse(
            "declarar variavel x = 1 declarar y; declarar funcao f(a, b) { retorne a }",
        )
        .unwrap();
        assert!(matches!(program.0[0], Statement::VarDeclaration(ref n, Some(_)) if n == "x"));
        assert!(matches!(program.0[1], Statement::VarDeclaration(ref n, None) if n == "y"));
        let Statement::FunctionDeclaration(decl) = &program.0[2] else {
            panic!("expected function declaration");
        };
        assert_eq!(decl.name, "f");
        assert_eq!(decl.params, vec!["a".to_string(), "b".to_string()]);
        assert!(matches!(decl.body[0], Statement::Return(Some(_))));
    }

    #[test]
    fn test_return_without_value() {
        let program =
            parse("declarar funcao f() { retorne; } declarar funcao g() { retorne }").unwrap();
        for statement in &program.0 {
            let Statement::FunctionDeclaration(decl) = statement else {
                panic!("expected function declaration");
            };
            assert!(matches!(decl.body[0], Statement::Return(None)));
        }
    }

    #[test]
    fn test_control_flow() {
        let program = parse(
            "se (x) { a } senao { b } enquanto (y) { c } repita de i ate 3 { i = i + 1 } { d }",
        )
        .unwrap();
        assert!(matches!(program.0[0], Statement::If(_, _, Some(_))));
        assert!(matches!(program.0[1], Statement::While(_, _)));
        assert!(matches!(
            program.0[2],
            Statement::RepeatTo { ref counter, .. } if counter == "i"
        ));
        assert!(matches!(program.0[3], Statement::Block(_)));
    }

    #[test]
    fn test_missing_closing_brace() {
        let err = parse("se (x) { a").unwrap_err();
        assert!(matches!(
            err.error,
            ParseError::Expected(TokenType::RightBrace)
        ));
        assert_eq!(err.token.map(|t| t.token_type), Some(TokenType::Eof));
    }

    #[test]
    fn test_missing_parameter_separator() {
        let err = parse("declarar funcao f(a b) {}").unwrap_err();
        assert!(matches!(err.error, ParseError::ExpectedOneOf(_)));
        assert_eq!(err.position(), Some(Position::new(1, 21)));
    }

    #[test]
    fn test_first_error_aborts() {
        let err = parse("x = ;\ny = )").unwrap_err();
        assert!(matches!(
            err.error,
            ParseError::Unexpected(TokenType::Semicolon)
        ));
        assert_eq!(err.position(), Some(Position::new(1, 5)));
    }

    #[test]
    fn test_error_context() {
        let err = parse("f(1,").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("While parsing program > declaration"));
        assert!(message.contains("primary"));
        assert!(message.contains("found end of input"));
    }
}
