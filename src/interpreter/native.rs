use std::{cell::RefCell, rc::Rc};

use super::{environment::Environment, Interpreter, RuntimeError, Value};

pub type NativeFn = fn(&mut Interpreter, Vec<Value>) -> Result<Value, RuntimeError>;

#[derive(Debug)]
pub struct Native {
    pub name: &'static str,
    pub function: NativeFn,
}

impl Native {
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        log::trace!("calling native {} with {} arguments", self.name, args.len());
        (self.function)(interpreter, args)
    }
}

const NATIVES: &[Native] = &[
    Native {
        name: "imprimir",
        function: imprimir,
    },
    Native {
        name: "lerEntrada",
        function: ler_entrada,
    },
];

pub(super) fn declare_natives(scope: &Rc<RefCell<Environment>>) {
    let mut scope = scope.borrow_mut();
    for native in NATIVES {
        scope.declare(
            native.name.to_string(),
            Value::Native(Rc::new(Native {
                name: native.name,
                function: native.function,
            })),
        );
    }
}

/// Writes every argument's display form, space separated, as one line.
fn imprimir(interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let line = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    interpreter.write_line(&line)?;
    Ok(Value::Unset)
}

fn ler_entrada(interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let prompt = match args.first() {
        Some(Value::Text(prompt)) => Some(prompt.as_str()),
        _ => None,
    };
    let line = interpreter.read_line(prompt)?;
    Ok(parse_input(&line))
}

/// Converts a line of user input into a value: empty text, then a
/// case-insensitive `verdadeiro`/`falso`, then a number (`,` accepted as the
/// decimal separator), otherwise the trimmed text itself.
pub fn parse_input(raw: &str) -> Value {
    let text = raw.trim();
    if text.is_empty() {
        return Value::Text(String::new());
    }

    let lower = text.to_lowercase();
    if lower == "verdadeiro" {
        return Value::Boolean(true);
    }
    if lower == "falso" {
        return Value::Boolean(false);
    }

    let normalized = text.replacen(',', ".", 1);
    if is_number_literal(&normalized) {
        if let Ok(n) = normalized.parse() {
            return Value::Number(n);
        }
    }

    Value::Text(text.to_string())
}

/// `[+-]?digits(.digits)?`
fn is_number_literal(text: &str) -> bool {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (integral, fractional) = match unsigned.split_once('.') {
        Some((integral, fractional)) => (integral, Some(fractional)),
        None => (unsigned, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(integral) && fractional.map_or(true, all_digits)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_input_numbers() {
        assert_eq!(parse_input("2,5"), Value::Number(2.5));
        assert_eq!(parse_input("2.5"), Value::Number(2.5));
        assert_eq!(parse_input("  -12 \n"), Value::Number(-12.0));
        assert_eq!(parse_input("+7"), Value::Number(7.0));
        assert_eq!(parse_input("0"), Value::Number(0.0));
    }

    #[test]
    fn test_parse_input_booleans() {
        assert_eq!(parse_input("Verdadeiro"), Value::Boolean(true));
        assert_eq!(parse_input("FALSO\n"), Value::Boolean(false));
    }

    #[test]
    fn test_parse_input_text() {
        assert_eq!(parse_input(""), Value::Text(String::new()));
        assert_eq!(parse_input("\n"), Value::Text(String::new()));
        assert_eq!(parse_input(" olá "), Value::Text("olá".to_string()));
        assert_eq!(parse_input("1,2,3"), Value::Text("1,2,3".to_string()));
        assert_eq!(parse_input(".5"), Value::Text(".5".to_string()));
        assert_eq!(parse_input("5."), Value::Text("5.".to_string()));
        assert_eq!(parse_input("1e3"), Value::Text("1e3".to_string()));
    }

    #[test]
    fn test_comma_and_dot_agree() {
        for (comma, dot) in [("0,5", "0.5"), ("10,25", "10.25"), ("-2,0", "-2.0")] {
            assert_eq!(parse_input(comma), parse_input(dot));
        }
    }
}
