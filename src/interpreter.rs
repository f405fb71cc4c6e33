mod callable;
mod environment;
mod native;
mod value;

use std::{
    cell::RefCell,
    fmt::Debug,
    io::{BufRead, Write},
    rc::Rc,
};

use crate::ast::{Expression, InfixOperator, Literal, Program, Statement};

pub use self::{
    callable::Function,
    environment::Environment,
    native::{parse_input, Native, NativeFn},
    value::{format_number, Object, Value},
};

/// Deepest chain of nested function calls before `StackOverflow`.
pub const MAX_CALL_DEPTH: usize = 128;

/// Index assignment may grow a list by at most this many slots at once.
pub const MAX_LIST_GROWTH: usize = 1 << 20;

/// Outcome of executing a statement. Only a function call consumes
/// `Return`; blocks and loops hand it upward untouched.
#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Return(Value),
}

#[derive(Clone)]
pub struct Interpreter {
    scope: Rc<RefCell<Environment>>,
    stdout: Rc<RefCell<dyn Write>>,
    stdin: Rc<RefCell<dyn BufRead>>,
    call_depth: usize,
}

impl Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("scope", &self.scope)
            .field("call_depth", &self.call_depth)
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(
            Rc::new(RefCell::new(std::io::stdout())),
            Rc::new(RefCell::new(std::io::BufReader::new(std::io::stdin()))),
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Undeclared variable: {0}")]
    UndeclaredVariable(String),
    #[error("Operation '{operation}' requires numbers, found {left} and {right}")]
    RequiresNumbers {
        operation: String,
        left: &'static str,
        right: &'static str,
    },
    #[error("Value of type {0} is not callable")]
    NotCallable(&'static str),
    #[error("Member access '.{property}' is not valid on {type_name}")]
    InvalidMemberAccess {
        property: String,
        type_name: &'static str,
    },
    #[error("Indexing is only valid on lists, found {0}")]
    IndexOnNonList(&'static str),
    #[error("List index must be a number, found {0}")]
    IndexNotNumber(&'static str),
    #[error("Member assignment is only valid on objects, found {0}")]
    SetMemberOnNonObject(&'static str),
    #[error("Index assignment is only valid on lists, found {0}")]
    SetIndexOnNonList(&'static str),
    #[error("Invalid list index for assignment: {0}")]
    InvalidIndex(f64),
    #[error("Maximum call depth of {0} exceeded")]
    StackOverflow(usize),
}

impl RuntimeError {
    pub fn is_name_error(&self) -> bool {
        matches!(self, RuntimeError::UndeclaredVariable(_))
    }

    pub fn is_type_error(&self) -> bool {
        !matches!(
            self,
            RuntimeError::UndeclaredVariable(_)
                | RuntimeError::Io(_)
                | RuntimeError::StackOverflow(_)
        )
    }
}

impl Interpreter {
    pub fn new(stdout: Rc<RefCell<dyn Write>>, stdin: Rc<RefCell<dyn BufRead>>) -> Self {
        let scope = Environment::boxed(None);
        native::declare_natives(&scope);

        Self {
            scope,
            stdout,
            stdin,
            call_depth: 0,
        }
    }

    /// Runs every top-level statement against the global scope. Globals
    /// persist between calls. A top-level `retorne` ends the program.
    pub fn interpret(&mut self, program: &Program) -> Result<(), RuntimeError> {
        log::debug!("interpreting {} statements", program.0.len());
        for statement in program.0.iter() {
            if let Flow::Return(value) = self.execute(statement)? {
                log::debug!("top-level return with {}", value.type_name());
                break;
            }
        }

        Ok(())
    }

    pub(crate) fn write_line(&mut self, line: &str) -> Result<(), RuntimeError> {
        writeln!(self.stdout.borrow_mut(), "{}", line)?;
        Ok(())
    }

    /// Shows `prompt` without a newline, then reads one line. End of input
    /// reads as an empty line.
    pub(crate) fn read_line(&mut self, prompt: Option<&str>) -> Result<String, RuntimeError> {
        if let Some(prompt) = prompt {
            let mut stdout = self.stdout.borrow_mut();
            write!(stdout, "{}", prompt)?;
            stdout.flush()?;
        }

        let mut line = String::new();
        self.stdin.borrow_mut().read_line(&mut line)?;
        Ok(line)
    }

    fn execute(&mut self, stmt: &Statement) -> Result<Flow, RuntimeError> {
        let flow = match stmt {
            Statement::Expression(expression) => {
                self.evaluate(expression)?;
                Flow::Normal
            }
            Statement::VarDeclaration(name, init) => {
                let value = match init {
                    Some(expression) => self.evaluate(expression)?,
                    None => Value::Unset,
                };
                self.scope.borrow_mut().declare(name.clone(), value);
                Flow::Normal
            }
            Statement::FunctionDeclaration(decl) => {
                log::debug!("declaring function {}", decl.name);
                let function = Function {
                    decl: decl.clone(),
                    closure: self.scope.clone(),
                };
                self.scope
                    .borrow_mut()
                    .declare(decl.name.clone(), Value::Function(Rc::new(function)));
                Flow::Normal
            }
            Statement::Return(expression) => {
                let value = match expression {
                    Some(expression) => self.evaluate(expression)?,
                    None => Value::Unset,
                };
                Flow::Return(value)
            }
            Statement::Block(statements) => self.execute_nested(statements)?,
            Statement::If(condition, then_branch, else_branch) => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute_nested(then_branch)?
                } else if let Some(else_branch) = else_branch {
                    self.execute_nested(else_branch)?
                } else {
                    Flow::Normal
                }
            }
            Statement::While(condition, body) => {
                let mut flow = Flow::Normal;
                while self.evaluate(condition)?.is_truthy() {
                    flow = self.execute_nested(body)?;
                    if let Flow::Return(_) = flow {
                        break;
                    }
                }
                flow
            }
            Statement::RepeatTo {
                counter,
                limit,
                body,
            } => {
                let limit = self.evaluate(limit)?;
                let mut flow = Flow::Normal;
                loop {
                    let current = self
                        .scope
                        .borrow()
                        .get(counter)
                        .ok_or_else(|| RuntimeError::UndeclaredVariable(counter.clone()))?;
                    let (current, limit) = numbers("repita", &current, &limit)?;
                    if current >= limit || current.is_nan() || limit.is_nan() {
                        break;
                    }
                    flow = self.execute_nested(body)?;
                    if let Flow::Return(_) = flow {
                        break;
                    }
                }
                flow
            }
        };

        Ok(flow)
    }

    pub(crate) fn execute_block(&mut self, statements: &[Statement]) -> Result<Flow, RuntimeError> {
        for statement in statements {
            let flow = self.execute(statement)?;
            if let Flow::Return(_) = flow {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    /// Runs `statements` in a fresh child of the current scope.
    fn execute_nested(&mut self, statements: &[Statement]) -> Result<Flow, RuntimeError> {
        let scope = Environment::boxed(Some(self.scope.clone()));
        self.execute_in_scope(scope, |interpreter| interpreter.execute_block(statements))
    }

    /// Runs `f` one function call deeper, failing once the chain of
    /// nested calls reaches `MAX_CALL_DEPTH`.
    pub(crate) fn enter_call<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::StackOverflow(MAX_CALL_DEPTH));
        }

        self.call_depth += 1;
        let result = f(self);
        self.call_depth -= 1;
        result
    }

    pub(crate) fn execute_in_scope<T>(
        &mut self,
        scope: Rc<RefCell<Environment>>,
        f: impl FnOnce(&mut Self) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        let prev = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = prev;
        result
    }

    fn evaluate(&mut self, expression: &Expression) -> Result<Value, RuntimeError> {
        match expression {
            Expression::Literal(literal) => Ok(match literal {
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::Text(s.clone()),
                Literal::Boolean(b) => Value::Boolean(*b),
                Literal::Null => Value::Null,
            }),
            Expression::Identifier(name) => self
                .scope
                .borrow()
                .get(name)
                .ok_or_else(|| RuntimeError::UndeclaredVariable(name.clone())),
            Expression::Binary(left, op, right) => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(*op, left, right)
            }
            Expression::Assign { name, value } => {
                let value = self.evaluate(value)?;
                if self.scope.borrow_mut().assign(name, value.clone()) {
                    Ok(value)
                } else {
                    Err(RuntimeError::UndeclaredVariable(name.clone()))
                }
            }
            Expression::AssignMember {
                object,
                property,
                value,
            } => {
                let object = self.evaluate(object)?;
                let value = self.evaluate(value)?;
                match object {
                    Value::Object(object) => {
                        object.borrow_mut().insert(property.clone(), value.clone());
                        Ok(value)
                    }
                    other => Err(RuntimeError::SetMemberOnNonObject(other.type_name())),
                }
            }
            Expression::AssignIndex { list, index, value } => {
                let list = self.evaluate(list)?;
                let index = self.evaluate(index)?;
                let Value::Number(index) = index else {
                    return Err(RuntimeError::IndexNotNumber(index.type_name()));
                };
                let value = self.evaluate(value)?;
                let Value::List(list) = list else {
                    return Err(RuntimeError::SetIndexOnNonList(list.type_name()));
                };
                let mut list = list.borrow_mut();
                let limit = list.len().saturating_add(MAX_LIST_GROWTH);
                if index < 0.0 || index.fract() != 0.0 || index >= limit as f64 {
                    return Err(RuntimeError::InvalidIndex(index));
                }

                let index = index as usize;
                if index >= list.len() {
                    list.resize(index + 1, Value::Unset);
                }
                list[index] = value.clone();
                Ok(value)
            }
            Expression::Call(callee, args) => {
                let callee = self.evaluate(callee)?;
                let args = args
                    .iter()
                    .map(|arg| self.evaluate(arg))
                    .collect::<Result<Vec<_>, _>>()?;

                match callee {
                    Value::Function(function) => function.call(self, args),
                    Value::Native(native) => native.call(self, args),
                    other => Err(RuntimeError::NotCallable(other.type_name())),
                }
            }
            Expression::Member(object, property) => {
                let object = self.evaluate(object)?;
                let value = match (&object, property.as_str()) {
                    (Value::Text(s), "tamanho") => Value::Number(s.chars().count() as f64),
                    (Value::List(values), "tamanho") => {
                        let len = values.borrow().len();
                        Value::Number(len as f64)
                    }
                    (Value::Object(object), property) => {
                        let value = object.borrow().get(property).cloned();
                        value.unwrap_or(Value::Unset)
                    }
                    _ => {
                        return Err(RuntimeError::InvalidMemberAccess {
                            property: property.clone(),
                            type_name: object.type_name(),
                        })
                    }
                };
                Ok(value)
            }
            Expression::Index(list, index) => {
                let list = self.evaluate(list)?;
                let index = self.evaluate(index)?;
                let Value::Number(index) = index else {
                    return Err(RuntimeError::IndexNotNumber(index.type_name()));
                };
                let Value::List(list) = list else {
                    return Err(RuntimeError::IndexOnNonList(list.type_name()));
                };

                if index < 0.0 || index.fract() != 0.0 {
                    return Ok(Value::Unset);
                }
                let value = list.borrow().get(index as usize).cloned();
                Ok(value.unwrap_or(Value::Unset))
            }
            Expression::Object(entries) => {
                let mut object = Object::new();
                for (key, value) in entries {
                    object.insert(key.clone(), self.evaluate(value)?);
                }
                Ok(Value::object(object))
            }
            Expression::Array(elements) => {
                let values = elements
                    .iter()
                    .map(|element| self.evaluate(element))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::list(values))
            }
        }
    }
}

fn numbers(operation: &str, left: &Value, right: &Value) -> Result<(f64, f64), RuntimeError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        (a, b) => Err(RuntimeError::RequiresNumbers {
            operation: operation.to_string(),
            left: a.type_name(),
            right: b.type_name(),
        }),
    }
}

fn binary(op: InfixOperator, left: Value, right: Value) -> Result<Value, RuntimeError> {
    let operation = op.to_string();
    let value = match op {
        InfixOperator::Plus => match (&left, &right) {
            (Value::Text(_), _) | (_, Value::Text(_)) => Value::Text(format!("{left}{right}")),
            _ => {
                let (a, b) = numbers(&operation, &left, &right)?;
                Value::Number(a + b)
            }
        },
        InfixOperator::Minus => {
            let (a, b) = numbers(&operation, &left, &right)?;
            Value::Number(a - b)
        }
        InfixOperator::Multiply => {
            let (a, b) = numbers(&operation, &left, &right)?;
            Value::Number(a * b)
        }
        InfixOperator::Divide => {
            let (a, b) = numbers(&operation, &left, &right)?;
            Value::Number(a / b)
        }
        InfixOperator::Equal => Value::Boolean(left == right),
        InfixOperator::NotEqual => Value::Boolean(left != right),
        InfixOperator::LessThan => {
            let (a, b) = numbers(&operation, &left, &right)?;
            Value::Boolean(a < b)
        }
        InfixOperator::LessThanOrEqual => {
            let (a, b) = numbers(&operation, &left, &right)?;
            Value::Boolean(a <= b)
        }
        InfixOperator::GreaterThan => {
            let (a, b) = numbers(&operation, &left, &right)?;
            Value::Boolean(a > b)
        }
        InfixOperator::GreaterThanOrEqual => {
            let (a, b) = numbers(&operation, &left, &right)?;
            Value::Boolean(a >= b)
        }
    };

    Ok(value)
}
