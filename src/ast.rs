use std::{fmt::Display, rc::Rc};

#[derive(Debug)]
pub struct Program(pub Vec<Statement>);

#[derive(Debug, Clone)]
pub enum Statement {
    VarDeclaration(String, Option<Expression>),
    Expression(Expression),
    Block(Vec<Statement>),
    If(Expression, Vec<Statement>, Option<Vec<Statement>>),
    RepeatTo {
        counter: String,
        limit: Expression,
        body: Vec<Statement>,
    },
    While(Expression, Vec<Statement>),
    FunctionDeclaration(Rc<FunctionDecl>),
    Return(Option<Expression>),
}

/// Shared with every function value created from it, so calls never
/// copy the body.
#[derive(Debug)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Literal),
    Identifier(String),
    Binary(Box<Expression>, InfixOperator, Box<Expression>),
    Assign {
        name: String,
        value: Box<Expression>,
    },
    AssignMember {
        object: Box<Expression>,
        property: String,
        value: Box<Expression>,
    },
    AssignIndex {
        list: Box<Expression>,
        index: Box<Expression>,
        value: Box<Expression>,
    },
    Call(Box<Expression>, Vec<Expression>),
    Member(Box<Expression>, String),
    Index(Box<Expression>, Box<Expression>),
    Object(Vec<(String, Expression)>),
    Array(Vec<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Plus,
    Minus,
    Multiply,
    Divide,
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for statement in &self.0 {
            writeln!(f, "{}", statement)?;
        }
        Ok(())
    }
}

fn write_body(f: &mut std::fmt::Formatter<'_>, statements: &[Statement]) -> std::fmt::Result {
    writeln!(f, "{{")?;
    for statement in statements {
        writeln!(f, "{}", statement)?;
    }
    write!(f, "}}")
}

fn write_list<T: Display>(f: &mut std::fmt::Formatter<'_>, items: &[T]) -> std::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        write!(f, "{item}")?;
        if i != items.len() - 1 {
            write!(f, ", ")?;
        }
    }
    Ok(())
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::Expression(expr) => write!(f, "{};", expr),
            Statement::VarDeclaration(name, Some(expr)) => {
                write!(f, "declarar variavel {} = {};", name, expr)
            }
            Statement::VarDeclaration(name, None) => write!(f, "declarar variavel {};", name),
            Statement::Block(statements) => write_body(f, statements),
            Statement::If(condition, then_branch, else_branch) => {
                write!(f, "se ({}) ", condition)?;
                write_body(f, then_branch)?;
                if let Some(else_branch) = else_branch {
                    write!(f, " senao ")?;
                    write_body(f, else_branch)?;
                }
                Ok(())
            }
            Statement::RepeatTo {
                counter,
                limit,
                body,
            } => {
                write!(f, "repita de {} ate {} ", counter, limit)?;
                write_body(f, body)
            }
            Statement::While(condition, body) => {
                write!(f, "enquanto ({}) ", condition)?;
                write_body(f, body)
            }
            Statement::FunctionDeclaration(decl) => {
                write!(f, "declarar funcao {}(", decl.name)?;
                write_list(f, &decl.params)?;
                write!(f, ") ")?;
                write_body(f, &decl.body)
            }
            Statement::Return(expr) => {
                if let Some(expr) = expr {
                    write!(f, "retorne {};", expr)
                } else {
                    write!(f, "retorne;")
                }
            }
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Identifier(name) => write!(f, "{}", name),
            Expression::Literal(literal) => write!(f, "{}", literal),
            Expression::Binary(left, op, right) => write!(f, "({} {} {})", op, left, right),
            Expression::Assign { name, value } => write!(f, "{} = {}", name, value),
            Expression::AssignMember {
                object,
                property,
                value,
            } => write!(f, "{}.{} = {}", object, property, value),
            Expression::AssignIndex { list, index, value } => {
                write!(f, "{}[{}] = {}", list, index, value)
            }
            Expression::Call(callee, args) => {
                write!(f, "{}(", callee)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expression::Member(object, property) => write!(f, "{}.{}", object, property),
            Expression::Index(list, index) => write!(f, "{}[{}]", list, index),
            Expression::Object(entries) => {
                write!(f, "{{ ")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    write!(f, "{key}: {value}")?;
                    if i != entries.len() - 1 {
                        write!(f, ", ")?;
                    }
                }
                write!(f, " }}")
            }
            Expression::Array(elements) => {
                write!(f, "[")?;
                write_list(f, elements)?;
                write!(f, "]")
            }
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "'{}'", s),
            Literal::Boolean(true) => write!(f, "Verdadeiro"),
            Literal::Boolean(false) => write!(f, "Falso"),
            Literal::Null => write!(f, "nulo"),
        }
    }
}

impl Display for InfixOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfixOperator::Equal => write!(f, "=="),
            InfixOperator::NotEqual => write!(f, "!="),
            InfixOperator::LessThan => write!(f, "<"),
            InfixOperator::LessThanOrEqual => write!(f, "<="),
            InfixOperator::GreaterThan => write!(f, ">"),
            InfixOperator::GreaterThanOrEqual => write!(f, ">="),
            InfixOperator::Plus => write!(f, "+"),
            InfixOperator::Minus => write!(f, "-"),
            InfixOperator::Multiply => write!(f, "*"),
            InfixOperator::Divide => write!(f, "/"),
        }
    }
}
