use std::{cell::RefCell, fmt::Display, rc::Rc};

use rustc_hash::FxHashMap;

use super::{callable::Function, native::Native};

#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    Null,
    /// Declared but never assigned. Distinct from `Null`.
    Unset,
    Object(Rc<RefCell<Object>>),
    List(Rc<RefCell<Vec<Value>>>),
    Function(Rc<Function>),
    Native(Rc<Native>),
}

impl Value {
    pub fn object(object: Object) -> Self {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn list(values: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(values)))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Null | Value::Unset => false,
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Object(_) | Value::List(_) | Value::Function(_) | Value::Native(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
            Value::Null => "null",
            Value::Unset => "unset",
            Value::Object(_) => "object",
            Value::List(_) => "list",
            Value::Function(_) => "function",
            Value::Native(_) => "native function",
        }
    }
}

/// Structural equality. Function values compare by identity and NaN equals
/// itself, so every value is equal to itself.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        equals(self, other, &mut Vec::new())
    }
}

type ContainerPtr = *const ();

/// `active` holds the container pairs currently being compared. Meeting a
/// pair again means both sides loop back at the same point, so that branch
/// is equal.
fn equals(a: &Value, b: &Value, active: &mut Vec<(ContainerPtr, ContainerPtr)>) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
        (Value::Text(a), Value::Text(b)) => a == b,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Null, Value::Null) | (Value::Unset, Value::Unset) => true,
        (Value::Object(a), Value::Object(b)) => {
            let pair: (ContainerPtr, ContainerPtr) = (Rc::as_ptr(a).cast(), Rc::as_ptr(b).cast());
            if Rc::ptr_eq(a, b) || active.contains(&pair) {
                return true;
            }
            active.push(pair);
            let equal = objects_equal(&a.borrow(), &b.borrow(), active);
            active.pop();
            equal
        }
        (Value::List(a), Value::List(b)) => {
            let pair: (ContainerPtr, ContainerPtr) = (Rc::as_ptr(a).cast(), Rc::as_ptr(b).cast());
            if Rc::ptr_eq(a, b) || active.contains(&pair) {
                return true;
            }
            active.push(pair);
            let (a, b) = (a.borrow(), b.borrow());
            let equal =
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| equals(a, b, active));
            active.pop();
            equal
        }
        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
        (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

fn objects_equal(
    a: &Object,
    b: &Object,
    active: &mut Vec<(ContainerPtr, ContainerPtr)>,
) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|(key, value)| b.get(key).is_some_and(|other| equals(value, other, active)))
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_value(f, self, &mut Vec::new())
    }
}

/// A container already on `path` is printed as `[...]` or `{...}`.
fn write_value(
    f: &mut std::fmt::Formatter<'_>,
    value: &Value,
    path: &mut Vec<ContainerPtr>,
) -> std::fmt::Result {
    match value {
        Value::Number(n) => write!(f, "{}", format_number(*n)),
        Value::Text(s) => write!(f, "{}", s),
        Value::Boolean(true) => write!(f, "Verdadeiro"),
        Value::Boolean(false) => write!(f, "Falso"),
        Value::Null => write!(f, "nulo"),
        Value::Unset => write!(f, "indefinido"),
        Value::Object(object) => {
            let ptr: ContainerPtr = Rc::as_ptr(object).cast();
            if path.contains(&ptr) {
                return write!(f, "{{...}}");
            }
            path.push(ptr);
            write!(f, "{{ ")?;
            for (i, (key, value)) in object.borrow().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}: ")?;
                write_value(f, value, path)?;
            }
            path.pop();
            write!(f, " }}")
        }
        Value::List(values) => {
            let ptr: ContainerPtr = Rc::as_ptr(values).cast();
            if path.contains(&ptr) {
                return write!(f, "[...]");
            }
            path.push(ptr);
            write!(f, "[ ")?;
            for (i, value) in values.borrow().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_value(f, value, path)?;
            }
            path.pop();
            write!(f, " ]")
        }
        Value::Function(_) => write!(f, "<função>"),
        Value::Native(native) => write!(f, "<nativo:{}>", native.name),
    }
}

/// Integral values print without a fractional part. Magnitudes from `1e21`
/// up, or below `1e-6`, use exponent notation (`1e+21`, `1.5e-7`).
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        let formatted = format!("{n:e}");
        match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        }
    } else {
        n.to_string()
    }
}

/// String-keyed map that remembers insertion order.
#[derive(Debug, Clone, Default)]
pub struct Object {
    entries: Vec<(String, Value)>,
    index: FxHashMap<String, usize>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    /// Overwrites in place when the key exists, keeping its original slot.
    pub fn insert(&mut self, key: String, value: Value) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl FromIterator<(String, Value)> for Object {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut object = Object::new();
        for (key, value) in iter {
            object.insert(key, value);
        }
        object
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        objects_equal(self, other, &mut Vec::new())
    }
}
