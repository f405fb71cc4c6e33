use std::{cell::RefCell, rc::Rc};

use crate::ast::FunctionDecl;

use super::{environment::Environment, Flow, Interpreter, RuntimeError, Value};

/// A user function: its declaration plus the scope it was declared in.
#[derive(Clone)]
pub struct Function {
    pub decl: Rc<FunctionDecl>,
    pub closure: Rc<RefCell<Environment>>,
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.decl.name)
            .field("params", &self.decl.params)
            .field("closure", &self.closure.as_ptr())
            .finish()
    }
}

impl Function {
    pub fn arity(&self) -> usize {
        self.decl.params.len()
    }

    /// Missing arguments are bound to `Unset`; extra arguments are ignored.
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        log::trace!(
            "calling {}/{} with {} arguments",
            self.decl.name,
            self.arity(),
            args.len()
        );

        let scope = Environment::boxed(Some(self.closure.clone()));
        {
            let mut scope = scope.borrow_mut();
            let mut args = args.into_iter();
            for param in &self.decl.params {
                scope.declare(param.clone(), args.next().unwrap_or(Value::Unset));
            }
        }

        let flow = interpreter.enter_call(|interpreter| {
            interpreter.execute_in_scope(scope, |interpreter| {
                interpreter.execute_block(&self.decl.body)
            })
        })?;

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Unset),
        }
    }
}
