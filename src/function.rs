use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::class::LoxInstance;
use crate::environment::{Environment, EnvRef};
use crate::value::Value;

/// A user function, method or lambda together with the scope it closed
/// over.  `closure == None` means it was declared at top level.
#[derive(Clone)]
pub struct LoxFunction {
    pub declaration: Rc<FunctionDecl>,
    pub closure: Option<EnvRef>,
    pub is_initializer: bool,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: Option<EnvRef>, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    pub fn name(&self) -> &str {
        self.declaration.display_name()
    }

    pub fn is_getter(&self) -> bool {
        self.declaration.is_getter
    }

    /// A copy of this method whose closure is a new frame holding `this` in
    /// slot 0, wrapped around the method's own closure.
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance>>) -> LoxFunction {
        let env = Environment::with_values(self.closure.clone(), vec![Value::Instance(instance)]);

        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: Some(env),
            is_initializer: self.is_initializer,
        }
    }

    /// The instance a bound initializer was bound to.
    pub fn bound_this(&self) -> Option<Value> {
        let closure = self.closure.as_ref()?;
        let this = closure.borrow().get(0);
        this
    }
}

impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoxFunction")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .field("is_initializer", &self.is_initializer)
            .finish()
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}
