use crate::resolver::Local;
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a runtime scope.  Closures keep their declaring scope
/// alive by holding one of these.
pub type EnvRef = Rc<RefCell<Environment>>;

/// One runtime scope frame: locals addressed by slot, in declaration order,
/// plus the lexically enclosing frame.  `None` as the enclosing frame means
/// the next scope out is the global table.
#[derive(Debug, Default)]
pub struct Environment {
    values: Vec<Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    pub fn new(enclosing: Option<EnvRef>) -> Self {
        Environment {
            values: Vec::new(),
            enclosing,
        }
    }

    /// A fresh frame that already holds `values` in slots `0..`.
    pub fn with_values(enclosing: Option<EnvRef>, values: Vec<Value>) -> EnvRef {
        Rc::new(RefCell::new(Environment { values, enclosing }))
    }

    /// Declarations execute in the order the resolver numbered them, so the
    /// next free slot is always the declared one.
    pub fn define(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Value in `slot` of this frame.
    pub fn get(&self, slot: usize) -> Option<Value> {
        self.values.get(slot).cloned()
    }
}

/// Walk `distance` links outward from `env`.
fn ancestor(env: &EnvRef, distance: usize) -> Option<EnvRef> {
    let mut current: EnvRef = Rc::clone(env);

    for _ in 0..distance {
        let next = current.borrow().enclosing.clone()?;
        current = next;
    }

    Some(current)
}

/// Read the cell at `local`.  `None` means the address does not exist in the
/// chain, which a consistent resolver never produces.
pub fn get_at(env: &EnvRef, local: Local) -> Option<Value> {
    let frame = ancestor(env, local.distance)?;
    let value = frame.borrow().get(local.slot);
    value
}

/// Overwrite the cell at `local`; `false` if the address does not exist.
pub fn assign_at(env: &EnvRef, local: Local, value: Value) -> bool {
    let Some(frame) = ancestor(env, local.distance) else {
        return false;
    };

    let mut frame = frame.borrow_mut();
    match frame.values.get_mut(local.slot) {
        Some(cell) => {
            *cell = value;
            true
        }
        None => false,
    }
}
