use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::value::Value;

#[derive(Debug)]
struct Link {
    name: String,
    value: Value,
    owned: bool,
}

/// A named, shared reference to a [`Value`].
///
/// Bindings stored in a container's child list are *owned*. Expression
/// results travel through the evaluator as transient (not owned) bindings;
/// assigning to a transient binding that still carries a name attaches it to
/// the global scope.
///
/// Cloning a `Binding` clones the handle, so `replace_with` through any clone
/// is seen by the container that holds it.
#[derive(Clone)]
pub struct Binding(Rc<RefCell<Link>>);

impl Binding {
    /// Unnamed transient result.
    pub fn temp(value: Value) -> Self {
        Self::new(String::new(), value, false)
    }

    /// Transient result that remembers the identifier it was looked up by.
    pub fn named(name: impl Into<String>, value: Value) -> Self {
        Self::new(name.into(), value, false)
    }

    pub(crate) fn owned(name: impl Into<String>, value: Value) -> Self {
        Self::new(name.into(), value, true)
    }

    fn new(name: String, value: Value, owned: bool) -> Self {
        Binding(Rc::new(RefCell::new(Link { name, value, owned })))
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.0.borrow().name == name
    }

    pub fn value(&self) -> Value {
        self.0.borrow().value.clone()
    }

    pub fn is_owned(&self) -> bool {
        self.0.borrow().owned
    }

    /// Point this binding at another value. The old value is released once
    /// the borrow is gone so destroy hooks never see a locked binding.
    pub fn replace_with(&self, value: Value) {
        let old = std::mem::replace(&mut self.0.borrow_mut().value, value);
        drop(old);
    }

    pub fn int_name(&self) -> i64 {
        self.0.borrow().name.parse().unwrap_or(0)
    }

    pub fn set_int_name(&self, index: i64) {
        self.0.borrow_mut().name = index.to_string();
    }

    pub fn ptr_eq(&self, other: &Binding) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let link = self.0.borrow();
        f.debug_struct("Binding")
            .field("name", &link.name)
            .field("owned", &link.owned)
            .field("value", &link.value)
            .finish()
    }
}
