//! Runtime data model: values and the bindings that link them together.
//!
//! Everything the interpreter manipulates is a [`Value`]; containers hold
//! their members as an ordered list of [`Binding`]s. Both are cheap handles
//! around shared state, so cloning one never copies script data.

pub mod binding;
pub mod value;

pub use binding::Binding;
pub use value::{Kind, NativeFn, PROTOTYPE, Payload, RETURN_VAR, Value};
