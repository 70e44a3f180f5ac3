//! The dynamic runtime value.
//!
//! A [`Value`] is a shared handle (`Rc<RefCell<_>>`) to a kind, a payload and
//! an ordered list of named child [`Binding`]s. Objects, arrays, function
//! parameters and scopes are all just child lists; arrays name their
//! children `"0"`, `"1"`, …
//!
//! Cycles (an object that reaches itself) are never collected.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use super::binding::Binding;
use crate::context::Context;
use crate::error::{Result, ScriptError};
use crate::processor::lexer::TokenKind;

/// Name of the slot a call scope uses to carry its result.
pub const RETURN_VAR: &str = "return";
/// Name of the child that links an instance to its template object.
pub const PROTOTYPE: &str = "prototype";

bitflags! {
    /// Type bits of a [`Value`]. No type bits at all means `undefined`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Kind: u16 {
        const FUNCTION = 1;
        const OBJECT   = 2;
        const ARRAY    = 4;
        const DOUBLE   = 8;
        const INTEGER  = 16;
        const STRING   = 32;
        const NULL     = 64;
        /// Function backed by a host callback.
        const NATIVE   = 128;

        const NUMERIC  = Self::DOUBLE.bits() | Self::INTEGER.bits();
        const VAR_TYPE = Self::FUNCTION.bits()
            | Self::OBJECT.bits()
            | Self::ARRAY.bits()
            | Self::DOUBLE.bits()
            | Self::INTEGER.bits()
            | Self::STRING.bits()
            | Self::NULL.bits();
    }
}

/// Host callback. Receives the call scope: read arguments with
/// [`Value::get_parameter`], answer with [`Value::set_return_value`].
pub type NativeFn = Rc<dyn Fn(&mut Context, &Value) -> Result<()>>;

#[derive(Clone, Default)]
pub enum Payload {
    #[default]
    Blank,
    Int(i64),
    Double(f64),
    /// String contents, or the `{…}` source of a user function.
    Str(String),
    Native(NativeFn),
}

struct Inner {
    kind: Kind,
    payload: Payload,
    children: Vec<Binding>,
    on_destroy: Option<Box<dyn FnOnce()>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(hook) = self.on_destroy.take() {
            hook();
        }
    }
}

#[derive(Clone)]
pub struct Value(Rc<RefCell<Inner>>);

impl Default for Value {
    fn default() -> Self {
        Value::undefined()
    }
}

impl Value {
    // ── construction ─────────────────────────────────────────────────

    fn build(kind: Kind, payload: Payload) -> Self {
        Value(Rc::new(RefCell::new(Inner {
            kind,
            payload,
            children: Vec::new(),
            on_destroy: None,
        })))
    }

    pub fn undefined() -> Self {
        Self::build(Kind::empty(), Payload::Blank)
    }

    pub fn null() -> Self {
        Self::build(Kind::NULL, Payload::Blank)
    }

    pub fn int(v: i64) -> Self {
        Self::build(Kind::INTEGER, Payload::Int(v))
    }

    /// Booleans are integers `1` / `0`.
    pub fn bool(v: bool) -> Self {
        Self::int(v as i64)
    }

    pub fn double(v: f64) -> Self {
        Self::build(Kind::DOUBLE, Payload::Double(v))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::build(Kind::STRING, Payload::Str(s.into()))
    }

    pub fn object() -> Self {
        Self::build(Kind::OBJECT, Payload::Blank)
    }

    pub fn array() -> Self {
        Self::build(Kind::ARRAY, Payload::Blank)
    }

    /// User function; `body` is the verbatim `{…}` text.
    pub fn function(body: impl Into<String>) -> Self {
        Self::build(Kind::FUNCTION, Payload::Str(body.into()))
    }

    pub fn native(callback: NativeFn) -> Self {
        Self::build(Kind::FUNCTION | Kind::NATIVE, Payload::Native(callback))
    }

    /// Empty value of the given kind.
    pub fn with_kind(kind: Kind) -> Self {
        Self::build(kind, Payload::Blank)
    }

    // ── kind queries ─────────────────────────────────────────────────

    pub fn kind(&self) -> Kind {
        self.0.borrow().kind
    }

    fn has(&self, bits: Kind) -> bool {
        self.kind().intersects(bits)
    }

    pub fn is_undefined(&self) -> bool {
        !self.has(Kind::VAR_TYPE)
    }
    pub fn is_null(&self) -> bool {
        self.has(Kind::NULL)
    }
    pub fn is_int(&self) -> bool {
        self.has(Kind::INTEGER)
    }
    pub fn is_double(&self) -> bool {
        self.has(Kind::DOUBLE)
    }
    pub fn is_numeric(&self) -> bool {
        self.has(Kind::NUMERIC)
    }
    pub fn is_string(&self) -> bool {
        self.has(Kind::STRING)
    }
    pub fn is_function(&self) -> bool {
        self.has(Kind::FUNCTION)
    }
    pub fn is_native(&self) -> bool {
        self.has(Kind::NATIVE)
    }
    pub fn is_object(&self) -> bool {
        self.has(Kind::OBJECT)
    }
    pub fn is_array(&self) -> bool {
        self.has(Kind::ARRAY)
    }

    /// No children: passed into calls by copy.
    pub fn is_basic(&self) -> bool {
        self.0.borrow().children.is_empty()
    }

    pub fn ptr_eq(&self, other: &Value) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ── children ─────────────────────────────────────────────────────

    /// Snapshot of the child list, in insertion order.
    pub fn children(&self) -> Vec<Binding> {
        self.0.borrow().children.clone()
    }

    pub fn first_child(&self) -> Option<Binding> {
        self.0.borrow().children.first().cloned()
    }

    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    pub fn find_child(&self, name: &str) -> Option<Binding> {
        self.0
            .borrow()
            .children
            .iter()
            .find(|b| b.has_name(name))
            .cloned()
    }

    pub fn find_or_create_child(&self, name: &str, kind: Kind) -> Binding {
        match self.find_child(name) {
            Some(child) => child,
            None => self.add_child(name, Value::with_kind(kind)),
        }
    }

    /// `"a.b.c"`: intermediate links are created as objects, the leaf as
    /// `undefined`.
    pub fn find_or_create_child_by_path(&self, path: &str) -> Binding {
        match path.split_once('.') {
            None => self.find_or_create_child(path, Kind::empty()),
            Some((head, rest)) => self
                .find_or_create_child(head, Kind::OBJECT)
                .value()
                .find_or_create_child_by_path(rest),
        }
    }

    /// Append a child. An `undefined` receiver becomes an object.
    pub fn add_child(&self, name: &str, child: Value) -> Binding {
        let link = Binding::owned(name, child);
        let mut inner = self.0.borrow_mut();
        if !inner.kind.intersects(Kind::VAR_TYPE) {
            inner.kind = Kind::OBJECT;
        }
        inner.children.push(link.clone());
        link
    }

    /// Like [`add_child`](Self::add_child) but rebinds an existing child of
    /// the same name instead of adding a second one.
    pub fn add_child_no_dup(&self, name: &str, child: Value) -> Binding {
        match self.find_child(name) {
            Some(link) => {
                link.replace_with(child);
                link
            }
            None => self.add_child(name, child),
        }
    }

    /// Drop the first link that refers to `child`.
    pub fn remove_child(&self, child: &Value) {
        let removed = {
            let mut inner = self.0.borrow_mut();
            inner
                .children
                .iter()
                .position(|b| b.value().ptr_eq(child))
                .map(|idx| inner.children.remove(idx))
        };
        drop(removed);
    }

    pub fn remove_link(&self, link: &Binding) {
        let removed = {
            let mut inner = self.0.borrow_mut();
            inner
                .children
                .iter()
                .position(|b| b.ptr_eq(link))
                .map(|idx| inner.children.remove(idx))
        };
        drop(removed);
    }

    pub fn remove_all_children(&self) {
        let removed = std::mem::take(&mut self.0.borrow_mut().children);
        drop(removed);
    }

    // ── arrays ───────────────────────────────────────────────────────

    /// Element `idx`, or `null` when there is none.
    pub fn array_get(&self, idx: i64) -> Value {
        self.find_child(&idx.to_string())
            .map(|b| b.value())
            .unwrap_or_else(Value::null)
    }

    /// Setting an element to `undefined` removes it.
    pub fn array_set(&self, idx: i64, value: Value) {
        let name = idx.to_string();
        match self.find_child(&name) {
            Some(link) if value.is_undefined() => self.remove_link(&link),
            Some(link) => link.replace_with(value),
            None if !value.is_undefined() => {
                self.add_child(&name, value);
            }
            None => {}
        }
    }

    /// Highest numeric child name plus one; `0` for non-arrays.
    pub fn array_len(&self) -> i64 {
        if !self.is_array() {
            return 0;
        }
        self.0
            .borrow()
            .children
            .iter()
            .filter_map(|b| {
                let name = b.name();
                is_index(&name).then(|| name.parse::<i64>().unwrap_or(0))
            })
            .max()
            .map_or(0, |highest| highest.saturating_add(1))
    }

    // ── conversions ──────────────────────────────────────────────────

    pub fn as_int(&self) -> i64 {
        match self.0.borrow().payload {
            Payload::Int(v) => v,
            Payload::Double(v) => v as i64,
            _ => 0,
        }
    }

    pub fn as_double(&self) -> f64 {
        match self.0.borrow().payload {
            Payload::Int(v) => v as f64,
            Payload::Double(v) => v,
            _ => 0.0,
        }
    }

    /// Truthiness: zero, NaN, the empty string, `null` and `undefined` are
    /// false; every object, array and function is true.
    pub fn as_bool(&self) -> bool {
        let inner = self.0.borrow();
        if inner.kind.intersects(Kind::OBJECT | Kind::ARRAY | Kind::FUNCTION) {
            return true;
        }
        match &inner.payload {
            Payload::Int(v) => *v != 0,
            Payload::Double(v) => *v != 0.0 && !v.is_nan(),
            Payload::Str(s) => inner.kind.contains(Kind::STRING) && !s.is_empty(),
            _ => false,
        }
    }

    pub fn as_string(&self) -> String {
        let inner = self.0.borrow();
        match &inner.payload {
            Payload::Int(v) => v.to_string(),
            Payload::Double(v) => format_double(*v),
            Payload::Str(s) => s.clone(),
            _ if inner.kind.contains(Kind::NULL) => "null".into(),
            _ if !inner.kind.intersects(Kind::VAR_TYPE) => "undefined".into(),
            _ => String::new(),
        }
    }

    // ── setters ──────────────────────────────────────────────────────

    fn set_simple(&self, kind: Kind, payload: Payload) {
        let mut inner = self.0.borrow_mut();
        inner.kind = (inner.kind - Kind::VAR_TYPE) | kind;
        inner.payload = payload;
    }

    pub fn set_int(&self, v: i64) {
        self.set_simple(Kind::INTEGER, Payload::Int(v));
    }

    pub fn set_double(&self, v: f64) {
        self.set_simple(Kind::DOUBLE, Payload::Double(v));
    }

    pub fn set_string(&self, s: impl Into<String>) {
        self.set_simple(Kind::STRING, Payload::Str(s.into()));
    }

    pub fn set_undefined(&self) {
        self.set_simple(Kind::empty(), Payload::Blank);
        self.remove_all_children();
    }

    pub fn set_array(&self) {
        self.set_simple(Kind::ARRAY, Payload::Blank);
        self.remove_all_children();
    }

    pub fn set_function_body(&self, body: impl Into<String>) {
        self.0.borrow_mut().payload = Payload::Str(body.into());
    }

    pub fn set_callback(&self, callback: NativeFn) {
        let mut inner = self.0.borrow_mut();
        inner.kind |= Kind::FUNCTION | Kind::NATIVE;
        inner.payload = Payload::Native(callback);
    }

    pub fn callback(&self) -> Option<NativeFn> {
        match &self.0.borrow().payload {
            Payload::Native(cb) => Some(Rc::clone(cb)),
            _ => None,
        }
    }

    /// Register a hook that runs when the last reference goes away.
    pub fn on_destroy(&self, hook: impl FnOnce() + 'static) {
        self.0.borrow_mut().on_destroy = Some(Box::new(hook));
    }

    // ── copying ──────────────────────────────────────────────────────

    fn copy_simple_data(&self, from: &Value) {
        let (kind, payload) = {
            let src = from.0.borrow();
            (src.kind & Kind::VAR_TYPE, src.payload.clone())
        };
        self.set_simple(kind, payload);
    }

    /// Deep copies of `children`, sharing only the prototype link.
    fn copy_children_from(&self, children: Vec<Binding>) {
        for child in children {
            let name = child.name();
            let copied = if name == PROTOTYPE {
                child.value()
            } else {
                child.value().deep_copy()
            };
            self.add_child(&name, copied);
        }
    }

    /// Become a deep copy of `from`, dropping current children.
    pub fn copy_value(&self, from: &Value) {
        if self.ptr_eq(from) {
            return;
        }
        self.copy_simple_data(from);
        self.remove_all_children();
        self.copy_children_from(from.children());
    }

    pub fn deep_copy(&self) -> Value {
        let copy = Value::undefined();
        copy.copy_simple_data(self);
        copy.copy_children_from(self.children());
        copy
    }

    // ── host bridge ──────────────────────────────────────────────────

    /// Argument `name` of a native call scope.
    pub fn get_parameter(&self, name: &str) -> Value {
        self.find_child(name)
            .map(|b| b.value())
            .unwrap_or_else(Value::undefined)
    }

    pub fn return_value(&self) -> Value {
        self.get_parameter(RETURN_VAR)
    }

    pub fn set_return_value(&self, value: Value) {
        self.find_or_create_child(RETURN_VAR, Kind::empty())
            .replace_with(value);
    }

    // ── operators ────────────────────────────────────────────────────

    pub fn equals(&self, other: &Value) -> Result<bool> {
        Ok(self.maths_op(other, TokenKind::Equal)?.as_bool())
    }

    /// Apply binary operator `op` and return a fresh value.
    pub fn maths_op(&self, b: &Value, op: TokenKind) -> Result<Value> {
        use TokenKind::*;
        let a = self;

        if matches!(op, TypeEqual | NotTypeEqual) {
            let mut eql = (a.kind() & Kind::VAR_TYPE) == (b.kind() & Kind::VAR_TYPE);
            if eql {
                eql = a.maths_op(b, Equal)?.as_bool();
            }
            return Ok(Value::bool(if op == TypeEqual { eql } else { !eql }));
        }

        if matches!(op, LShift | RShift | RShiftUnsigned) {
            let (x, n) = (a.as_int(), b.as_int());
            let shifted = match op {
                LShift => x.wrapping_shl((n & 63) as u32),
                RShift => x.wrapping_shr((n & 63) as u32),
                _ => ((x as u32) >> (n & 31)) as i64,
            };
            return Ok(Value::int(shifted));
        }

        if a.is_undefined() && b.is_undefined() {
            return Ok(match op {
                Equal => Value::bool(true),
                NotEqual => Value::bool(false),
                _ => Value::undefined(),
            });
        }

        let numeric = |v: &Value| v.is_numeric() || v.is_undefined();
        if numeric(a) && numeric(b) {
            if !a.is_double() && !b.is_double() {
                return int_op(a.as_int(), b.as_int(), op);
            }
            return double_op(a.as_double(), b.as_double(), op);
        }

        let composite = if a.is_array() {
            Some("Array")
        } else if a.is_object() {
            Some("Object")
        } else if a.is_function() {
            Some("Function")
        } else {
            None
        };
        if let Some(datatype) = composite {
            return match op {
                Equal => Ok(Value::bool(a.ptr_eq(b))),
                NotEqual => Ok(Value::bool(!a.ptr_eq(b))),
                _ => Err(unsupported(op, datatype)),
            };
        }

        let (x, y) = (a.as_string(), b.as_string());
        let v = match op {
            Char(b'+') => return Ok(Value::string(x + &y)),
            Equal => x == y,
            NotEqual => x != y,
            Char(b'<') => x < y,
            LessEqual => x <= y,
            Char(b'>') => x > y,
            GreaterEqual => x >= y,
            _ => return Err(unsupported(op, "string")),
        };
        Ok(Value::bool(v))
    }

    // ── rendering ────────────────────────────────────────────────────

    /// Text that reads back as the same value: numbers as-is, strings
    /// quoted, functions as `function (params) body`.
    pub fn parsable_string(&self) -> String {
        if self.is_numeric() {
            return self.as_string();
        }
        if self.is_function() {
            let params: Vec<String> = self.children().iter().map(Binding::name).collect();
            let body = if self.is_native() {
                "{ /* native code */ }".to_string()
            } else {
                self.as_string()
            };
            return format!("function ({}) {}", params.join(","), body);
        }
        if self.is_string() {
            return quote(&self.as_string());
        }
        if self.is_null() {
            return "null".into();
        }
        "undefined".into()
    }

    /// Space-separated names of the set type bits.
    pub fn flags_string(&self) -> String {
        const NAMES: &[(Kind, &str)] = &[
            (Kind::FUNCTION, "FUNCTION"),
            (Kind::OBJECT, "OBJECT"),
            (Kind::ARRAY, "ARRAY"),
            (Kind::NATIVE, "NATIVE"),
            (Kind::DOUBLE, "DOUBLE"),
            (Kind::INTEGER, "INTEGER"),
            (Kind::STRING, "STRING"),
            (Kind::NULL, "NULL"),
        ];
        let kind = self.kind();
        NAMES
            .iter()
            .filter(|(bit, _)| kind.contains(*bit))
            .map(|(_, name)| format!("{name} "))
            .collect()
    }
}

fn int_op(x: i64, y: i64, op: TokenKind) -> Result<Value> {
    use TokenKind::*;
    let v = match op {
        Char(b'+') => x.wrapping_add(y),
        Char(b'-') => x.wrapping_sub(y),
        Char(b'*') => x.wrapping_mul(y),
        Char(b'/') | Char(b'%') if y == 0 => {
            return Err(ScriptError::type_error("Division by zero"));
        }
        Char(b'/') => x.wrapping_div(y),
        Char(b'%') => x.wrapping_rem(y),
        Char(b'&') => x & y,
        Char(b'|') => x | y,
        Char(b'^') => x ^ y,
        Equal => return Ok(Value::bool(x == y)),
        NotEqual => return Ok(Value::bool(x != y)),
        Char(b'<') => return Ok(Value::bool(x < y)),
        LessEqual => return Ok(Value::bool(x <= y)),
        Char(b'>') => return Ok(Value::bool(x > y)),
        GreaterEqual => return Ok(Value::bool(x >= y)),
        _ => return Err(unsupported(op, "Int")),
    };
    Ok(Value::int(v))
}

fn double_op(x: f64, y: f64, op: TokenKind) -> Result<Value> {
    use TokenKind::*;
    let v = match op {
        Char(b'+') => x + y,
        Char(b'-') => x - y,
        Char(b'*') => x * y,
        Char(b'/') => x / y,
        Char(b'%') => x % y,
        Equal => return Ok(Value::bool(x == y)),
        NotEqual => return Ok(Value::bool(x != y)),
        Char(b'<') => return Ok(Value::bool(x < y)),
        LessEqual => return Ok(Value::bool(x <= y)),
        Char(b'>') => return Ok(Value::bool(x > y)),
        GreaterEqual => return Ok(Value::bool(x >= y)),
        _ => return Err(unsupported(op, "Double")),
    };
    Ok(Value::double(v))
}

fn unsupported(op: TokenKind, datatype: &str) -> ScriptError {
    ScriptError::type_error(format!(
        "Operation {op} not supported on the {datatype} datatype"
    ))
}

/// Child names made only of digits count as array indices.
pub(crate) fn is_index(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

/// Doubles print without a trailing `.0` when they hold an integral value.
pub fn format_double(v: f64) -> String {
    if v.is_nan() {
        "NaN".into()
    } else if v.is_infinite() {
        if v > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else if v.abs() >= 1e21 || (v != 0.0 && v.abs() < 1e-6) {
        format!("{v:e}")
    } else {
        format!("{v}")
    }
}

/// Double-quoted, JSON-escaped string literal.
pub fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Value({}{:?}, {} children)",
            self.flags_string(),
            self.as_string(),
            self.child_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    fn plus() -> TokenKind {
        TokenKind::Char(b'+')
    }

    #[test]
    fn test_maths_op_table() {
        use TokenKind::*;
        let test_cases = vec![
            (Value::int(7), Value::int(2), Char(b'/'), "3"),
            (Value::int(7), Value::int(2), Char(b'%'), "1"),
            (Value::int(6), Value::int(3), Char(b'&'), "2"),
            (Value::int(1), Value::double(0.5), Char(b'+'), "1.5"),
            (Value::double(1.0), Value::double(1.0), Char(b'+'), "2"),
            (Value::string("ab"), Value::int(1), Char(b'+'), "ab1"),
            (Value::int(1), Value::string("ab"), Char(b'+'), "1ab"),
            (Value::string("a"), Value::string("b"), Char(b'<'), "1"),
            (Value::undefined(), Value::int(3), Char(b'+'), "3"),
            (Value::int(1), Value::int(4), LShift, "16"),
            (Value::int(-16), Value::int(2), RShift, "-4"),
            (Value::int(-1), Value::int(28), RShiftUnsigned, "15"),
            (Value::int(1), Value::double(1.0), TypeEqual, "0"),
            (Value::int(1), Value::double(1.0), Equal, "1"),
            (Value::undefined(), Value::undefined(), Equal, "1"),
        ];
        for (a, b, op, expected) in test_cases {
            let res = a.maths_op(&b, op).unwrap();
            assert_eq!(res.as_string(), expected, "{a:?} {op} {b:?}");
        }
    }

    #[test]
    fn test_maths_op_errors() {
        let div = Value::int(1).maths_op(&Value::int(0), TokenKind::Char(b'/'));
        assert_eq!(div.unwrap_err().to_string(), "Division by zero");

        let obj = Value::object();
        let err = obj.maths_op(&Value::int(1), plus()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Operation '+' not supported on the Object datatype"
        );

        let err = Value::string("a")
            .maths_op(&Value::string("b"), TokenKind::Char(b'*'))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Operation '*' not supported on the string datatype"
        );
    }

    #[test]
    fn test_composites_compare_by_identity() {
        let a = Value::object();
        let b = Value::object();
        assert!(a.equals(&a.clone()).unwrap());
        assert!(!a.equals(&b).unwrap());
    }

    #[test]
    fn test_add_child_promotes_undefined() {
        let v = Value::undefined();
        v.add_child("x", Value::int(1));
        assert!(v.is_object());
        assert_eq!(v.find_child("x").unwrap().value().as_int(), 1);
    }

    #[test]
    fn test_add_child_no_dup_rebinds() {
        let v = Value::object();
        let first = v.add_child_no_dup("x", Value::int(1));
        let second = v.add_child_no_dup("x", Value::int(2));
        assert!(first.ptr_eq(&second));
        assert_eq!(v.child_count(), 1);
        assert_eq!(first.value().as_int(), 2);
    }

    #[test]
    fn test_find_or_create_child_by_path() {
        let root = Value::object();
        let leaf = root.find_or_create_child_by_path("a.b.c");
        leaf.replace_with(Value::int(9));
        let a = root.find_child("a").unwrap().value();
        assert!(a.is_object());
        let b = a.find_child("b").unwrap().value();
        assert_eq!(b.find_child("c").unwrap().value().as_int(), 9);
    }

    #[test]
    fn test_array_indices() {
        let arr = Value::array();
        arr.array_set(0, Value::int(10));
        arr.array_set(4, Value::int(50));
        assert_eq!(arr.array_len(), 5);
        assert!(arr.array_get(2).is_null());
        arr.array_set(4, Value::undefined());
        assert_eq!(arr.array_len(), 1);
        assert_eq!(Value::object().array_len(), 0);

        arr.array_set(i64::MAX, Value::int(1));
        assert_eq!(arr.array_len(), i64::MAX);
    }

    #[test]
    fn test_deep_copy_shares_prototype() {
        let proto = Value::object();
        let obj = Value::object();
        obj.add_child(PROTOTYPE, proto.clone());
        obj.add_child("inner", Value::object());

        let copy = obj.deep_copy();
        let copied_proto = copy.find_child(PROTOTYPE).unwrap().value();
        let copied_inner = copy.find_child("inner").unwrap().value();
        assert!(copied_proto.ptr_eq(&proto));
        assert!(!copied_inner.ptr_eq(&obj.find_child("inner").unwrap().value()));
    }

    #[test]
    fn test_copy_value_replaces_children() {
        let target = Value::object();
        target.add_child("old", Value::int(1));
        let source = Value::array();
        source.array_set(0, Value::string("x"));
        target.copy_value(&source);
        assert!(target.is_array());
        assert!(target.find_child("old").is_none());
        assert_eq!(target.array_get(0).as_string(), "x");
    }

    #[test]
    fn test_truthiness() {
        let test_cases = vec![
            (Value::int(0), false),
            (Value::int(2), true),
            (Value::double(0.0), false),
            (Value::double(f64::NAN), false),
            (Value::string(""), false),
            (Value::string("0"), true),
            (Value::null(), false),
            (Value::undefined(), false),
            (Value::object(), true),
            (Value::array(), true),
        ];
        for (v, expected) in test_cases {
            assert_eq!(v.as_bool(), expected, "{v:?}");
        }
    }

    #[test]
    fn test_format_double() {
        let test_cases = vec![
            (2.0, "2"),
            (-0.5, "-0.5"),
            (1.25, "1.25"),
            (f64::NAN, "NaN"),
            (f64::INFINITY, "Infinity"),
            (1e20, "100000000000000000000"),
            (1e21, "1e21"),
            (-1e300, "-1e300"),
            (1.5e-7, "1.5e-7"),
        ];
        for (v, expected) in test_cases {
            assert_eq!(format_double(v), expected);
        }
    }

    #[test]
    fn test_parsable_string() {
        let f = Value::function("{ return a; }");
        f.add_child("a", Value::undefined());
        f.add_child("b", Value::undefined());
        assert_eq!(f.parsable_string(), "function (a,b) { return a; }");
        assert_eq!(Value::string("say \"hi\"\n").parsable_string(), r#""say \"hi\"\n""#);
        assert_eq!(Value::null().parsable_string(), "null");
        assert_eq!(Value::undefined().parsable_string(), "undefined");
    }

    #[test]
    fn test_return_slot() {
        let scope = Value::object();
        assert!(scope.return_value().is_undefined());
        scope.set_return_value(Value::int(5));
        scope.set_return_value(Value::int(6));
        assert_eq!(scope.return_value().as_int(), 6);
        assert_eq!(scope.child_count(), 1);
    }

    #[test]
    fn test_on_destroy_runs_on_last_release() {
        let dropped = Rc::new(Cell::new(false));
        let flag = Rc::clone(&dropped);
        let v = Value::object();
        v.on_destroy(move || flag.set(true));

        let holder = Value::object();
        holder.add_child("v", v.clone());
        drop(v);
        assert!(!dropped.get());
        holder.remove_all_children();
        assert!(dropped.get());
    }
}
