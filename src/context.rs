//! The engine instance.
//!
//! A [`Context`] owns the global root object, the scope stack and the three
//! built-in stand-ins (`String`, `Array`, `Object`) that member lookup falls
//! back to. Host code drives it through [`Context::execute`],
//! [`Context::evaluate`] and [`Context::register_native`].

use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, trace};

use crate::config::EngineConfig;
use crate::error::{Exception, Position, Result, ScriptError};
use crate::model::{Binding, PROTOTYPE, RETURN_VAR, Value};
use crate::processor::evaluator::{Flow, Mode};
use crate::processor::lexer::{Lexer, TokenKind, string_to_double, string_to_integer};

pub struct Context {
    root: Value,
    string_class: Value,
    array_class: Value,
    object_class: Value,
    /// Innermost scope last; `scopes[0]` is always `root`.
    pub(crate) scopes: Vec<Value>,
    pub(crate) call_stack: Vec<String>,
    /// The error in flight and the frames that were live where it was raised.
    failure: Option<(ScriptError, Vec<String>)>,
    config: EngineConfig,
    rng: u64,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A context with the default configuration and no built-in library.
    pub fn new() -> Self {
        Self::bare(EngineConfig::default())
    }

    /// A context for `config`; installs the built-in library when
    /// `config.builtins` is set.
    pub fn with_config(config: EngineConfig) -> std::result::Result<Self, Exception> {
        let install = config.builtins;
        let mut ctx = Self::bare(config);
        if install {
            crate::builtins::register_all(&mut ctx)?;
        }
        Ok(ctx)
    }

    fn bare(config: EngineConfig) -> Self {
        let root = Value::object();
        let string_class = Value::object();
        let array_class = Value::object();
        let object_class = Value::object();
        root.add_child("String", string_class.clone());
        root.add_child("Array", array_class.clone());
        root.add_child("Object", object_class.clone());

        let seed = config.rng_seed.unwrap_or_else(clock_seed);
        Self {
            scopes: vec![root.clone()],
            root,
            string_class,
            array_class,
            object_class,
            call_stack: Vec::new(),
            failure: None,
            config,
            rng: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── entry points ─────────────────────────────────────────────────

    /// Run a whole program.
    pub fn execute(&mut self, code: &str) -> std::result::Result<(), Exception> {
        self.run_isolated(|ctx| {
            let mut lex = Lexer::new(code);
            let mut mode = Mode::Evaluate;
            while lex.kind() != TokenKind::Eof {
                let flow = ctx.statement(&mut lex, mode)?;
                mode = ctx.top_level_flow(&lex, mode, flow)?;
            }
            Ok(())
        })
    }

    /// Run `code` and hand back the binding of the last expression
    /// evaluated, or `undefined` when there was none.
    pub fn evaluate_complex(&mut self, code: &str) -> std::result::Result<Binding, Exception> {
        self.run_isolated(|ctx| {
            let mut lex = Lexer::new(code);
            let mut mode = Mode::Evaluate;
            let mut last = None;
            loop {
                if starts_statement(lex.kind()) {
                    let flow = ctx.statement(&mut lex, mode)?;
                    mode = ctx.top_level_flow(&lex, mode, flow)?;
                } else {
                    last = Some(ctx.base(&mut lex, mode)?);
                    if lex.kind() != TokenKind::Eof {
                        lex.expect(TokenKind::Char(b';'))?;
                    }
                }
                if lex.kind() == TokenKind::Eof {
                    break;
                }
            }
            Ok(last.unwrap_or_else(|| Binding::temp(Value::undefined())))
        })
    }

    /// [`evaluate_complex`](Self::evaluate_complex) rendered as a string.
    pub fn evaluate(&mut self, code: &str) -> std::result::Result<String, Exception> {
        Ok(self.evaluate_complex(code)?.value().as_string())
    }

    /// Fresh scope stack and call stack for one run; both are put back
    /// afterwards so a native callback can re-enter the engine.
    fn run_isolated<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> std::result::Result<T, Exception> {
        let saved_scopes = std::mem::replace(&mut self.scopes, vec![self.root.clone()]);
        let saved_stack = std::mem::take(&mut self.call_stack);
        let saved_failure = self.failure.take();
        let result = body(self);
        let live = std::mem::replace(&mut self.call_stack, saved_stack);
        let failure = std::mem::replace(&mut self.failure, saved_failure);
        self.scopes = saved_scopes;
        result.map_err(|error| {
            let frames = match failure {
                Some((raised, frames)) if raised == error => frames,
                _ => live,
            };
            Exception::new(error, frames)
        })
    }

    /// A top-level `return` stops execution of the rest of the program;
    /// `break` / `continue` outside of a loop are errors.
    fn top_level_flow(&self, lex: &Lexer, mode: Mode, flow: Flow) -> Result<Mode> {
        match flow {
            Flow::Normal => Ok(mode),
            Flow::Return => Ok(Mode::Skip),
            Flow::Break | Flow::Continue => Err(stray_jump(flow, lex.current_position())),
        }
    }

    // ── native bridge ────────────────────────────────────────────────

    /// Install a host callback under `signature`, e.g.
    /// `"function Math.max(a,b)"`. Dotted names create (or reuse) object
    /// namespaces in the root scope.
    pub fn register_native<F>(&mut self, signature: &str, callback: F) -> Result<()>
    where
        F: Fn(&mut Context, &Value) -> Result<()> + 'static,
    {
        let mut lex = Lexer::new(signature);
        lex.expect(TokenKind::Function)?;
        let mut name = lex.expect_id()?;
        let mut base = self.root.clone();
        while lex.kind() == TokenKind::Char(b'.') {
            lex.advance();
            let link = match base.find_child(&name) {
                Some(link) => link,
                None => base.add_child(&name, Value::object()),
            };
            base = link.value();
            name = lex.expect_id()?;
        }

        let function = Value::native(Rc::new(callback));
        self.parse_function_arguments(&mut lex, &function)?;
        debug!("registered native {signature}");
        base.add_child_no_dup(&name, function);
        Ok(())
    }

    /// Call `function` from host code. Arguments follow the same rules as a
    /// script call: basics are copied, composites shared.
    pub fn call(
        &mut self,
        function: &Value,
        args: &[Value],
        this: Option<&Value>,
    ) -> Result<Value> {
        if !function.is_function() {
            return Err(ScriptError::type_error("Expecting a function to call"));
        }
        let scope = Value::object();
        if let Some(this) = this {
            scope.add_child_no_dup("this", this.clone());
        }
        for (idx, param) in function.children().iter().enumerate() {
            let arg = args.get(idx).cloned().unwrap_or_default();
            scope.add_child(&param.name(), pass_argument(arg));
        }
        self.invoke("<host call>", function, scope, None)
    }

    /// Push `scope`, run the function body, pop `scope` again (on every
    /// path) and return what was left in the `return` slot.
    pub(crate) fn invoke(
        &mut self,
        name: &str,
        function: &Value,
        scope: Value,
        position: Option<Position>,
    ) -> Result<Value> {
        let return_link = scope.add_child(RETURN_VAR, Value::undefined());
        let depth = self.scopes.len();
        let frame_depth = self.call_stack.len();
        self.scopes.push(scope.clone());
        if self.config.call_stack {
            self.call_stack.push(match position {
                Some(pos) => format!("{name} {pos}"),
                None => name.to_string(),
            });
        }
        trace!("call {name}");

        let outcome = self.run_function_body(function, &scope);
        self.scopes.truncate(depth);
        if let Err(error) = &outcome {
            self.record_failure(error);
        }
        self.call_stack.truncate(frame_depth);
        outcome?;

        let result = return_link.value();
        scope.remove_link(&return_link);
        Ok(result)
    }

    /// Keep the frames of the innermost call an error escaped from; an
    /// error seen before (the same one propagating outwards) keeps its
    /// original frames.
    fn record_failure(&mut self, error: &ScriptError) {
        let known = matches!(&self.failure, Some((raised, _)) if raised == error);
        if !known {
            self.failure = Some((error.clone(), self.call_stack.clone()));
        }
    }

    fn run_function_body(&mut self, function: &Value, scope: &Value) -> Result<()> {
        if let Some(callback) = function.callback() {
            return callback(self, scope);
        }
        let mut lex = Lexer::new(&function.as_string());
        match self.block(&mut lex, Mode::Evaluate)? {
            flow @ (Flow::Break | Flow::Continue) => Err(stray_jump(flow, lex.current_position())),
            _ => Ok(()),
        }
    }

    // ── lookup ───────────────────────────────────────────────────────

    /// Innermost binding called `name` on the scope stack.
    pub fn find_in_scopes(&self, name: &str) -> Option<Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.find_child(name))
    }

    /// Member `name` of `object`: own child, then the prototype chain, then
    /// the built-in stand-in for the value's kind, then a computed `length`.
    pub fn lookup_member(&self, object: &Value, name: &str) -> Option<Binding> {
        object
            .find_child(name)
            .or_else(|| self.find_in_parent_classes(object, name))
            .or_else(|| computed_length(object, name))
    }

    fn find_in_parent_classes(&self, object: &Value, name: &str) -> Option<Binding> {
        let mut seen: Vec<Value> = Vec::new();
        let mut link = object.find_child(PROTOTYPE);
        while let Some(proto) = link.map(|l| l.value()) {
            if seen.iter().any(|v| v.ptr_eq(&proto)) {
                break;
            }
            if let Some(found) = proto.find_child(name) {
                return Some(found);
            }
            link = proto.find_child(PROTOTYPE);
            seen.push(proto);
        }

        if object.is_string() {
            if let Some(found) = self.string_class.find_child(name) {
                return Some(found);
            }
        }
        if object.is_array() {
            if let Some(found) = self.array_class.find_child(name) {
                return Some(found);
            }
        }
        self.object_class.find_child(name)
    }

    // ── host access by path ──────────────────────────────────────────

    /// Value at a dotted path below the root, e.g. `"config.size.w"`.
    pub fn get_script_variable(&self, path: &str) -> Option<Value> {
        path.split('.').try_fold(self.root.clone(), |var, element| {
            var.find_child(element).map(|link| link.value())
        })
    }

    pub fn get_variable(&self, path: &str) -> Option<String> {
        self.get_script_variable(path).map(|v| v.as_string())
    }

    /// Overwrite an existing variable from text, keeping its numeric kind.
    /// Returns `false` when the path does not exist.
    pub fn set_variable(&self, path: &str, data: &str) -> bool {
        let Some(var) = self.get_script_variable(path) else {
            return false;
        };
        if var.is_int() {
            var.set_int(string_to_integer(data));
        } else if var.is_double() {
            var.set_double(string_to_double(data));
        } else {
            var.set_string(data);
        }
        true
    }

    // ── misc ─────────────────────────────────────────────────────────

    /// Next number of the xorshift sequence, in `[0, 1)`.
    pub fn next_random(&mut self) -> f64 {
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 7;
        self.rng ^= self.rng << 17;
        (self.rng & 0x000F_FFFF_FFFF_FFFF) as f64 / (0x0010_0000_0000_0000u64 as f64)
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.scopes.clear();
        self.root.remove_all_children();
    }
}

/// Basics enter a call by copy, composites by reference.
pub(crate) fn pass_argument(value: Value) -> Value {
    if value.is_basic() {
        value.deep_copy()
    } else {
        value
    }
}

fn computed_length(object: &Value, name: &str) -> Option<Binding> {
    if name != "length" {
        return None;
    }
    if object.is_array() {
        return Some(Binding::temp(Value::int(object.array_len())));
    }
    if object.is_string() {
        let len = object.as_string().chars().count() as i64;
        return Some(Binding::temp(Value::int(len)));
    }
    None
}

fn starts_statement(kind: TokenKind) -> bool {
    use TokenKind::*;
    matches!(
        kind,
        Var | If | While | Do | For | Return | Function | Break | Continue | Char(b';')
    )
}

fn stray_jump(flow: Flow, position: Position) -> ScriptError {
    let keyword = if flow == Flow::Break { "break" } else { "continue" };
    ScriptError::Syntax {
        message: format!("'{keyword}' used outside of a loop"),
        position,
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_stack_restored_after_error() {
        let mut ctx = Context::new();
        ctx.execute("function f() { var x = 1; undefinedFn(); }").unwrap();
        assert!(ctx.execute("f();").is_err());
        assert_eq!(ctx.scopes.len(), 1);
        assert!(ctx.scopes[0].ptr_eq(ctx.root()));
        assert!(ctx.call_stack.is_empty());
    }

    #[test]
    fn test_register_native_namespaces() {
        let mut ctx = Context::new();
        ctx.register_native("function Geo.Point.make(x,y)", |_, scope| {
            let sum = scope.get_parameter("x").as_int() + scope.get_parameter("y").as_int();
            scope.set_return_value(Value::int(sum));
            Ok(())
        })
        .unwrap();
        let geo = ctx.get_script_variable("Geo.Point").unwrap();
        assert!(geo.is_object());
        let make = ctx.get_script_variable("Geo.Point.make").unwrap();
        assert!(make.is_native());
        assert_eq!(make.parsable_string(), "function (x,y) { /* native code */ }");
        assert_eq!(ctx.evaluate("Geo.Point.make(1, 2)").unwrap(), "3");
    }

    #[test]
    fn test_bad_signature_is_rejected() {
        let mut ctx = Context::new();
        let err = ctx.register_native("fn broken()", |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, ScriptError::UnexpectedToken { .. }));
    }

    #[test]
    fn test_lookup_member_follows_prototypes() {
        let ctx = Context::new();
        let base = Value::object();
        base.add_child("greet", Value::string("hi"));
        let mid = Value::object();
        mid.add_child(PROTOTYPE, base);
        let obj = Value::object();
        obj.add_child(PROTOTYPE, mid);

        let found = ctx.lookup_member(&obj, "greet").unwrap();
        assert_eq!(found.value().as_string(), "hi");
        assert!(ctx.lookup_member(&obj, "missing").is_none());
    }

    #[test]
    fn test_lookup_member_survives_prototype_cycle() {
        let ctx = Context::new();
        let a = Value::object();
        let b = Value::object();
        a.add_child(PROTOTYPE, b.clone());
        b.add_child(PROTOTYPE, a.clone());
        assert!(ctx.lookup_member(&a, "nothing").is_none());
        a.remove_all_children();
    }

    #[test]
    fn test_computed_length() {
        let ctx = Context::new();
        let s = Value::string("héllo");
        assert_eq!(ctx.lookup_member(&s, "length").unwrap().value().as_int(), 5);
        let arr = Value::array();
        arr.array_set(2, Value::int(1));
        assert_eq!(ctx.lookup_member(&arr, "length").unwrap().value().as_int(), 3);
        assert_eq!(arr.child_count(), 1);
    }

    #[test]
    fn test_variable_access_by_path() {
        let mut ctx = Context::new();
        ctx.execute("var cfg = { size: { w: 3 }, ratio: 1.5, name: 'x' };").unwrap();
        assert_eq!(ctx.get_variable("cfg.size.w").as_deref(), Some("3"));
        assert!(ctx.get_variable("cfg.nope").is_none());

        assert!(ctx.set_variable("cfg.size.w", "0x10"));
        assert!(ctx.set_variable("cfg.ratio", "2.25"));
        assert!(ctx.set_variable("cfg.name", "y"));
        assert!(!ctx.set_variable("cfg.other", "1"));
        assert_eq!(ctx.evaluate("cfg.size.w + cfg.ratio").unwrap(), "18.25");
        assert_eq!(ctx.get_variable("cfg.name").as_deref(), Some("y"));
    }

    #[test]
    fn test_host_call_copies_basics() {
        let mut ctx = Context::new();
        ctx.execute("function bump(n, o) { n = n + 1; o.n = n; return n; }").unwrap();
        let bump = ctx.get_script_variable("bump").unwrap();
        let n = Value::int(1);
        let o = Value::object();
        o.add_child("n", Value::int(0));
        let res = ctx.call(&bump, &[n.clone(), o.clone()], None).unwrap();
        assert_eq!(res.as_int(), 2);
        assert_eq!(n.as_int(), 1);
        assert_eq!(o.find_child("n").unwrap().value().as_int(), 2);
        assert!(ctx.call(&Value::int(1), &[], None).is_err());
    }

    #[test]
    fn test_childless_object_is_passed_by_copy() {
        let mut ctx = Context::new();
        ctx.execute("function fill(o) { o.x = 1; }").unwrap();
        let fill = ctx.get_script_variable("fill").unwrap();
        let empty = Value::object();
        ctx.call(&fill, &[empty.clone()], None).unwrap();
        assert_eq!(empty.child_count(), 0);

        let seeded = Value::object();
        seeded.add_child("y", Value::int(0));
        ctx.call(&fill, &[seeded.clone()], None).unwrap();
        assert_eq!(seeded.get_parameter("x").as_int(), 1);
    }

    #[test]
    fn test_swallowed_error_leaves_no_frame() {
        let mut ctx = Context::new();
        ctx.execute("function bad() { nope(); }\nfunction worse() { alsoNope(); }")
            .unwrap();
        ctx.register_native("function quiet()", |ctx, _| {
            let bad = ctx.get_script_variable("bad").unwrap_or_default();
            assert!(ctx.call(&bad, &[], None).is_err());
            Ok(())
        })
        .unwrap();

        let err = ctx.execute("quiet();\nworse();").unwrap_err();
        assert_eq!(err.call_stack.len(), 1, "{:?}", err.call_stack);
        assert!(err.call_stack[0].starts_with("worse (line: 2"));

        let err = ctx.execute("quiet(); missing();").unwrap_err();
        assert!(err.call_stack.is_empty(), "{:?}", err.call_stack);
        assert!(ctx.call_stack.is_empty());
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let config = EngineConfig {
            rng_seed: Some(42),
            builtins: false,
            ..EngineConfig::default()
        };
        let mut a = Context::with_config(config.clone()).unwrap();
        let mut b = Context::with_config(config).unwrap();
        for _ in 0..5 {
            let x = a.next_random();
            assert!((0.0..1.0).contains(&x));
            assert_eq!(x, b.next_random());
        }
    }
}
