//! Recursive-descent parser that evaluates while it parses.
//!
//! There is no syntax tree. Every rule takes a [`Mode`]: in `Evaluate` it
//! runs what it reads, in `Skip` it only consumes tokens so that code which
//! is not taken (the other `if` branch, a short-circuited operand, a loop
//! body being captured) keeps the token stream in step. Loop parts and
//! function bodies are captured as source ranges and re-lexed each time they
//! run.
//
//  Grammar, lowest precedence first:
//
//      statement  ::= expr ';' | block | ';' | var | if | while | do | for
//                   | break ';' | continue ';' | return expr? ';'
//                   | function Id '(' params ')' block
//      base       ::= ternary (('=' | '+=' | '-=' | '&=' | '|=' | '^='
//                                | '<<=' | '>>=') base)?
//      ternary    ::= logic ('?' base ':' base)?
//      logic      ::= condition (('&&' | '||' | '&' | '|' | '^') condition)*
//      condition  ::= shift (('==' | '===' | '!=' | '!==' | '<' | '<='
//                             | '>' | '>=') shift)*
//      shift      ::= expression (('<<' | '>>' | '>>>') expression)*
//      expression ::= '-'? term (('+' | '-') term | '++' | '--')*
//      term       ::= unary (('*' | '/' | '%') unary)*
//      unary      ::= '!' unary | factor
//      factor     ::= primary ('(' args ')' | '.' Id | '[' base ']')*

use log::{debug, warn};

use crate::context::{Context, pass_argument};
use crate::error::{Position, Result, ScriptError};
use crate::model::{Binding, Kind, PROTOTYPE, RETURN_VAR, Value};
use crate::processor::lexer::{Lexer, TokenKind, string_to_double, string_to_integer};

use TokenKind::Char;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Evaluate,
    Skip,
}

impl Mode {
    fn runs(self) -> bool {
        self == Mode::Evaluate
    }

    /// `self` if `cond` holds, `Skip` otherwise.
    fn only_if(self, cond: bool) -> Mode {
        if cond { self } else { Mode::Skip }
    }
}

/// How a statement finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Normal,
    Return,
    Break,
    Continue,
}

/// A loop whose parts have been captured as sub-lexers.
struct Loop {
    kind: &'static str,
    position: Position,
    cond: Option<Lexer>,
    iter: Option<Lexer>,
    body: Lexer,
    /// `false` for `do … while`: the body runs once before the first test.
    check_first: bool,
}

fn placeholder() -> Binding {
    Binding::temp(Value::undefined())
}

/// `;` ends a statement; it may be left out right before `}` or the end of
/// input.
fn end_statement(lex: &mut Lexer) -> Result<()> {
    match lex.kind() {
        TokenKind::Eof | Char(b'}') => Ok(()),
        _ => lex.expect(Char(b';')),
    }
}

fn at_declaration_end(kind: TokenKind) -> bool {
    matches!(kind, Char(b';') | Char(b'}') | TokenKind::Eof)
}

fn starts_expression(kind: TokenKind) -> bool {
    use TokenKind::*;
    matches!(
        kind,
        Id | Int
            | Float
            | Str
            | True
            | False
            | Null
            | Undefined
            | New
            | Char(b'-')
            | Char(b'(')
            | Char(b'[')
            | Char(b'!')
    )
}

/// Binary operator behind a compound assignment.
fn compound_operator(kind: TokenKind) -> Option<TokenKind> {
    use TokenKind::*;
    match kind {
        PlusEqual => Some(Char(b'+')),
        MinusEqual => Some(Char(b'-')),
        AndEqual => Some(Char(b'&')),
        OrEqual => Some(Char(b'|')),
        XorEqual => Some(Char(b'^')),
        LShiftEqual => Some(LShift),
        RShiftEqual => Some(RShift),
        _ => None,
    }
}

impl Context {
    fn top_scope(&self) -> Value {
        self.scopes
            .last()
            .cloned()
            .unwrap_or_else(|| self.root().clone())
    }

    // ── statements ───────────────────────────────────────────────────

    pub(crate) fn statement(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Flow> {
        use TokenKind::*;
        match lex.kind() {
            kind if starts_expression(kind) => {
                self.base(lex, mode)?;
                end_statement(lex)?;
                Ok(Flow::Normal)
            }
            Char(b'{') => self.block(lex, mode),
            Char(b';') => {
                lex.advance();
                Ok(Flow::Normal)
            }
            Var => self.var_statement(lex, mode),
            If => self.if_statement(lex, mode),
            While => self.while_statement(lex, mode),
            Do => self.do_statement(lex, mode),
            For => self.for_statement(lex, mode),
            Break | Continue => {
                let flow = if lex.kind() == Break {
                    Flow::Break
                } else {
                    Flow::Continue
                };
                lex.advance();
                end_statement(lex)?;
                Ok(if mode.runs() { flow } else { Flow::Normal })
            }
            Return => self.return_statement(lex, mode),
            Function => {
                let function = self.parse_function_definition(lex)?;
                if mode.runs() {
                    let name = function.name();
                    if name.is_empty() {
                        warn!("function declared without a name is ignored");
                    } else {
                        self.top_scope().add_child_no_dup(&name, function.value());
                    }
                }
                Ok(Flow::Normal)
            }
            _ => {
                lex.expect(Eof)?;
                Ok(Flow::Normal)
            }
        }
    }

    /// `{ statement* }`. Once a statement returns, breaks or continues, the
    /// rest of the block is only parsed.
    pub(crate) fn block(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Flow> {
        lex.expect(Char(b'{'))?;
        if !mode.runs() {
            let mut depth = 1usize;
            while lex.kind() != TokenKind::Eof && depth > 0 {
                match lex.kind() {
                    Char(b'{') => depth += 1,
                    Char(b'}') => depth -= 1,
                    _ => {}
                }
                lex.advance();
            }
            if depth > 0 {
                lex.expect(Char(b'}'))?;
            }
            return Ok(Flow::Normal);
        }

        let mut flow = Flow::Normal;
        let mut mode = mode;
        while !matches!(lex.kind(), TokenKind::Eof | Char(b'}')) {
            let result = self.statement(lex, mode)?;
            if flow == Flow::Normal && result != Flow::Normal {
                flow = result;
                mode = Mode::Skip;
            }
        }
        lex.expect(Char(b'}'))?;
        Ok(flow)
    }

    /// `var a, b = 1, c.d = 2;` declares in the innermost scope.
    fn var_statement(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Flow> {
        lex.expect(TokenKind::Var)?;
        while !at_declaration_end(lex.kind()) {
            let name = lex.expect_id()?;
            let mut target = mode
                .runs()
                .then(|| self.top_scope().find_or_create_child(&name, Kind::empty()));
            while lex.kind() == Char(b'.') {
                lex.advance();
                let member = lex.expect_id()?;
                target = target.map(|t| {
                    t.value().find_or_create_child(&member, Kind::empty())
                });
            }
            if lex.kind() == Char(b'=') {
                lex.advance();
                let init = self.base(lex, mode)?;
                if let Some(target) = &target {
                    target.replace_with(init.value());
                }
            }
            if !at_declaration_end(lex.kind()) {
                lex.expect(Char(b','))?;
            }
        }
        end_statement(lex)?;
        Ok(Flow::Normal)
    }

    fn if_statement(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Flow> {
        lex.expect(TokenKind::If)?;
        lex.expect(Char(b'('))?;
        let cond = self.base(lex, mode)?;
        lex.expect(Char(b')'))?;
        let taken = mode.runs() && cond.value().as_bool();

        let mut flow = self.statement(lex, mode.only_if(taken))?;
        if lex.kind() == TokenKind::Else {
            lex.advance();
            let other = self.statement(lex, mode.only_if(!taken))?;
            if !taken {
                flow = other;
            }
        }
        Ok(flow)
    }

    fn while_statement(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Flow> {
        let position = lex.current_position();
        lex.expect(TokenKind::While)?;
        lex.expect(Char(b'('))?;
        let cond = self.capture_expression(lex)?;
        lex.expect(Char(b')'))?;
        let body = self.capture_statement(lex)?;

        if !mode.runs() {
            return Ok(Flow::Normal);
        }
        self.run_loop(Loop {
            kind: "WHILE",
            position,
            cond: Some(cond),
            iter: None,
            body,
            check_first: true,
        })
    }

    fn do_statement(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Flow> {
        let position = lex.current_position();
        lex.expect(TokenKind::Do)?;
        let body = self.capture_statement(lex)?;
        lex.expect(TokenKind::While)?;
        lex.expect(Char(b'('))?;
        let cond = self.capture_expression(lex)?;
        lex.expect(Char(b')'))?;
        end_statement(lex)?;

        if !mode.runs() {
            return Ok(Flow::Normal);
        }
        self.run_loop(Loop {
            kind: "DO",
            position,
            cond: Some(cond),
            iter: None,
            body,
            check_first: false,
        })
    }

    /// `for (init; cond; iter) body`. The initialiser runs in place; an
    /// empty condition counts as true.
    fn for_statement(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Flow> {
        let position = lex.current_position();
        lex.expect(TokenKind::For)?;
        lex.expect(Char(b'('))?;
        self.statement(lex, mode)?;

        let cond = if lex.kind() == Char(b';') {
            None
        } else {
            Some(self.capture_expression(lex)?)
        };
        lex.expect(Char(b';'))?;
        let iter = if lex.kind() == Char(b')') {
            None
        } else {
            Some(self.capture_expression(lex)?)
        };
        lex.expect(Char(b')'))?;
        let body = self.capture_statement(lex)?;

        if !mode.runs() {
            return Ok(Flow::Normal);
        }
        self.run_loop(Loop {
            kind: "FOR",
            position,
            cond,
            iter,
            body,
            check_first: true,
        })
    }

    fn capture_expression(&mut self, lex: &mut Lexer) -> Result<Lexer> {
        let start = lex.token().start;
        self.base(lex, Mode::Skip)?;
        Ok(lex.sub_lexer(start))
    }

    fn capture_statement(&mut self, lex: &mut Lexer) -> Result<Lexer> {
        let start = lex.token().start;
        self.statement(lex, Mode::Skip)?;
        Ok(lex.sub_lexer(start))
    }

    fn run_loop(&mut self, mut lp: Loop) -> Result<Flow> {
        let limit = self.config().max_loop_iterations;
        let mut count = 0usize;
        loop {
            if lp.check_first || count > 0 {
                if let Some(cond) = lp.cond.as_mut() {
                    cond.reset();
                    if !self.base(cond, Mode::Evaluate)?.value().as_bool() {
                        break;
                    }
                }
            }
            if count >= limit {
                warn!(
                    "{} loop exceeded {} iterations at {}",
                    lp.kind, limit, lp.position
                );
                return Err(ScriptError::LoopLimit {
                    kind: lp.kind,
                    limit,
                    position: lp.position,
                });
            }
            count += 1;

            lp.body.reset();
            match self.statement(&mut lp.body, Mode::Evaluate)? {
                Flow::Break => break,
                Flow::Return => return Ok(Flow::Return),
                Flow::Normal | Flow::Continue => {}
            }
            if let Some(iter) = lp.iter.as_mut() {
                iter.reset();
                self.base(iter, Mode::Evaluate)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn return_statement(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Flow> {
        lex.expect(TokenKind::Return)?;
        let result = match lex.kind() {
            Char(b';') | Char(b'}') | TokenKind::Eof => None,
            _ => Some(self.base(lex, mode)?),
        };
        end_statement(lex)?;
        if !mode.runs() {
            return Ok(Flow::Normal);
        }

        let value = result.map(|b| b.value()).unwrap_or_default();
        match self.top_scope().find_child(RETURN_VAR) {
            Some(slot) => slot.replace_with(value),
            None => warn!("'return' outside of a function stops the script"),
        }
        Ok(Flow::Return)
    }

    // ── function definitions ─────────────────────────────────────────

    /// `function name? (params) { body }`; the body is kept as text.
    pub(crate) fn parse_function_definition(&mut self, lex: &mut Lexer) -> Result<Binding> {
        lex.expect(TokenKind::Function)?;
        let name = if lex.kind() == TokenKind::Id {
            lex.expect_id()?
        } else {
            String::new()
        };
        let function = Value::function(String::new());
        self.parse_function_arguments(lex, &function)?;
        let body_start = lex.token().start;
        self.block(lex, Mode::Skip)?;
        function.set_function_body(lex.sub_string(body_start));
        Ok(Binding::named(name, function))
    }

    /// `(a, b, c)`: one undefined child per parameter name.
    pub(crate) fn parse_function_arguments(&self, lex: &mut Lexer, function: &Value) -> Result<()> {
        lex.expect(Char(b'('))?;
        while lex.kind() != Char(b')') {
            let param = lex.expect_id()?;
            function.add_child_no_dup(&param, Value::undefined());
            if lex.kind() != Char(b')') {
                lex.expect(Char(b','))?;
            }
        }
        lex.expect(Char(b')'))
    }

    // ── expressions ──────────────────────────────────────────────────

    pub(crate) fn base(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Binding> {
        let mut lhs = self.ternary(lex, mode)?;
        let op = lex.kind();
        if op != Char(b'=') && compound_operator(op).is_none() {
            return Ok(lhs);
        }

        // Assigning to a name nobody declared makes it a global.
        if mode.runs() && !lhs.is_owned() {
            let name = lhs.name();
            if name.is_empty() {
                warn!("assignment to an unnamed value has no effect");
            } else {
                lhs = self.root().add_child_no_dup(&name, lhs.value());
            }
        }

        lex.advance();
        let rhs = self.base(lex, mode)?;
        if mode.runs() {
            let value = match compound_operator(op) {
                Some(math) => lhs.value().maths_op(&rhs.value(), math)?,
                None => rhs.value(),
            };
            lhs.replace_with(value);
        }
        Ok(lhs)
    }

    fn ternary(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Binding> {
        let cond = self.logic(lex, mode)?;
        if lex.kind() != Char(b'?') {
            return Ok(cond);
        }
        lex.advance();
        let first = mode.runs() && cond.value().as_bool();
        let when_true = self.base(lex, mode.only_if(first))?;
        lex.expect(Char(b':'))?;
        let when_false = self.base(lex, mode.only_if(!first))?;
        Ok(if first { when_true } else { when_false })
    }

    fn logic(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Binding> {
        use TokenKind::*;
        let mut a = self.condition(lex, mode)?;
        loop {
            let op = lex.kind();
            let (short_circuit, boolean, math) = match op {
                AndAnd => (mode.runs() && !a.value().as_bool(), true, Char(b'&')),
                OrOr => (mode.runs() && a.value().as_bool(), true, Char(b'|')),
                Char(b'&') | Char(b'|') | Char(b'^') => (false, false, op),
                _ => break,
            };
            lex.advance();
            let b = self.condition(lex, mode.only_if(!short_circuit))?;
            if mode.runs() && !short_circuit {
                let (x, y) = if boolean {
                    (Value::bool(a.value().as_bool()), Value::bool(b.value().as_bool()))
                } else {
                    (a.value(), b.value())
                };
                a = Binding::temp(x.maths_op(&y, math)?);
            }
        }
        Ok(a)
    }

    fn condition(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Binding> {
        use TokenKind::*;
        let mut a = self.shift(lex, mode)?;
        while matches!(
            lex.kind(),
            Equal | NotEqual | TypeEqual | NotTypeEqual | LessEqual | GreaterEqual
                | Char(b'<') | Char(b'>')
        ) {
            let op = lex.kind();
            lex.advance();
            let b = self.shift(lex, mode)?;
            if mode.runs() {
                a = Binding::temp(a.value().maths_op(&b.value(), op)?);
            }
        }
        Ok(a)
    }

    fn shift(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Binding> {
        use TokenKind::*;
        let mut a = self.expression(lex, mode)?;
        while matches!(lex.kind(), LShift | RShift | RShiftUnsigned) {
            let op = lex.kind();
            lex.advance();
            let b = self.expression(lex, mode)?;
            if mode.runs() {
                a = Binding::temp(a.value().maths_op(&b.value(), op)?);
            }
        }
        Ok(a)
    }

    /// Additive level, including prefix `-` and postfix `++` / `--`.
    fn expression(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Binding> {
        use TokenKind::*;
        let negate = lex.kind() == Char(b'-');
        if negate {
            lex.advance();
        }
        let mut a = self.term(lex, mode)?;
        if negate && mode.runs() {
            a = Binding::temp(Value::int(0).maths_op(&a.value(), Char(b'-'))?);
        }

        loop {
            let op = lex.kind();
            match op {
                PlusPlus | MinusMinus => {
                    lex.advance();
                    if mode.runs() {
                        let old = a.value();
                        let step = if op == PlusPlus { Char(b'+') } else { Char(b'-') };
                        a.replace_with(old.maths_op(&Value::int(1), step)?);
                        a = Binding::temp(old);
                    }
                }
                Char(b'+') | Char(b'-') => {
                    lex.advance();
                    let b = self.term(lex, mode)?;
                    if mode.runs() {
                        a = Binding::temp(a.value().maths_op(&b.value(), op)?);
                    }
                }
                _ => break,
            }
        }
        Ok(a)
    }

    fn term(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Binding> {
        let mut a = self.unary(lex, mode)?;
        while matches!(lex.kind(), Char(b'*') | Char(b'/') | Char(b'%')) {
            let op = lex.kind();
            lex.advance();
            let b = self.unary(lex, mode)?;
            if mode.runs() {
                a = Binding::temp(a.value().maths_op(&b.value(), op)?);
            }
        }
        Ok(a)
    }

    fn unary(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Binding> {
        if lex.kind() != Char(b'!') {
            return self.factor(lex, mode);
        }
        lex.advance();
        let a = self.unary(lex, mode)?;
        if !mode.runs() {
            return Ok(a);
        }
        Ok(Binding::temp(Value::bool(!a.value().as_bool())))
    }

    fn factor(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Binding> {
        let primary = self.primary(lex, mode)?;
        self.postfix(lex, mode, primary)
    }

    fn primary(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Binding> {
        use TokenKind::*;
        match lex.kind() {
            Char(b'(') => {
                lex.advance();
                let a = self.base(lex, mode)?;
                lex.expect(Char(b')'))?;
                Ok(a)
            }
            True | False | Null | Undefined => {
                let value = match lex.kind() {
                    True => Value::bool(true),
                    False => Value::bool(false),
                    Null => Value::null(),
                    _ => Value::undefined(),
                };
                lex.advance();
                Ok(Binding::temp(value))
            }
            Int => {
                let value = Value::int(string_to_integer(lex.text()));
                lex.advance();
                Ok(Binding::temp(value))
            }
            Float => {
                let value = Value::double(string_to_double(lex.text()));
                lex.advance();
                Ok(Binding::temp(value))
            }
            Str => {
                let value = Value::string(lex.text());
                lex.advance();
                Ok(Binding::temp(value))
            }
            Id => {
                let name = lex.expect_id()?;
                if !mode.runs() {
                    return Ok(placeholder());
                }
                // Unknown names are created on assignment, not here.
                Ok(self
                    .find_in_scopes(&name)
                    .unwrap_or_else(|| Binding::named(name, Value::undefined())))
            }
            Char(b'{') => self.object_literal(lex, mode),
            Char(b'[') => self.array_literal(lex, mode),
            Function => {
                let function = self.parse_function_definition(lex)?;
                if !function.name().is_empty() {
                    debug!("name of function expression '{}' is ignored", function.name());
                }
                Ok(Binding::temp(function.value()))
            }
            New => self.new_expression(lex, mode),
            _ => {
                lex.expect(Eof)?;
                Ok(placeholder())
            }
        }
    }

    /// `(args)`, `.name` and `[index]` chains after a primary.
    fn postfix(&mut self, lex: &mut Lexer, mode: Mode, mut a: Binding) -> Result<Binding> {
        let mut parent: Option<Value> = None;
        loop {
            match lex.kind() {
                Char(b'(') => {
                    a = self.function_call(lex, mode, &a, parent.take())?;
                }
                Char(b'.') => {
                    lex.advance();
                    let name = lex.expect_id()?;
                    if mode.runs() {
                        let object = a.value();
                        a = match self.lookup_member(&object, &name) {
                            Some(member) => member,
                            None => object.add_child(&name, Value::undefined()),
                        };
                        parent = Some(object);
                    }
                }
                Char(b'[') => {
                    lex.advance();
                    let index = self.base(lex, mode)?;
                    lex.expect(Char(b']'))?;
                    if mode.runs() {
                        let object = a.value();
                        let index = index.value();
                        a = if object.is_string() && index.is_int() {
                            let ch = usize::try_from(index.as_int())
                                .ok()
                                .and_then(|i| object.as_string().chars().nth(i));
                            Binding::temp(match ch {
                                Some(ch) => Value::string(ch),
                                None => Value::undefined(),
                            })
                        } else {
                            object.find_or_create_child(&index.as_string(), Kind::empty())
                        };
                        parent = Some(object);
                    }
                }
                _ => break,
            }
        }
        Ok(a)
    }

    /// Call `function` with the arguments that follow. Basics are copied
    /// into the call scope, composites are shared, missing arguments are
    /// `undefined` and extra ones are dropped.
    fn function_call(
        &mut self,
        lex: &mut Lexer,
        mode: Mode,
        function: &Binding,
        parent: Option<Value>,
    ) -> Result<Binding> {
        if !mode.runs() {
            self.skip_arguments(lex)?;
            return Ok(placeholder());
        }

        let callee = function.value();
        let name = function.name();
        if !callee.is_function() {
            return Err(ScriptError::type_error(format!(
                "Expecting '{name}' to be a function"
            )));
        }

        let position = lex.current_position();
        lex.expect(Char(b'('))?;
        let scope = Value::object();
        if let Some(this) = parent {
            scope.add_child_no_dup("this", this);
        }
        let params = callee.children();
        let mut given = 0;
        while lex.kind() != Char(b')') {
            let arg = self.base(lex, mode)?;
            if let Some(param) = params.get(given) {
                scope.add_child_no_dup(&param.name(), pass_argument(arg.value()));
            }
            given += 1;
            if lex.kind() != Char(b')') {
                lex.expect(Char(b','))?;
            }
        }
        lex.expect(Char(b')'))?;
        for param in params.iter().skip(given) {
            scope.add_child_no_dup(&param.name(), Value::undefined());
        }

        let name = if name.is_empty() { "anonymous" } else { name.as_str() };
        let result = self.invoke(name, &callee, scope, Some(position))?;
        Ok(Binding::temp(result))
    }

    fn skip_arguments(&mut self, lex: &mut Lexer) -> Result<()> {
        lex.expect(Char(b'('))?;
        while lex.kind() != Char(b')') {
            self.base(lex, Mode::Skip)?;
            if lex.kind() != Char(b')') {
                lex.expect(Char(b','))?;
            }
        }
        lex.expect(Char(b')'))
    }

    fn object_literal(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Binding> {
        lex.expect(Char(b'{'))?;
        let contents = Value::object();
        while lex.kind() != Char(b'}') {
            let key = lex.text().to_string();
            match lex.kind() {
                TokenKind::Str | TokenKind::Int => lex.advance(),
                _ => lex.expect(TokenKind::Id)?,
            }
            lex.expect(Char(b':'))?;
            let value = self.base(lex, mode)?;
            if mode.runs() {
                contents.add_child_no_dup(&key, value.value());
            }
            if lex.kind() != Char(b'}') {
                lex.expect(Char(b','))?;
            }
        }
        lex.expect(Char(b'}'))?;
        Ok(Binding::temp(contents))
    }

    fn array_literal(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Binding> {
        lex.expect(Char(b'['))?;
        let contents = Value::array();
        let mut idx = 0;
        while lex.kind() != Char(b']') {
            let value = self.base(lex, mode)?;
            if mode.runs() {
                contents.add_child(&idx.to_string(), value.value());
            }
            idx += 1;
            if lex.kind() != Char(b']') {
                lex.expect(Char(b','))?;
            }
        }
        lex.expect(Char(b']'))?;
        Ok(Binding::temp(contents))
    }

    /// `new F(args)` calls `F` with `this` bound to a fresh object;
    /// `new Template()` makes an object whose prototype is `Template`.
    fn new_expression(&mut self, lex: &mut Lexer, mode: Mode) -> Result<Binding> {
        lex.expect(TokenKind::New)?;
        let class_name = lex.expect_id()?;
        if !mode.runs() {
            if lex.kind() == Char(b'(') {
                self.skip_arguments(lex)?;
            }
            return Ok(placeholder());
        }

        let Some(class) = self.find_in_scopes(&class_name) else {
            return Err(ScriptError::type_error(format!(
                "{class_name} is not a valid class name"
            )));
        };
        let template = class.value();
        let instance = Value::object();
        if template.is_function() {
            if lex.kind() == Char(b'(') {
                self.function_call(lex, mode, &class, Some(instance.clone()))?;
            } else {
                self.call(&template, &[], Some(&instance))?;
            }
        } else {
            instance.add_child(PROTOTYPE, template);
            if lex.kind() == Char(b'(') {
                self.skip_arguments(lex)?;
            }
        }
        Ok(Binding::temp(instance))
    }
}
