//! Hand-written lexer for the view scripting language.
//!
//! The lexer only ever holds the *current* token. The parser pulls tokens
//! one at a time with `advance()` / `expect()`, and because nothing is
//! retained, loop bodies and function bodies are re-scanned from their source
//! text whenever they run. `sub_lexer()` hands out a fresh lexer over a range
//! of the *same* buffer, so positions in error messages stay correct.
//
//  Lexical items (informal):
//
//      Ident    ::= [A-Za-z_][A-Za-z0-9_]*       (reserved words split out)
//      Int      ::= [0-9]+ | 0x[0-9a-fA-F]+ | 0[0-7]+
//      Float    ::= Int '.' [0-9]* ([eE] [+-]? [0-9]+)?
//      Str      ::= '"' … '"' | '\'' … '\''
//      Ops      ::= == === != !== <= >= << <<= >> >>= >>> += -= ++ --
//                   &= && |= || ^=
//      Char     ::= any other single byte
//
//  Whitespace, `// …` and `/* … */` comments are discarded.

use std::fmt;
use std::rc::Rc;

use crate::error::{Position, Result, ScriptError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    Id,
    Int,
    Float,
    Str,
    /// Single-character token, e.g. `(` or `+`.
    Char(u8),

    Equal,
    TypeEqual,
    NotEqual,
    NotTypeEqual,
    LessEqual,
    LShift,
    LShiftEqual,
    GreaterEqual,
    RShift,
    RShiftUnsigned,
    RShiftEqual,
    PlusEqual,
    MinusEqual,
    PlusPlus,
    MinusMinus,
    AndEqual,
    AndAnd,
    OrEqual,
    OrOr,
    XorEqual,

    If,
    Else,
    Do,
    While,
    For,
    Break,
    Continue,
    Function,
    Return,
    Var,
    True,
    False,
    Null,
    Undefined,
    New,
}

const RESERVED: &[(&str, TokenKind)] = &[
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("do", TokenKind::Do),
    ("while", TokenKind::While),
    ("for", TokenKind::For),
    ("break", TokenKind::Break),
    ("continue", TokenKind::Continue),
    ("function", TokenKind::Function),
    ("return", TokenKind::Return),
    ("var", TokenKind::Var),
    ("true", TokenKind::True),
    ("false", TokenKind::False),
    ("null", TokenKind::Null),
    ("undefined", TokenKind::Undefined),
    ("new", TokenKind::New),
];

impl TokenKind {
    fn reserved(word: &str) -> Option<TokenKind> {
        RESERVED
            .iter()
            .find(|(name, _)| *name == word)
            .map(|(_, kind)| *kind)
    }

    /// Source text of operator and reserved-word tokens.
    pub fn symbol(self) -> Option<&'static str> {
        use TokenKind::*;
        let s = match self {
            Equal => "==",
            TypeEqual => "===",
            NotEqual => "!=",
            NotTypeEqual => "!==",
            LessEqual => "<=",
            LShift => "<<",
            LShiftEqual => "<<=",
            GreaterEqual => ">=",
            RShift => ">>",
            RShiftUnsigned => ">>>",
            RShiftEqual => ">>=",
            PlusEqual => "+=",
            MinusEqual => "-=",
            PlusPlus => "++",
            MinusMinus => "--",
            AndEqual => "&=",
            AndAnd => "&&",
            OrEqual => "|=",
            OrOr => "||",
            XorEqual => "^=",
            other => return RESERVED.iter().find(|(_, k)| *k == other).map(|(n, _)| *n),
        };
        Some(s)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Eof => f.write_str("EOF"),
            TokenKind::Id => f.write_str("ID"),
            TokenKind::Int => f.write_str("INT"),
            TokenKind::Float => f.write_str("FLOAT"),
            TokenKind::Str => f.write_str("STRING"),
            TokenKind::Char(c) if c.is_ascii_graphic() => write!(f, "'{}'", *c as char),
            TokenKind::Char(c) => write!(f, "?[{c}]"),
            other => f.write_str(other.symbol().unwrap_or("?")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Identifier name, literal text, or decoded string contents.
    pub text: String,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

impl Token {
    fn eof(at: usize) -> Self {
        Self {
            kind: TokenKind::Eof,
            text: String::new(),
            start: at,
            end: at,
        }
    }
}

/// Source text shared between a lexer and all of its sub-lexers.
#[derive(Debug)]
struct Source {
    text: Rc<str>,
    newlines: Vec<usize>,
}

impl Source {
    fn new(text: Rc<str>) -> Self {
        let newlines = text
            .bytes()
            .enumerate()
            .filter(|(_, b)| *b == b'\n')
            .map(|(i, _)| i)
            .collect();
        Self { text, newlines }
    }

    fn position(&self, pos: usize) -> Position {
        let line = self.newlines.partition_point(|&nl| nl < pos);
        let line_start = if line == 0 { 0 } else { self.newlines[line - 1] + 1 };
        Position {
            line: line + 1,
            col: pos.saturating_sub(line_start) + 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lexer {
    source: Rc<Source>,
    /// Byte range of `source` this lexer scans.
    begin: usize,
    end: usize,
    /// Next byte to read.
    pos: usize,
    token: Token,
    /// End offset of the token before the current one.
    prev_end: usize,
    finished: bool,
}

impl Lexer {
    pub fn new(src: &str) -> Self {
        Self::from_shared(Rc::from(src))
    }

    /// Lexer over text that is already reference-counted, e.g. a stored
    /// function body.
    pub fn from_shared(text: Rc<str>) -> Self {
        let end = text.len();
        let source = Rc::new(Source::new(text));
        Self::over(source, 0, end)
    }

    fn over(source: Rc<Source>, begin: usize, end: usize) -> Self {
        let mut lex = Self {
            source,
            begin,
            end,
            pos: begin,
            token: Token::eof(begin),
            prev_end: begin,
            finished: false,
        };
        lex.reset();
        lex
    }

    /// Rewind to the first token of this lexer's range.
    pub fn reset(&mut self) {
        self.pos = self.begin;
        self.prev_end = self.begin;
        self.finished = false;
        self.token = self.scan();
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn kind(&self) -> TokenKind {
        self.token.kind
    }

    pub fn text(&self) -> &str {
        &self.token.text
    }

    pub fn advance(&mut self) {
        self.prev_end = self.token.end;
        self.token = self.scan();
    }

    /// Consume the current token if it is `expected`, fail otherwise.
    pub fn expect(&mut self, expected: TokenKind) -> Result<()> {
        if self.token.kind != expected {
            return Err(ScriptError::UnexpectedToken {
                found: self.token.kind.to_string(),
                expected: expected.to_string(),
                position: self.position_at(self.token.start),
            });
        }
        self.advance();
        Ok(())
    }

    /// Consume an identifier and hand back its name.
    pub fn expect_id(&mut self) -> Result<String> {
        let name = self.token.text.clone();
        self.expect(TokenKind::Id)?;
        Ok(name)
    }

    pub fn position_at(&self, pos: usize) -> Position {
        self.source.position(pos)
    }

    /// Position of the current token.
    pub fn current_position(&self) -> Position {
        self.position_at(self.token.start)
    }

    /// Source text from `from` up to the end of the last consumed token.
    pub fn sub_string(&self, from: usize) -> &str {
        let to = self.prev_end.max(from).min(self.end);
        &self.source.text[from.min(to)..to]
    }

    /// Independent lexer over `[from, end of last consumed token)`.
    pub fn sub_lexer(&self, from: usize) -> Lexer {
        let to = self.prev_end.max(from).min(self.end);
        Lexer::over(Rc::clone(&self.source), from.min(to), to)
    }

    // ── scanning ─────────────────────────────────────────────────────

    fn byte(&self, at: usize) -> u8 {
        if at < self.end {
            self.source.text.as_bytes()[at]
        } else {
            0
        }
    }

    fn cur(&self) -> u8 {
        self.byte(self.pos)
    }

    fn peek(&self) -> u8 {
        self.byte(self.pos + 1)
    }

    fn skip_blanks(&mut self) {
        loop {
            while self.cur() != 0 && self.cur().is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.cur() == b'/' && self.peek() == b'/' {
                while self.cur() != 0 && self.cur() != b'\n' {
                    self.pos += 1;
                }
            } else if self.cur() == b'/' && self.peek() == b'*' {
                self.pos += 2;
                while self.cur() != 0 && !(self.cur() == b'*' && self.peek() == b'/') {
                    self.pos += 1;
                }
                self.pos = (self.pos + 2).min(self.end);
            } else {
                return;
            }
        }
    }

    fn scan(&mut self) -> Token {
        self.skip_blanks();
        let start = self.pos;
        let c = self.cur();
        if c == 0 {
            return Token::eof(start.min(self.end));
        }

        let (kind, text) = if c.is_ascii_alphabetic() || c == b'_' {
            self.read_identifier()
        } else if c.is_ascii_digit() {
            self.read_number()
        } else if c == b'"' {
            (TokenKind::Str, self.read_double_quoted())
        } else if c == b'\'' {
            (TokenKind::Str, self.read_single_quoted())
        } else {
            (self.read_operator(), String::new())
        };

        Token {
            kind,
            text,
            start,
            end: self.pos,
        }
    }

    fn consume_while<F: Fn(u8) -> bool>(&mut self, pred: F, buf: &mut String) {
        while self.cur() != 0 && pred(self.cur()) {
            buf.push(self.cur() as char);
            self.pos += 1;
        }
    }

    fn read_identifier(&mut self) -> (TokenKind, String) {
        let mut id = String::new();
        self.consume_while(|c| c.is_ascii_alphanumeric() || c == b'_', &mut id);
        let kind = TokenKind::reserved(&id).unwrap_or(TokenKind::Id);
        (kind, id)
    }

    fn read_number(&mut self) -> (TokenKind, String) {
        let mut num = String::new();
        if self.cur() == b'0' {
            num.push('0');
            self.pos += 1;
            if self.cur() == b'x' || self.cur() == b'X' {
                num.push('x');
                self.pos += 1;
                self.consume_while(|c| c.is_ascii_hexdigit(), &mut num);
                return (TokenKind::Int, num);
            }
        }

        let mut kind = TokenKind::Int;
        self.consume_while(|c| c.is_ascii_digit(), &mut num);
        if self.cur() == b'.' {
            kind = TokenKind::Float;
            num.push('.');
            self.pos += 1;
            self.consume_while(|c| c.is_ascii_digit(), &mut num);
        }
        if self.cur() == b'e' || self.cur() == b'E' {
            kind = TokenKind::Float;
            num.push('e');
            self.pos += 1;
            if self.cur() == b'-' || self.cur() == b'+' {
                num.push(self.cur() as char);
                self.pos += 1;
            }
            self.consume_while(|c| c.is_ascii_digit(), &mut num);
        }
        // decimal literals past i64 are read as doubles
        if kind == TokenKind::Int && !num.starts_with('0') && num.parse::<i64>().is_err() {
            kind = TokenKind::Float;
        }
        (kind, num)
    }

    /// `"…"`: only `\n`, `\"` and `\\` are special.
    fn read_double_quoted(&mut self) -> String {
        let mut bytes = Vec::new();
        self.pos += 1;
        while self.cur() != 0 && self.cur() != b'"' {
            if self.cur() == b'\\' {
                self.pos += 1;
                match self.cur() {
                    b'n' => bytes.push(b'\n'),
                    0 => break,
                    other => bytes.push(other),
                }
            } else {
                bytes.push(self.cur());
            }
            self.pos += 1;
        }
        self.pos = (self.pos + 1).min(self.end);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// `'…'`: the full escape set, including `\xHH` and `\ooo`.
    fn read_single_quoted(&mut self) -> String {
        let mut bytes = Vec::new();
        self.pos += 1;
        while self.cur() != 0 && self.cur() != b'\'' {
            if self.cur() == b'\\' {
                self.pos += 1;
                match self.cur() {
                    b'n' => bytes.push(b'\n'),
                    b'a' => bytes.push(0x07),
                    b'r' => bytes.push(b'\r'),
                    b't' => bytes.push(b'\t'),
                    b'x' => {
                        let mut digits = String::new();
                        while digits.len() < 2 && self.peek().is_ascii_hexdigit() {
                            self.pos += 1;
                            digits.push(self.cur() as char);
                        }
                        let code = u8::from_str_radix(&digits, 16).unwrap_or(0);
                        push_char(&mut bytes, code);
                    }
                    c @ b'0'..=b'7' => {
                        let mut digits = String::from(c as char);
                        while digits.len() < 3 && (b'0'..=b'7').contains(&self.peek()) {
                            self.pos += 1;
                            digits.push(self.cur() as char);
                        }
                        let code = u32::from_str_radix(&digits, 8).unwrap_or(0) as u8;
                        push_char(&mut bytes, code);
                    }
                    0 => break,
                    other => bytes.push(other),
                }
            } else {
                bytes.push(self.cur());
            }
            self.pos += 1;
        }
        self.pos = (self.pos + 1).min(self.end);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn read_operator(&mut self) -> TokenKind {
        use TokenKind::*;
        let c = self.cur();
        self.pos += 1;
        let n = self.cur();
        let (kind, extra) = match (c, n) {
            (b'=', b'=') if self.peek() == b'=' => (TypeEqual, 2),
            (b'=', b'=') => (Equal, 1),
            (b'!', b'=') if self.peek() == b'=' => (NotTypeEqual, 2),
            (b'!', b'=') => (NotEqual, 1),
            (b'<', b'=') => (LessEqual, 1),
            (b'<', b'<') if self.peek() == b'=' => (LShiftEqual, 2),
            (b'<', b'<') => (LShift, 1),
            (b'>', b'=') => (GreaterEqual, 1),
            (b'>', b'>') if self.peek() == b'=' => (RShiftEqual, 2),
            (b'>', b'>') if self.peek() == b'>' => (RShiftUnsigned, 2),
            (b'>', b'>') => (RShift, 1),
            (b'+', b'=') => (PlusEqual, 1),
            (b'-', b'=') => (MinusEqual, 1),
            (b'+', b'+') => (PlusPlus, 1),
            (b'-', b'-') => (MinusMinus, 1),
            (b'&', b'=') => (AndEqual, 1),
            (b'&', b'&') => (AndAnd, 1),
            (b'|', b'=') => (OrEqual, 1),
            (b'|', b'|') => (OrOr, 1),
            (b'^', b'=') => (XorEqual, 1),
            _ => (Char(c), 0),
        };
        self.pos += extra;
        kind
    }
}

/// Escaped code points are taken as Latin-1.
fn push_char(bytes: &mut Vec<u8>, code: u8) {
    let mut buf = [0u8; 4];
    bytes.extend_from_slice(char::from(code).encode_utf8(&mut buf).as_bytes());
}

/// Tokens are handed out until (and including) the end-of-input token.
impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let tok = self.token.clone();
        if tok.kind == TokenKind::Eof {
            self.finished = true;
        } else {
            self.advance();
        }
        Some(tok)
    }
}

/// Integer literal text to a value: `0x` hex, `0`-prefixed octal, decimal.
/// Anything after the longest valid prefix is ignored; no digits gives 0.
pub fn string_to_integer(s: &str) -> i64 {
    let s = s.trim();
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (radix, digits) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (16, hex)
    } else if s.len() >= 2 && s.starts_with('0') && !s.contains('.') {
        (8, &s[1..])
    } else {
        (10, s)
    };
    let valid = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    let digits = &digits[..valid];
    if digits.is_empty() {
        return 0;
    }
    // out of range saturates
    let magnitude = i128::from_str_radix(digits, radix).unwrap_or(i128::MAX);
    let value = if negative { -magnitude } else { magnitude };
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Float literal text to a value; unparsable text gives 0.0.
pub fn string_to_double(s: &str) -> f64 {
    s.trim().parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::{Lexer, TokenKind, string_to_double, string_to_integer};

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenisation() {
        use TokenKind::*;
        let test_cases = vec![
            (
                "var a = 1;",
                vec![Var, Id, Char(b'='), Int, Char(b';'), Eof],
            ),
            (
                "if (a === b) x >>>= 2;",
                vec![
                    If,
                    Char(b'('),
                    Id,
                    TypeEqual,
                    Id,
                    Char(b')'),
                    Id,
                    RShiftUnsigned,
                    Char(b'='),
                    Int,
                    Char(b';'),
                    Eof,
                ],
            ),
            (
                "a<<=1; b>>=2; c!==d; e&&f||g; h++; i--;",
                vec![
                    Id,
                    LShiftEqual,
                    Int,
                    Char(b';'),
                    Id,
                    RShiftEqual,
                    Int,
                    Char(b';'),
                    Id,
                    NotTypeEqual,
                    Id,
                    Char(b';'),
                    Id,
                    AndAnd,
                    Id,
                    OrOr,
                    Id,
                    Char(b';'),
                    Id,
                    PlusPlus,
                    Char(b';'),
                    Id,
                    MinusMinus,
                    Char(b';'),
                    Eof,
                ],
            ),
        ];

        for (src, expected) in test_cases {
            assert_eq!(kinds(src), expected, "source: {src}");
        }
    }

    #[test]
    fn test_comments_are_skipped() {
        use TokenKind::*;
        let src = "// leading\nfoo /* inline */ ( /* multi\nline */ ) // trailing";
        assert_eq!(kinds(src), vec![Id, Char(b'('), Char(b')'), Eof]);
    }

    #[test]
    fn test_numbers() {
        let test_cases = vec![
            ("42", TokenKind::Int, "42"),
            ("0x1F", TokenKind::Int, "0x1F"),
            ("017", TokenKind::Int, "017"),
            ("1.5", TokenKind::Float, "1.5"),
            ("3.", TokenKind::Float, "3."),
            ("2e10", TokenKind::Float, "2e10"),
            ("1.5E-3", TokenKind::Float, "1.5e-3"),
            ("9223372036854775807", TokenKind::Int, "9223372036854775807"),
            ("9223372036854775808", TokenKind::Float, "9223372036854775808"),
        ];
        for (src, kind, text) in test_cases {
            let lex = Lexer::new(src);
            assert_eq!(lex.kind(), kind, "source: {src}");
            assert_eq!(lex.text(), text, "source: {src}");
        }
    }

    #[test]
    fn test_string_escapes() {
        let test_cases = vec![
            (r#""a\nb""#, "a\nb"),
            (r#""say \"hi\"""#, "say \"hi\""),
            (r#""back\\slash""#, "back\\slash"),
            (r#""\t stays""#, "t stays"),
            (r"'tab\there'", "tab\there"),
            (r"'\x41\x42'", "AB"),
            (r"'\101'", "A"),
            (r"'it\'s'", "it's"),
        ];
        for (src, expected) in test_cases {
            let lex = Lexer::new(src);
            assert_eq!(lex.kind(), TokenKind::Str, "source: {src}");
            assert_eq!(lex.text(), expected, "source: {src}");
        }
    }

    #[test]
    fn test_expect_reports_position() {
        let mut lex = Lexer::new("a\n  b");
        lex.expect(TokenKind::Id).unwrap();
        let err = lex.expect(TokenKind::Char(b';')).unwrap_err();
        assert_eq!(err.to_string(), "Got ID expected ';' at (line: 2, col: 3)");
    }

    #[test]
    fn test_position_at() {
        let lex = Lexer::new("ab\ncd");
        let pos = lex.position_at(4);
        assert_eq!((pos.line, pos.col), (2, 2));
        assert_eq!(lex.current_position().to_string(), "(line: 1, col: 1)");
    }

    #[test]
    fn test_sub_lexer_rescans_range() {
        let mut lex = Lexer::new("while (i < 10) i++; done");
        lex.expect(TokenKind::While).unwrap();
        lex.expect(TokenKind::Char(b'(')).unwrap();
        let cond_start = lex.token().start;
        lex.advance();
        lex.advance();
        lex.advance();
        assert_eq!(lex.sub_string(cond_start), "i < 10");

        let mut sub = lex.sub_lexer(cond_start);
        let first: Vec<_> = sub.by_ref().map(|t| t.kind).collect();
        assert_eq!(
            first,
            vec![TokenKind::Id, TokenKind::Char(b'<'), TokenKind::Int, TokenKind::Eof]
        );
        sub.reset();
        assert_eq!(sub.text(), "i");
        // positions stay relative to the whole source
        assert_eq!(sub.current_position().col, 8);
    }

    #[test]
    fn test_empty_sub_lexer() {
        let mut lex = Lexer::new("for(;;)");
        lex.advance();
        lex.advance();
        let start = lex.token().start;
        let sub = lex.sub_lexer(start);
        assert_eq!(sub.kind(), TokenKind::Eof);
    }

    #[test]
    fn test_string_to_integer() {
        assert_eq!(string_to_integer("42"), 42);
        assert_eq!(string_to_integer("0x1F"), 31);
        assert_eq!(string_to_integer("017"), 15);
        assert_eq!(string_to_integer("-12"), -12);
        assert_eq!(string_to_integer("12abc"), 12);
        assert_eq!(string_to_integer("abc"), 0);
        assert_eq!(string_to_integer("0"), 0);
        assert_eq!(string_to_integer("99999999999999999999"), i64::MAX);
        assert_eq!(string_to_integer("-99999999999999999999"), i64::MIN);
        assert_eq!(string_to_integer("0xFFFFFFFFFFFFFFFFFF"), i64::MAX);
        assert_eq!(string_to_integer("-9223372036854775808"), i64::MIN);
    }

    #[test]
    fn test_string_to_double() {
        assert_eq!(string_to_double("1.5"), 1.5);
        assert_eq!(string_to_double("3."), 3.0);
        assert_eq!(string_to_double("2e3"), 2000.0);
        assert_eq!(string_to_double("nonsense"), 0.0);
    }
}
