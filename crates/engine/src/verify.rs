//! Self-reference verifier – a small interpreter for the script dialect the
//! templates emit, plus the fixed-point check built on it.
//!
//! The dialect:
//!
//! ```text
//! program  := stmt? (";" stmt?)*
//! stmt     := "let" IDENT "=" expr | expr
//! expr     := primary ("+" primary)*
//! primary  := STRING | RAW | INT | IDENT | IDENT "(" (expr ("," expr)*)? ")" | "(" expr ")"
//! ```
//!
//! `STRING` is `"..."` with `\\ \" \n \r \t \uXXXX \xHH` escapes; `RAW` is
//! `r"..."` with no escapes. Builtins: `chr`, `source` (reflective only),
//! `find`, `slice`, `escape`, `print`.
//!
//! String literals are decoded here independently of the escape codec so the
//! check does not trust the code under test.

use crate::escape::EscapeStrategy;
use crate::types::TargetModel;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("lex error at byte {offset}: {message}")]
    Lex { offset: usize, message: String },
    #[error("parse error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },
    #[error("unknown name `{0}`")]
    UnknownName(String),
    #[error("type mismatch in {0}")]
    TypeMismatch(String),
    #[error("`{name}` takes {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: &'static str,
        got: usize,
    },
    #[error("`source()` is unavailable under the {0} target model")]
    NoSelfInspection(TargetModel),
    #[error("find: needle {0:?} does not occur")]
    NotFound(String),
    #[error("slice: {0}")]
    Slice(String),
    #[error("escape: {0}")]
    Escape(String),
    #[error("not a fixed point: output differs from source at byte {first_difference} (source {source_bytes} bytes, output {output_bytes} bytes)")]
    NotAFixedPoint {
        first_difference: usize,
        source_bytes: usize,
        output_bytes: usize,
    },
}

impl VerifyError {
    /// The program never ran: it does not lex or parse.
    pub fn is_malformed(&self) -> bool {
        matches!(self, VerifyError::Lex { .. } | VerifyError::Parse { .. })
    }
}

/// Run `program` under `model` and return everything it printed.
pub fn run(program: &str, model: TargetModel) -> Result<String, VerifyError> {
    let tokens = lex(program)?;
    let statements = Parser::new(tokens).program()?;
    let mut machine = Machine {
        source: program,
        model,
        vars: HashMap::new(),
        output: String::new(),
    };
    for stmt in &statements {
        machine.exec(stmt)?;
    }
    Ok(machine.output)
}

/// Succeeds iff running `program` under `model` prints exactly `program`.
pub fn verify(program: &str, model: TargetModel) -> Result<(), VerifyError> {
    let output = run(program, model)?;
    if output == program {
        return Ok(());
    }
    let first_difference = program
        .bytes()
        .zip(output.bytes())
        .position(|(a, b)| a != b)
        .unwrap_or_else(|| program.len().min(output.len()));
    Err(VerifyError::NotAFixedPoint {
        first_difference,
        source_bytes: program.len(),
        output_bytes: output.len(),
    })
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Let,
    Ident(String),
    Str(String),
    Int(i64),
    Eq,
    Semi,
    Comma,
    Plus,
    LParen,
    RParen,
}

fn lex(src: &str) -> Result<Vec<(usize, Tok)>, VerifyError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        let b = bytes[i];
        match b {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b'=' | b';' | b',' | b'+' | b'(' | b')' => {
                tokens.push((
                    start,
                    match b {
                        b'=' => Tok::Eq,
                        b';' => Tok::Semi,
                        b',' => Tok::Comma,
                        b'+' => Tok::Plus,
                        b'(' => Tok::LParen,
                        _ => Tok::RParen,
                    },
                ));
                i += 1;
            }
            b'r' if bytes.get(i + 1) == Some(&b'"') => {
                let body_start = i + 2;
                let len = src[body_start..].find('"').ok_or_else(|| VerifyError::Lex {
                    offset: start,
                    message: "unterminated raw string".into(),
                })?;
                tokens.push((start, Tok::Str(src[body_start..body_start + len].to_string())));
                i = body_start + len + 1;
            }
            b'"' => {
                let (value, end) = lex_string(src, i)?;
                tokens.push((start, Tok::Str(value)));
                i = end;
            }
            b'0'..=b'9' => {
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let n = src[start..i].parse().map_err(|_| VerifyError::Lex {
                    offset: start,
                    message: "integer out of range".into(),
                })?;
                tokens.push((start, Tok::Int(n)));
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let word = &src[start..i];
                tokens.push((
                    start,
                    if word == "let" {
                        Tok::Let
                    } else {
                        Tok::Ident(word.to_string())
                    },
                ));
            }
            _ => {
                let found = src[i..].chars().next().unwrap_or('?');
                return Err(VerifyError::Lex {
                    offset: start,
                    message: format!("unexpected character {found:?}"),
                });
            }
        }
    }
    Ok(tokens)
}

/// Decode the escaped literal opening at `open`; returns the value and the
/// offset just past the closing quote.
fn lex_string(src: &str, open: usize) -> Result<(String, usize), VerifyError> {
    let err = |offset: usize, message: &str| VerifyError::Lex {
        offset,
        message: message.to_string(),
    };
    let mut bytes: Vec<u8> = Vec::new();
    let mut pending_high: Option<u16> = None;
    let mut chars = src[open + 1..].char_indices().map(|(o, c)| (o + open + 1, c));
    loop {
        let (offset, c) = chars.next().ok_or_else(|| err(open, "unterminated string"))?;
        if pending_high.is_some() && c != '\\' {
            return Err(err(offset, "unpaired surrogate"));
        }
        match c {
            '"' => break,
            '\\' => {
                let (_, e) = chars.next().ok_or_else(|| err(offset, "truncated escape"))?;
                let mut hex = |width: usize| -> Result<u32, VerifyError> {
                    let mut v = 0u32;
                    for _ in 0..width {
                        let (_, d) = chars.next().ok_or_else(|| err(offset, "truncated escape"))?;
                        v = v * 16 + d.to_digit(16).ok_or_else(|| err(offset, "bad hex digit"))?;
                    }
                    Ok(v)
                };
                match e {
                    'u' => {
                        let unit = hex(4)? as u16;
                        match (pending_high.take(), unit) {
                            (None, 0xD800..=0xDBFF) => pending_high = Some(unit),
                            (None, 0xDC00..=0xDFFF) => return Err(err(offset, "unpaired surrogate")),
                            (None, u) => push_char(&mut bytes, char::from_u32(u as u32)),
                            (Some(high), 0xDC00..=0xDFFF) => {
                                let c = char::decode_utf16([high, unit]).next().and_then(Result::ok);
                                push_char(&mut bytes, c);
                            }
                            (Some(_), _) => return Err(err(offset, "unpaired surrogate")),
                        }
                    }
                    _ if pending_high.is_some() => return Err(err(offset, "unpaired surrogate")),
                    'x' => bytes.push(hex(2)? as u8),
                    '\\' => bytes.push(b'\\'),
                    '"' => bytes.push(b'"'),
                    'n' => bytes.push(b'\n'),
                    'r' => bytes.push(b'\r'),
                    't' => bytes.push(b'\t'),
                    _ => return Err(err(offset, "unknown escape")),
                }
            }
            c => push_char(&mut bytes, Some(c)),
        }
    }
    let end = chars.next().map(|(o, _)| o).unwrap_or(src.len());
    let value = String::from_utf8(bytes).map_err(|_| err(open, "literal is not valid UTF-8"))?;
    Ok((value, end))
}

fn push_char(bytes: &mut Vec<u8>, c: Option<char>) {
    if let Some(c) = c {
        let mut buf = [0u8; 4];
        bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Expr {
    Str(String),
    Int(i64),
    Var(String),
    Call(String, Vec<Expr>),
    Concat(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone)]
enum Stmt {
    Let(String, Expr),
    Expr(Expr),
}

struct Parser {
    tokens: Vec<(usize, Tok)>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<(usize, Tok)>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(o, _)| *o)
            .unwrap_or(0)
    }

    fn fail<T>(&self, message: impl Into<String>) -> Result<T, VerifyError> {
        Err(VerifyError::Parse {
            offset: self.offset(),
            message: message.into(),
        })
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        tok
    }

    fn expect(&mut self, want: Tok) -> Result<(), VerifyError> {
        if self.peek() == Some(&want) {
            self.pos += 1;
            Ok(())
        } else {
            self.fail(format!("expected {want:?}, found {:?}", self.peek()))
        }
    }

    fn program(&mut self) -> Result<Vec<Stmt>, VerifyError> {
        let mut out = Vec::new();
        loop {
            while self.peek() == Some(&Tok::Semi) {
                self.pos += 1;
            }
            if self.peek().is_none() {
                return Ok(out);
            }
            out.push(self.statement()?);
            match self.peek() {
                None | Some(Tok::Semi) => {}
                Some(t) => return self.fail(format!("expected `;`, found {t:?}")),
            }
        }
    }

    fn statement(&mut self) -> Result<Stmt, VerifyError> {
        if self.peek() == Some(&Tok::Let) {
            self.pos += 1;
            let name = match self.next() {
                Some(Tok::Ident(name)) => name,
                other => return self.fail(format!("expected a name after `let`, found {other:?}")),
            };
            self.expect(Tok::Eq)?;
            return Ok(Stmt::Let(name, self.expr()?));
        }
        Ok(Stmt::Expr(self.expr()?))
    }

    fn expr(&mut self) -> Result<Expr, VerifyError> {
        let mut lhs = self.primary()?;
        while self.peek() == Some(&Tok::Plus) {
            self.pos += 1;
            let rhs = self.primary()?;
            lhs = Expr::Concat(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn primary(&mut self) -> Result<Expr, VerifyError> {
        match self.next() {
            Some(Tok::Str(s)) => Ok(Expr::Str(s)),
            Some(Tok::Int(n)) => Ok(Expr::Int(n)),
            Some(Tok::LParen) => {
                let inner = self.expr()?;
                self.expect(Tok::RParen)?;
                Ok(inner)
            }
            Some(Tok::Ident(name)) => {
                if self.peek() != Some(&Tok::LParen) {
                    return Ok(Expr::Var(name));
                }
                self.pos += 1;
                let mut args = Vec::new();
                if self.peek() != Some(&Tok::RParen) {
                    args.push(self.expr()?);
                    while self.peek() == Some(&Tok::Comma) {
                        self.pos += 1;
                        args.push(self.expr()?);
                    }
                }
                self.expect(Tok::RParen)?;
                Ok(Expr::Call(name, args))
            }
            other => {
                self.pos = self.pos.saturating_sub(1);
                self.fail(format!("expected an expression, found {other:?}"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Str(String),
    Int(i64),
    Unit,
}

struct Machine<'a> {
    source: &'a str,
    model: TargetModel,
    vars: HashMap<String, Value>,
    output: String,
}

impl Machine<'_> {
    fn exec(&mut self, stmt: &Stmt) -> Result<(), VerifyError> {
        match stmt {
            Stmt::Let(name, expr) => {
                let v = self.eval(expr)?;
                self.vars.insert(name.clone(), v);
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, VerifyError> {
        match expr {
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Var(name) => self
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| VerifyError::UnknownName(name.clone())),
            Expr::Concat(lhs, rhs) => match (self.eval(lhs)?, self.eval(rhs)?) {
                (Value::Str(mut a), Value::Str(b)) => {
                    a.push_str(&b);
                    Ok(Value::Str(a))
                }
                (Value::Int(a), Value::Int(b)) => a
                    .checked_add(b)
                    .map(Value::Int)
                    .ok_or_else(|| VerifyError::TypeMismatch("`+` (overflow)".into())),
                _ => Err(VerifyError::TypeMismatch("`+`".into())),
            },
            Expr::Call(name, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                self.call(name, values)
            }
        }
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, VerifyError> {
        let arity = |expected: &'static str| VerifyError::Arity {
            name: name.to_string(),
            expected,
            got: args.len(),
        };
        let mismatch = || VerifyError::TypeMismatch(format!("`{name}`"));
        match name {
            "chr" => match args.as_slice() {
                [Value::Int(n)] => u32::try_from(*n)
                    .ok()
                    .and_then(char::from_u32)
                    .map(|c| Value::Str(c.to_string()))
                    .ok_or_else(mismatch),
                [_] => Err(mismatch()),
                _ => Err(arity("1")),
            },
            "source" => {
                if !args.is_empty() {
                    return Err(arity("0"));
                }
                if !self.model.has_self_inspection() {
                    return Err(VerifyError::NoSelfInspection(self.model));
                }
                Ok(Value::Str(self.source.to_string()))
            }
            "find" => match args.as_slice() {
                [Value::Str(hay), Value::Str(needle)] => hay
                    .find(needle.as_str())
                    .map(|i| Value::Int(i as i64))
                    .ok_or_else(|| VerifyError::NotFound(needle.clone())),
                [_, _] => Err(mismatch()),
                _ => Err(arity("2")),
            },
            "slice" => {
                let (s, start, end) = match args.as_slice() {
                    [Value::Str(s), Value::Int(a)] => (s, *a, s.len() as i64),
                    [Value::Str(s), Value::Int(a), Value::Int(b)] => (s, *a, *b),
                    [_, _] | [_, _, _] => return Err(mismatch()),
                    _ => return Err(arity("2 or 3")),
                };
                let range = usize::try_from(start).ok().zip(usize::try_from(end).ok());
                match range.and_then(|(a, b)| s.get(a..b)) {
                    Some(sub) => Ok(Value::Str(sub.to_string())),
                    None => Err(VerifyError::Slice(format!(
                        "{start}..{end} is not a char-aligned range of a {}-byte string",
                        s.len()
                    ))),
                }
            }
            "escape" => match args.as_slice() {
                [Value::Str(s), Value::Str(mode)] => {
                    let strategy: EscapeStrategy =
                        mode.parse().map_err(|e| VerifyError::Escape(format!("{e}")))?;
                    strategy
                        .encode(s)
                        .map(Value::Str)
                        .map_err(|e| VerifyError::Escape(e.to_string()))
                }
                [_, _] => Err(mismatch()),
                _ => Err(arity("2")),
            },
            "print" => match args.as_slice() {
                [Value::Str(s)] => {
                    self.output.push_str(s);
                    Ok(Value::Unit)
                }
                [_] => Err(mismatch()),
                _ => Err(arity("1")),
            },
            _ => Err(VerifyError::UnknownName(name.to_string())),
        }
    }
}
