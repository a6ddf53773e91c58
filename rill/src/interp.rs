//! The script interpreter.
//!
//! [`Interpreter`] is a fused parser/evaluator: it executes straight off the
//! [`Lexer`]'s token stream with no syntax tree, resolving control flow by
//! re-scanning tokens and tracking block nesting.  A `for` header is re-parsed
//! on every iteration (the lexer cursor is moved back to the recorded header
//! location), so header parsing must be idempotent: only a *fresh* entry,
//! where the top block context is not already a `for` over the same variable,
//! initialises the counter.
//!
//! Three entry points sit on one dispatcher:
//!
//! - [`Interpreter::run`] — batch: execute a source to completion.
//! - [`Interpreter::step`] — execute exactly one statement, preserving all
//!   state between calls, so a host can interleave script execution with its
//!   own per-tick work.
//! - [`Interpreter::run_interactive`] — REPL: accumulate typed lines until
//!   every opened `if`/`for` block is closed, then run the buffer as a batch.
//!
//! The interpreter owns its variable environment, label table, and block
//! context stack exclusively; hosts needing concurrent scripts use one
//! interpreter per script.

use std::collections::HashMap;

use crate::builtins::{Library, NativeAction, NativeFn, StandardLibrary};
use crate::error::{CallError, ErrorKind, ScriptError};
use crate::lexer::{Lexer, Location, TokenKind};
use crate::value::{BinaryOp, Value};

// ── Block context ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum ClauseKind {
    If,
    For { var: String },
}

/// Runtime record of an open `if` or `for` construct.
#[derive(Debug, Clone)]
struct Clause {
    kind: ClauseKind,
    /// Statement-start location of the opening keyword; `for` re-entry seeks
    /// the lexer back here.
    location: Location,
}

// ── Interactive outcome ───────────────────────────────────────────────────────

/// Result of feeding one line to [`Interpreter::run_interactive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interactive {
    /// The line opened a block that is not closed yet; input was buffered.
    Deferred,
    /// The accumulated buffer was executed and cleared.
    Completed,
}

// ── Operator precedence ───────────────────────────────────────────────────────

/// Binary operator for a token, if the token may appear in binary position.
fn binary_op_of(kind: TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Plus => Some(BinaryOp::Add),
        TokenKind::Minus => Some(BinaryOp::Sub),
        TokenKind::Star => Some(BinaryOp::Mul),
        TokenKind::Slash => Some(BinaryOp::Div),
        TokenKind::SlashSlash => Some(BinaryOp::FloorDiv),
        TokenKind::Percent => Some(BinaryOp::Rem),
        TokenKind::StarStar => Some(BinaryOp::Pow),
        TokenKind::Eq => Some(BinaryOp::Eq),
        TokenKind::Ne => Some(BinaryOp::Ne),
        TokenKind::Lt => Some(BinaryOp::Lt),
        TokenKind::Gt => Some(BinaryOp::Gt),
        TokenKind::Le => Some(BinaryOp::Le),
        TokenKind::Ge => Some(BinaryOp::Ge),
        TokenKind::And => Some(BinaryOp::And),
        TokenKind::Or => Some(BinaryOp::Or),
        _ => None,
    }
}

/// Fixed precedence, tightest binding first.
fn precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Pow => 0,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Rem => 1,
        BinaryOp::Add | BinaryOp::Sub => 2,
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => 3,
        BinaryOp::And => 5,
        BinaryOp::Or => 6,
    }
}

const LOWEST_PREC: u8 = u8::MAX;

// ── Interpreter ───────────────────────────────────────────────────────────────

/// The statement dispatcher and expression engine.
pub struct Interpreter {
    source: String,
    lexer: Lexer,
    started: bool,
    exit: bool,
    statement_location: Location,

    vars: HashMap<String, Value>,
    labels: HashMap<String, Location>,
    clauses: Vec<Clause>,

    functions: HashMap<String, NativeFn>,
    actions: HashMap<String, NativeAction>,

    deferred_source: String,
    pending_nesting: i64,

    /// Lines produced by bare-expression echo, drained by the host.
    pub output: Vec<String>,
    last_result: Option<Value>,
    last_error: Option<ScriptError>,

    /// Statements executed over the interpreter's lifetime (diagnostics).
    pub total_statements: usize,
    /// Tokens scanned over the interpreter's lifetime (diagnostics).
    pub total_tokens: usize,
    tokens_before_load: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Create an interpreter with the standard library installed.
    pub fn new() -> Self {
        let mut interp = Interpreter {
            source: String::new(),
            lexer: Lexer::new(""),
            started: false,
            exit: false,
            statement_location: Location::default(),
            vars: HashMap::new(),
            labels: HashMap::new(),
            clauses: Vec::new(),
            functions: HashMap::new(),
            actions: HashMap::new(),
            deferred_source: String::new(),
            pending_nesting: 0,
            output: Vec::new(),
            last_result: None,
            last_error: None,
            total_statements: 0,
            total_tokens: 0,
            tokens_before_load: 0,
        };
        interp.install(&StandardLibrary);
        interp
    }

    // ── Host-facing state access ──────────────────────────────────────────────

    /// Merge a library's callables; later installs win on name collisions.
    pub fn install(&mut self, library: &dyn Library) {
        for (name, f) in library.functions() {
            self.functions.insert(name.to_owned(), f);
        }
        for (name, a) in library.actions() {
            self.actions.insert(name.to_owned(), a);
        }
    }

    pub fn get_var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Drain the bare-expression echo lines accumulated so far.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Value of the most recent bare-expression statement.
    pub fn last_result(&self) -> Option<&Value> {
        self.last_result.as_ref()
    }

    /// Error that terminated the most recent run, retained until the next
    /// load.
    pub fn last_error(&self) -> Option<&ScriptError> {
        self.last_error.as_ref()
    }

    /// Depth of the open-block stack (empty after any balanced run).
    pub fn clause_depth(&self) -> usize {
        self.clauses.len()
    }

    /// Is the interactive runner holding back buffered input?
    pub fn is_deferred(&self) -> bool {
        self.pending_nesting > 0
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    /// Point the interpreter at a new source.  Variables survive; the lexer,
    /// label table, and block stack are reset.
    pub fn load(&mut self, source: &str) {
        self.source = source.to_owned();
        self.lexer = Lexer::new(source);
        self.started = false;
        self.exit = false;
        self.labels.clear();
        self.clauses.clear();
        self.last_error = None;
        self.tokens_before_load = self.total_tokens;
    }

    /// Run a source to completion.
    pub fn run(&mut self, source: &str) -> Result<(), ScriptError> {
        self.load(source);
        while self.step()? {}
        Ok(())
    }

    /// Execute exactly one statement of the loaded source.
    ///
    /// Returns `Ok(true)` while statements remain.  All interpreter state
    /// persists between calls, so the host may interleave steps with its own
    /// work.  On failure the block stack is reset and the error is retained;
    /// bindings made by earlier statements stay intact.
    pub fn step(&mut self) -> Result<bool, ScriptError> {
        if self.exit {
            return Ok(false);
        }
        if !self.started {
            self.started = true;
            if let Err(e) = self.lexer.read_token() {
                return Err(self.fail(e));
            }
        }
        match self.statement() {
            Ok(()) => {
                self.total_statements += 1;
                self.total_tokens = self.tokens_before_load + self.lexer.tokens_read;
                Ok(!self.exit)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn fail(&mut self, error: ScriptError) -> ScriptError {
        self.clauses.clear();
        self.exit = true;
        self.last_error = Some(error.clone());
        error
    }

    /// Feed one line of typed input.
    ///
    /// The line is buffered; block nesting across the buffer is counted, and
    /// only when every opened `if`/`for` has a matching `end` is the buffer
    /// executed as a batch.  Any failure, including a lexical error while
    /// counting, discards the buffer so the session is never wedged.
    pub fn run_interactive(&mut self, line: &str) -> Result<Interactive, ScriptError> {
        self.deferred_source.push_str(line);
        self.deferred_source.push('\n');

        let tokens = match Lexer::split_tokens(line) {
            Ok(tokens) => tokens,
            Err(e) => {
                self.deferred_source.clear();
                self.pending_nesting = 0;
                return Err(self.fail(e));
            }
        };
        for token in &tokens {
            if token.kind.opens_block() {
                self.pending_nesting += 1;
            } else if token.kind == TokenKind::End {
                self.pending_nesting -= 1;
            }
        }
        if self.pending_nesting > 0 {
            return Ok(Interactive::Deferred);
        }

        let source = std::mem::take(&mut self.deferred_source);
        self.pending_nesting = 0;
        self.run(&source)?;
        Ok(Interactive::Completed)
    }

    // ── Statement dispatch ────────────────────────────────────────────────────

    fn statement(&mut self) -> Result<(), ScriptError> {
        while matches!(
            self.lexer.token().kind,
            TokenKind::Newline | TokenKind::Unknown
        ) {
            self.lexer.read_token()?;
        }
        self.statement_location = self.lexer.token().location;

        match self.lexer.token().kind {
            TokenKind::If => self.stmt_if(),
            TokenKind::Elif | TokenKind::Else => self.stmt_taken_branch_done(),
            TokenKind::For => self.stmt_for(),
            TokenKind::End => self.stmt_end(),
            TokenKind::Goto => self.stmt_goto(),
            TokenKind::Exit => {
                self.exit = true;
                Ok(())
            }
            TokenKind::Eof => self.stmt_eof(),
            TokenKind::Identifier => {
                let next = self.lexer.peek()?.kind;
                match next {
                    TokenKind::Assign => self.stmt_assign(),
                    TokenKind::Colon if self.at_line_start(self.statement_location) => {
                        self.stmt_label()
                    }
                    TokenKind::LParen if self.actions.contains_key(&self.lexer.token().text) => {
                        self.stmt_action()
                    }
                    _ => self.stmt_expression(),
                }
            }
            _ => self.stmt_expression(),
        }
    }

    /// `if expr :` — also handles `elif`/`else` reached by the skip scan.
    fn stmt_if(&mut self) -> Result<(), ScriptError> {
        loop {
            let taken = match self.lexer.token().kind {
                kind @ (TokenKind::If | TokenKind::Elif) => {
                    if kind == TokenKind::If {
                        self.clauses.push(Clause {
                            kind: ClauseKind::If,
                            location: self.statement_location,
                        });
                    }
                    self.lexer.read_token()?;
                    self.expression()?.is_truthy()
                }
                TokenKind::Else => {
                    self.lexer.read_token()?;
                    true
                }
                kind => {
                    return Err(self
                        .lexer
                        .token()
                        .location
                        .error(ErrorKind::UnexpectedToken, format!("unexpected {kind}")))
                }
            };
            self.expect(TokenKind::Colon)?;

            if taken {
                self.lexer.read_token()?;
                return Ok(());
            }

            // Guard was false: scan forward, depth-counting nested blocks,
            // to the next branch of this construct or its matching end.
            let mut depth = 0usize;
            loop {
                let kind = self.lexer.read_token()?.kind;
                match kind {
                    k if k.opens_block() => depth += 1,
                    TokenKind::Elif | TokenKind::Else if depth == 0 => break,
                    TokenKind::End => {
                        if depth == 0 {
                            // The end statement itself pops the clause.
                            return Ok(());
                        }
                        depth -= 1;
                    }
                    // Leave the missing-end diagnosis to the eof statement.
                    TokenKind::Eof => return Ok(()),
                    _ => {}
                }
            }
        }
    }

    /// `elif`/`else` encountered in normal flow, i.e. after a taken branch
    /// finished executing: discard the remaining alternatives.
    fn stmt_taken_branch_done(&mut self) -> Result<(), ScriptError> {
        if !matches!(
            self.clauses.last(),
            Some(Clause { kind: ClauseKind::If, .. })
        ) {
            let token = self.lexer.token();
            return Err(token.location.error(
                ErrorKind::UnexpectedToken,
                format!("{} without an open if", token.kind),
            ));
        }
        let mut depth = 0usize;
        loop {
            let kind = self.lexer.read_token()?.kind;
            match kind {
                k if k.opens_block() => depth += 1,
                TokenKind::End => {
                    if depth == 0 {
                        return Ok(());
                    }
                    depth -= 1;
                }
                TokenKind::Eof => return Ok(()),
                _ => {}
            }
        }
    }

    /// `for IDENT = expr to expr :`
    ///
    /// Executed both on first entry and on every loop re-entry (the matching
    /// `end` seeks back here), so it must not re-initialise the counter when
    /// the top clause is already this loop.
    fn stmt_for(&mut self) -> Result<(), ScriptError> {
        self.lexer.read_token()?;
        self.expect(TokenKind::Identifier)?;
        let name = self.lexer.token().text.clone();

        self.lexer.read_token()?;
        self.expect(TokenKind::Assign)?;

        self.lexer.read_token()?;
        let from = self.expression()?;

        let re_entry = matches!(
            self.clauses.last(),
            Some(Clause { kind: ClauseKind::For { var }, .. }) if *var == name
        );
        if !re_entry {
            self.vars.insert(name.clone(), from);
            self.clauses.push(Clause {
                kind: ClauseKind::For { var: name.clone() },
                location: self.statement_location,
            });
        }

        self.expect(TokenKind::To)?;
        self.lexer.read_token()?;
        let to = self.expression()?;
        self.expect(TokenKind::Colon)?;

        let current = self.vars[&name].clone();
        let done = current
            .binary_operation(&to, BinaryOp::Gt)
            .map_err(|e| self.locate(e))?
            .is_truthy();
        if done {
            // Counter exceeds the bound: skip the whole body, including the
            // zero-iteration case on first entry.
            let mut depth = 0i64;
            while depth >= 0 {
                let kind = self.lexer.read_token()?.kind;
                if kind.opens_block() {
                    depth += 1;
                } else if kind == TokenKind::End {
                    depth -= 1;
                } else if kind == TokenKind::Eof {
                    return Err(self
                        .statement_location
                        .error(ErrorKind::MissingEnd, "for without matching end"));
                }
            }
            self.clauses.pop();
        }
        self.lexer.read_token()?;
        Ok(())
    }

    /// `end` — closes the innermost open block.
    fn stmt_end(&mut self) -> Result<(), ScriptError> {
        let Some(clause) = self.clauses.last().cloned() else {
            return Err(self
                .statement_location
                .error(ErrorKind::UnmatchedEnd, "end without an open block"));
        };
        match clause.kind {
            ClauseKind::If => {
                self.clauses.pop();
            }
            ClauseKind::For { var } => {
                // Bump the counter and re-run the header; the header performs
                // the bound check and pops the clause when the loop is done.
                let next = self.vars[&var]
                    .binary_operation(&Value::Number(1.0), BinaryOp::Add)
                    .map_err(|e| self.locate(e))?;
                self.vars.insert(var, next);
                self.lexer.move_to(clause.location);
            }
        }
        self.lexer.read_token()?;
        Ok(())
    }

    /// `goto IDENT` — jump to a `label:` line anywhere in the source.
    fn stmt_goto(&mut self) -> Result<(), ScriptError> {
        self.lexer.read_token()?;
        self.expect(TokenKind::Identifier)?;
        let name = self.lexer.token().text.clone();

        if !self.labels.contains_key(&name) {
            self.scan_labels()?;
        }
        match self.labels.get(&name) {
            Some(location) => {
                self.lexer.move_to(*location);
                self.lexer.read_token()?;
                Ok(())
            }
            None => Err(self
                .statement_location
                .error(ErrorKind::CannotFindLabel, format!("cannot find label '{name}'"))),
        }
    }

    /// Populate the label table with every `label:` line in the source.
    ///
    /// Runs once per load, on the first unresolved `goto`; a label is an
    /// identifier at the start of a line immediately followed by `:`.  The
    /// first occurrence of a name wins.
    fn scan_labels(&mut self) -> Result<(), ScriptError> {
        let mut lexer = Lexer::new(&self.source);
        let mut at_line_start = true;
        loop {
            let token = lexer.read_token()?.clone();
            match token.kind {
                TokenKind::Eof => return Ok(()),
                TokenKind::Newline => at_line_start = true,
                TokenKind::Identifier if at_line_start => {
                    if lexer.peek()?.kind == TokenKind::Colon {
                        self.labels.entry(token.text).or_insert(token.location);
                    }
                    at_line_start = false;
                }
                _ => at_line_start = false,
            }
        }
    }

    /// Is this token the first on its line, with only whitespace before it?
    /// Labels are recognised only in this position, both here and in
    /// [`Interpreter::scan_labels`].
    fn at_line_start(&self, location: Location) -> bool {
        let prefix = self.source[..location.offset]
            .rsplit('\n')
            .next()
            .unwrap_or("");
        prefix.chars().all(|c| matches!(c, ' ' | '\t' | '\r'))
    }

    fn stmt_eof(&mut self) -> Result<(), ScriptError> {
        if !self.clauses.is_empty() {
            return Err(self
                .statement_location
                .error(ErrorKind::MissingEnd, "end of input with an unclosed block"));
        }
        self.exit = true;
        Ok(())
    }

    /// `IDENT = expr`
    fn stmt_assign(&mut self) -> Result<(), ScriptError> {
        let name = self.lexer.token().text.clone();
        self.lexer.read_token()?; // '='
        self.lexer.read_token()?;
        let value = self.expression()?;
        self.vars.insert(name, value);
        Ok(())
    }

    /// `IDENT :` at the start of a line — a goto target; executing it is a
    /// no-op.
    fn stmt_label(&mut self) -> Result<(), ScriptError> {
        let name = self.lexer.token().text.clone();
        let location = self.lexer.token().location;
        self.labels.entry(name).or_insert(location);
        self.lexer.read_token()?; // ':'
        self.lexer.read_token()?;
        Ok(())
    }

    /// `IDENT ( args )` in statement position where the name is an action.
    fn stmt_action(&mut self) -> Result<(), ScriptError> {
        let name = self.lexer.token().text.clone();
        let location = self.lexer.token().location;
        let action = self
            .actions
            .get(&name)
            .cloned()
            .expect("dispatch checked the action exists");
        self.lexer.read_token()?; // '('
        let args = self.read_arguments()?;
        action(&args).map_err(|e| location.error(e.kind, e.message))?;
        self.lexer.read_token()?; // past ')'
        Ok(())
    }

    /// Bare expression statement: evaluate and echo the quoted rendering.
    fn stmt_expression(&mut self) -> Result<(), ScriptError> {
        let value = self.expression()?;
        self.output.push(value.to_quoted_string());
        self.last_result = Some(value);
        Ok(())
    }

    // ── Expression engine ─────────────────────────────────────────────────────

    fn expression(&mut self) -> Result<Value, ScriptError> {
        self.expression_min(LOWEST_PREC)
    }

    /// Precedence climbing: parse a primary, then fold in binary operators
    /// that bind tighter than `lowest`, left-associatively.
    fn expression_min(&mut self, lowest: u8) -> Result<Value, ScriptError> {
        let mut lhs = self.primary()?;
        self.lexer.read_token()?;
        loop {
            let kind = self.lexer.token().kind;
            if !kind.is_operator() {
                break;
            }
            let Some(op) = binary_op_of(kind) else {
                return Err(self.lexer.token().location.error(
                    ErrorKind::UnknownOperator,
                    format!("{kind} cannot be used as a binary operator"),
                ));
            };
            let prec = precedence(op);
            if prec >= lowest {
                break;
            }
            self.lexer.read_token()?;
            let rhs = self.expression_min(prec)?;
            lhs = lhs.binary_operation(&rhs, op).map_err(|e| self.locate(e))?;
        }
        Ok(lhs)
    }

    fn primary(&mut self) -> Result<Value, ScriptError> {
        let token = self.lexer.token().clone();
        match token.kind {
            TokenKind::Literal => Ok(token.value.expect("literal tokens carry a value")),
            TokenKind::Plus | TokenKind::Minus => {
                let op = if token.kind == TokenKind::Plus {
                    BinaryOp::Add
                } else {
                    BinaryOp::Sub
                };
                self.lexer.read_token()?;
                let operand = self.primary()?;
                Value::ZERO
                    .binary_operation(&operand, op)
                    .map_err(|e| self.locate(e))
            }
            TokenKind::Not => {
                self.lexer.read_token()?;
                let operand = self.primary()?;
                Ok(Value::from(!operand.is_truthy()))
            }
            TokenKind::LParen => {
                self.lexer.read_token()?;
                let value = self.expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(value)
            }
            TokenKind::Identifier => {
                if let Some(value) = self.vars.get(&token.text) {
                    return Ok(value.clone());
                }
                if let Some(function) = self.functions.get(&token.text).cloned() {
                    self.lexer.read_token()?;
                    self.expect(TokenKind::LParen)?;
                    let args = self.read_arguments()?;
                    return function(&args)
                        .map_err(|e| token.location.error(e.kind, e.message));
                }
                Err(token.location.error(
                    ErrorKind::UndeclaredIdentifier,
                    format!("undeclared identifier '{}'", token.text),
                ))
            }
            TokenKind::Unknown => Err(token.location.error(
                ErrorKind::UnknownToken,
                format!("unknown token '{}'", token.text),
            )),
            kind => Err(token
                .location
                .error(ErrorKind::UnexpectedToken, format!("unexpected {kind}"))),
        }
    }

    /// Parse a parenthesised argument list; the current token is `(` on entry
    /// and `)` on success.  Every `,` must be followed by an argument.
    fn read_arguments(&mut self) -> Result<Vec<Value>, ScriptError> {
        let mut args = Vec::new();
        if self.lexer.read_token()?.kind != TokenKind::RParen {
            loop {
                args.push(self.expression()?);
                if self.lexer.token().kind != TokenKind::Comma {
                    break;
                }
                if self.lexer.read_token()?.kind == TokenKind::RParen {
                    return Err(self.lexer.token().location.error(
                        ErrorKind::UnexpectedToken,
                        "expected an argument after ','",
                    ));
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    // ── Error helpers ─────────────────────────────────────────────────────────

    fn expect(&self, expected: TokenKind) -> Result<(), ScriptError> {
        let token = self.lexer.token();
        if token.kind != expected {
            return Err(token.location.error(
                ErrorKind::MissingToken,
                format!("expected {expected}, got {}", token.kind),
            ));
        }
        Ok(())
    }

    /// Attach the current token's location to a location-free failure.
    fn locate(&self, error: CallError) -> ScriptError {
        self.lexer.token().location.error(error.kind, error.message)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn run(source: &str) -> Interpreter {
        let mut interp = Interpreter::new();
        interp.run(source).expect("script failed");
        interp
    }

    fn run_err(source: &str) -> ScriptError {
        let mut interp = Interpreter::new();
        interp.run(source).expect_err("script unexpectedly succeeded")
    }

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn assignment_and_lookup() {
        let interp = run("x = 41\ny = x + 1");
        assert_eq!(interp.get_var("y"), Some(&num(42.0)));
    }

    #[test]
    fn bare_expression_echoes_quoted() {
        let mut interp = run("6 * 7\n\"hi\"");
        assert_eq!(interp.take_output(), vec!["42", "'hi'"]);
        assert_eq!(interp.last_result(), Some(&Value::Text("hi".into())));
    }

    #[test]
    fn operator_precedence() {
        let interp = run("a = 2 + 3 * 4\nb = (2 + 3) * 4\nc = 7 % 4 + 2 ** 3\nd = 9 // 2");
        assert_eq!(interp.get_var("a"), Some(&num(14.0)));
        assert_eq!(interp.get_var("b"), Some(&num(20.0)));
        assert_eq!(interp.get_var("c"), Some(&num(11.0)));
        assert_eq!(interp.get_var("d"), Some(&num(4.0)));
    }

    #[test]
    fn operators_are_left_associative() {
        let interp = run("a = 10 - 3 - 2\nb = 2 ** 3 ** 2");
        assert_eq!(interp.get_var("a"), Some(&num(5.0)));
        // ** folds left under minimum-precedence climbing: (2 ** 3) ** 2.
        assert_eq!(interp.get_var("b"), Some(&num(64.0)));
    }

    #[test]
    fn unary_operators_bind_to_primary() {
        let interp = run("a = -3 + 5\nb = not 0\nc = not 3\nd = -(2 + 2)");
        assert_eq!(interp.get_var("a"), Some(&num(2.0)));
        assert_eq!(interp.get_var("b"), Some(&num(1.0)));
        assert_eq!(interp.get_var("c"), Some(&num(0.0)));
        assert_eq!(interp.get_var("d"), Some(&num(-4.0)));
    }

    #[test]
    fn relational_and_logical() {
        let interp = run("a = 1 < 2 and 2 <= 2\nb = 1 == 2 or not 1");
        assert_eq!(interp.get_var("a"), Some(&num(1.0)));
        assert_eq!(interp.get_var("b"), Some(&num(0.0)));
    }

    #[test]
    fn if_true_branch_runs() {
        let interp = run("x = 0\nif 1:\n  x = 1\nend");
        assert_eq!(interp.get_var("x"), Some(&num(1.0)));
        assert_eq!(interp.clause_depth(), 0);
    }

    #[test]
    fn if_false_branch_skips() {
        let interp = run("x = 0\nif 0:\n  x = 1\nend");
        assert_eq!(interp.get_var("x"), Some(&num(0.0)));
        assert_eq!(interp.clause_depth(), 0);
    }

    #[test]
    fn elif_and_else_chain() {
        let source = "\
v = 2
r = \"\"
if v == 1:
  r = \"one\"
elif v == 2:
  r = \"two\"
elif v == 3:
  r = \"three\"
else:
  r = \"many\"
end";
        let interp = run(source);
        assert_eq!(interp.get_var("r"), Some(&Value::Text("two".into())));
    }

    #[test]
    fn else_taken_when_all_guards_false() {
        let interp = run("if 0:\n x = 1\nelif 0:\n x = 2\nelse:\n x = 3\nend");
        assert_eq!(interp.get_var("x"), Some(&num(3.0)));
    }

    #[test]
    fn taken_branch_skips_remaining_alternatives() {
        let interp = run("x = 0\nif 1:\n  x = 1\nelse:\n  x = 2\nend");
        assert_eq!(interp.get_var("x"), Some(&num(1.0)));
    }

    #[test]
    fn nested_if_skip_tracks_depth() {
        let source = "\
x = 0
if 0:
  if 1:
    x = 1
  end
elif 1:
  x = 2
end";
        let interp = run(source);
        assert_eq!(interp.get_var("x"), Some(&num(2.0)));
    }

    #[test]
    fn for_loop_counts_inclusive() {
        let interp = run("total = 0\nfor i = 1 to 5:\n  total = total + i\nend");
        assert_eq!(interp.get_var("total"), Some(&num(15.0)));
        assert_eq!(interp.get_var("i"), Some(&num(6.0)));
        assert_eq!(interp.clause_depth(), 0);
    }

    #[test]
    fn for_loop_body_can_run_zero_times() {
        let interp = run("hits = 0\nfor i = 5 to 1:\n  hits = hits + 1\nend");
        assert_eq!(interp.get_var("hits"), Some(&num(0.0)));
        assert_eq!(interp.get_var("i"), Some(&num(5.0)));
        assert_eq!(interp.clause_depth(), 0);
    }

    #[test]
    fn loop_scenario_accumulates() {
        let interp = run("x = 2\nfor i = 1 to 3:\n x = x * i\nend");
        assert_eq!(interp.get_var("x"), Some(&num(12.0)));
        assert_eq!(interp.get_var("i"), Some(&num(4.0)));
    }

    #[test]
    fn nested_for_loops() {
        let interp = run(
            "n = 0\nfor i = 1 to 3:\n  for j = 1 to 2:\n    n = n + 1\n  end\nend",
        );
        assert_eq!(interp.get_var("n"), Some(&num(6.0)));
    }

    #[test]
    fn loop_reentry_does_not_reinitialize() {
        // The header is re-parsed each iteration; the from-expression must not
        // reset the counter on re-entry.
        let interp = run("trace = \"\"\nfor i = 1 to 3:\n  trace = trace + str(i)\nend");
        assert_eq!(interp.get_var("trace"), Some(&Value::Text("123".into())));
    }

    #[test]
    fn goto_forward_label() {
        let interp = run("x = 1\ngoto skip\nx = 2\nskip:\ny = x");
        assert_eq!(interp.get_var("y"), Some(&num(1.0)));
    }

    #[test]
    fn goto_backward_label() {
        // Jumping out of a taken branch leaves its block open, so the script
        // finishes with exit rather than running off the end of input.
        let source = "\
n = 0
again:
n = n + 1
if n < 3:
  goto again
end
done = n
exit";
        let interp = run(source);
        assert_eq!(interp.get_var("done"), Some(&num(3.0)));
    }

    #[test]
    fn labels_may_be_indented() {
        let interp = run("goto spot\nx = 1\n  spot:\ny = 2");
        assert_eq!(interp.get_var("x"), None);
        assert_eq!(interp.get_var("y"), Some(&num(2.0)));
    }

    #[test]
    fn label_must_start_its_line() {
        // A colon-suffixed identifier after another statement on the same
        // line is not a label definition, matching what the goto scan
        // recognises.
        let err = run_err("if 1: spot:\nend\ngoto spot");
        assert_eq!(err.kind, ErrorKind::UndeclaredIdentifier);
        assert!(err.message.contains("spot"));
    }

    #[test]
    fn goto_missing_label() {
        let err = run_err("goto nowhere");
        assert_eq!(err.kind, ErrorKind::CannotFindLabel);
    }

    #[test]
    fn exit_stops_the_run() {
        let interp = run("x = 1\nexit\nx = 2");
        assert_eq!(interp.get_var("x"), Some(&num(1.0)));
    }

    #[test]
    fn unclosed_block_is_missing_end() {
        let err = run_err("if 1:\n x = 1");
        assert_eq!(err.kind, ErrorKind::MissingEnd);
    }

    #[test]
    fn stray_end_is_unmatched() {
        let err = run_err("end");
        assert_eq!(err.kind, ErrorKind::UnmatchedEnd);
    }

    #[test]
    fn elif_without_if() {
        let err = run_err("elif 1:");
        assert_eq!(err.kind, ErrorKind::UnexpectedToken);
    }

    #[test]
    fn not_in_binary_position() {
        let err = run_err("x = 1 not 2");
        assert_eq!(err.kind, ErrorKind::UnknownOperator);
    }

    #[test]
    fn missing_colon_after_if() {
        let err = run_err("if 1\n x = 2\nend");
        assert_eq!(err.kind, ErrorKind::MissingToken);
    }

    #[test]
    fn undeclared_identifier_reports_location() {
        let err = run_err("x = 1\nz = x + mystery");
        assert_eq!(err.kind, ErrorKind::UndeclaredIdentifier);
        assert!(err.message.contains("mystery"));
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 9);
    }

    #[test]
    fn type_mismatch_aborts_with_location() {
        let err = run_err("x = \"a\" < \"b\"");
        assert_eq!(err.kind, ErrorKind::NotSupportedOperation);
        assert_eq!(err.line, 1);
    }

    #[test]
    fn error_keeps_prior_bindings() {
        let mut interp = Interpreter::new();
        let err = interp.run("x = 5\ny = mystery").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndeclaredIdentifier);
        assert_eq!(interp.get_var("x"), Some(&num(5.0)));
        assert_eq!(interp.get_var("y"), None);
        assert_eq!(interp.clause_depth(), 0);
        assert_eq!(interp.last_error(), Some(&err));
    }

    #[test]
    fn builtin_calls_in_expressions() {
        let interp = run("a = min(3, 1, 2)\nb = max(3, 1, 2)\nc = abs(0 - 9)\nd = str(4) + \"!\"");
        assert_eq!(interp.get_var("a"), Some(&num(1.0)));
        assert_eq!(interp.get_var("b"), Some(&num(3.0)));
        assert_eq!(interp.get_var("c"), Some(&num(9.0)));
        assert_eq!(interp.get_var("d"), Some(&Value::Text("4!".into())));
    }

    #[test]
    fn builtin_arity_error_is_located() {
        let err = run_err("x = min(1)");
        assert_eq!(err.kind, ErrorKind::InvalidNumberOfArguments);
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 5);
    }

    #[test]
    fn text_repetition_both_ways() {
        let interp = run("a = \"ab\" * 3\nb = 3 * \"ab\"");
        assert_eq!(interp.get_var("a"), Some(&Value::Text("ababab".into())));
        assert_eq!(interp.get_var("b"), Some(&Value::Text("ababab".into())));
    }

    #[test]
    fn huge_text_repetition_is_an_error() {
        let err = run_err("x = \"ab\" * 99999999999999999999");
        assert_eq!(err.kind, ErrorKind::InvalidParameter);
    }

    #[test]
    fn trailing_comma_in_arguments() {
        let err = run_err("x = min(1, 2,)");
        assert_eq!(err.kind, ErrorKind::UnexpectedToken);
    }

    #[test]
    fn conversion_round_trips() {
        let interp = run("a = str(num(\"3.5\"))\nb = num(str(3.5))");
        assert_eq!(interp.get_var("a"), Some(&Value::Text("3.5".into())));
        assert_eq!(interp.get_var("b"), Some(&num(3.5)));
    }

    #[test]
    fn variables_shadow_functions() {
        let interp = run("min = 9\nx = min + 1");
        assert_eq!(interp.get_var("x"), Some(&num(10.0)));
    }

    #[test]
    fn comments_are_ignored() {
        let interp = run("# leading comment\nx = 1 # trailing\n# closing");
        assert_eq!(interp.get_var("x"), Some(&num(1.0)));
    }

    // ── Actions ───────────────────────────────────────────────────────────────

    struct RecorderLibrary {
        sink: Rc<RefCell<Vec<String>>>,
    }

    impl Library for RecorderLibrary {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn actions(&self) -> Vec<(&'static str, NativeAction)> {
            let sink = Rc::clone(&self.sink);
            vec![(
                "emit",
                Rc::new(move |args: &[Value]| {
                    let line = args
                        .first()
                        .map(|v| v.to_display_string())
                        .unwrap_or_default();
                    sink.borrow_mut().push(line);
                    Ok(())
                }) as NativeAction,
            )]
        }
    }

    #[test]
    fn actions_run_as_statements() {
        let sink = Rc::new(RefCell::new(Vec::new()));
        let mut interp = Interpreter::new();
        interp.install(&RecorderLibrary { sink: Rc::clone(&sink) });
        interp
            .run("for i = 1 to 3:\n  emit(\"tick \" + str(i))\nend")
            .unwrap();
        assert_eq!(
            *sink.borrow(),
            vec!["tick 1", "tick 2", "tick 3"]
        );
        // Actions do not echo.
        assert!(interp.output.is_empty());
    }

    #[test]
    fn reinstalling_overwrites() {
        struct Stub(f64);
        impl Library for Stub {
            fn name(&self) -> &'static str {
                "stub"
            }
            fn functions(&self) -> Vec<(&'static str, NativeFn)> {
                let n = self.0;
                vec![("answer", Rc::new(move |_: &[Value]| Ok(Value::Number(n))) as NativeFn)]
            }
        }
        let mut interp = Interpreter::new();
        interp.install(&Stub(1.0));
        interp.install(&Stub(2.0));
        interp.run("x = answer()").unwrap();
        assert_eq!(interp.get_var("x"), Some(&num(2.0)));
    }

    // ── Step mode ─────────────────────────────────────────────────────────────

    #[test]
    fn step_executes_one_statement_at_a_time() {
        let mut interp = Interpreter::new();
        interp.load("x = 1\ny = 2\nz = 3");
        assert!(interp.step().unwrap());
        assert_eq!(interp.get_var("x"), Some(&num(1.0)));
        assert_eq!(interp.get_var("y"), None);
        assert!(interp.step().unwrap());
        assert_eq!(interp.get_var("y"), Some(&num(2.0)));
        assert!(interp.step().unwrap());
        // The final step consumes end-of-input.
        assert!(!interp.step().unwrap());
        assert_eq!(interp.get_var("z"), Some(&num(3.0)));
    }

    #[test]
    fn step_persists_block_state_across_calls() {
        let mut interp = Interpreter::new();
        interp.load("total = 0\nfor i = 1 to 3:\n  total = total + i\nend");
        let mut steps = 0;
        while interp.step().unwrap() {
            steps += 1;
            assert!(steps < 100, "runaway loop");
        }
        assert_eq!(interp.get_var("total"), Some(&num(6.0)));
    }

    #[test]
    fn step_after_exit_is_a_no_op() {
        let mut interp = Interpreter::new();
        interp.load("x = 1");
        while interp.step().unwrap() {}
        assert!(!interp.step().unwrap());
    }

    #[test]
    fn statement_counter_advances() {
        let mut interp = Interpreter::new();
        interp.run("x = 1\ny = 2").unwrap();
        assert!(interp.total_statements >= 2);
        assert!(interp.total_tokens > 0);
    }

    // ── Interactive mode ──────────────────────────────────────────────────────

    #[test]
    fn interactive_single_line_runs_immediately() {
        let mut interp = Interpreter::new();
        assert_eq!(
            interp.run_interactive("x = 7").unwrap(),
            Interactive::Completed
        );
        assert_eq!(interp.get_var("x"), Some(&num(7.0)));
    }

    #[test]
    fn interactive_defers_open_blocks() {
        let mut interp = Interpreter::new();
        interp.run_interactive("x = 1").unwrap();
        assert_eq!(
            interp.run_interactive("if x == 1:").unwrap(),
            Interactive::Deferred
        );
        assert!(interp.is_deferred());
        assert_eq!(
            interp.run_interactive("  x = 2").unwrap(),
            Interactive::Deferred
        );
        assert_eq!(interp.run_interactive("end").unwrap(), Interactive::Completed);
        assert!(!interp.is_deferred());
        assert_eq!(interp.get_var("x"), Some(&num(2.0)));
    }

    #[test]
    fn interactive_environment_persists_between_entries() {
        let mut interp = Interpreter::new();
        interp.run_interactive("x = 2").unwrap();
        interp.run_interactive("for i = 1 to 3:").unwrap();
        interp.run_interactive("  x = x * i").unwrap();
        interp.run_interactive("end").unwrap();
        assert_eq!(interp.get_var("x"), Some(&num(12.0)));
        assert_eq!(interp.get_var("i"), Some(&num(4.0)));
    }

    #[test]
    fn interactive_error_discards_buffer() {
        let mut interp = Interpreter::new();
        interp.run_interactive("for i = 1 to 3:").unwrap();
        let err = interp.run_interactive("  boom(1)\nend").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndeclaredIdentifier);
        assert!(!interp.is_deferred());
        // The session recovers.
        interp.run_interactive("x = 1").unwrap();
        assert_eq!(interp.get_var("x"), Some(&num(1.0)));
    }

    #[test]
    fn interactive_lex_error_discards_buffer() {
        let mut interp = Interpreter::new();
        interp.run_interactive("if 1:").unwrap();
        let err = interp.run_interactive("\"unterminated").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidStringLiteral);
        assert!(!interp.is_deferred());
        interp.run_interactive("y = 3").unwrap();
        assert_eq!(interp.get_var("y"), Some(&num(3.0)));
    }
}
