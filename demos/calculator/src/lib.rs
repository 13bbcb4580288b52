//! A toy calculator served over turnwire.
//!
//! Commands understood by [`Calculator`]:
//!
//! ```text
//! x                   read a binding
//! clear               a bare action name runs that action
//! inc, x, 2           run an action with comma-separated arguments
//! x = 1 + max(2, y)   bind the value of an expression
//! (x - 1) / 2         evaluate an expression and reply with its value
//! ```
//!
//! Actions and assignments reply with an empty result. Bindings are
//! global: every connection to the same server sees the same names.

use std::collections::HashMap;
use std::sync::Mutex;

use turnwire::Evaluator;

/// Actions that change the bindings.
///
/// - `clear`: drop every binding
/// - `unset, name, ...`: drop the named bindings
/// - `inc, name[, expr]`: add `expr` (default 1) to a binding
pub const ACTIONS: &[&str] = &["clear", "unset", "inc"];

/// Functions usable inside expressions.
pub const FUNCTIONS: &[&str] = &["sum", "min", "max", "abs"];

/// Numeric bindings shared by every connection.
#[derive(Debug, Default)]
pub struct Calculator {
    vars: Mutex<HashMap<String, f64>>,
}

impl Calculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates one command line against the current bindings.
    ///
    /// Returns `Some(value)` for expressions and bound names, `None` for
    /// actions and assignments.
    pub fn eval_line(&self, line: &str) -> Result<Option<f64>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Err("empty command".into());
        }

        let mut vars = self
            .vars
            .lock()
            .map_err(|_| "bindings are unavailable".to_string())?;

        if let Some((name, expr)) = split_assignment(line) {
            if ACTIONS.contains(&name) {
                return Err(format!("cannot assign to action '{name}'"));
            }
            let value = Parser::new(expr, &vars).expression_to_end()?;
            vars.insert(name.to_string(), value);
            return Ok(None);
        }

        if let Some((action, args)) = split_action(line) {
            let args: Vec<&str> = args.split(',').collect();
            run_action(&mut vars, action, &args)?;
            return Ok(None);
        }

        if ACTIONS.contains(&line) {
            run_action(&mut vars, line, &[])?;
            return Ok(None);
        }

        Parser::new(line, &vars).expression_to_end().map(Some)
    }
}

impl Evaluator for Calculator {
    async fn evaluate(&self, command: &str) -> Result<String, String> {
        Ok(self
            .eval_line(command)?
            .map(format_number)
            .unwrap_or_default())
    }
}

/// Renders integral values without a fractional part.
pub fn format_number(value: f64) -> String {
    format!("{value}")
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `name = expr`, where `name` is a plain identifier.
fn split_assignment(line: &str) -> Option<(&str, &str)> {
    let (name, expr) = line.split_once('=')?;
    let name = name.trim();
    is_name(name).then_some((name, expr))
}

/// `name, arg, ...`, where `name` is a plain identifier.
fn split_action(line: &str) -> Option<(&str, &str)> {
    let (name, args) = line.split_once(',')?;
    let name = name.trim();
    is_name(name).then_some((name, args))
}

fn run_action(
    vars: &mut HashMap<String, f64>,
    action: &str,
    args: &[&str],
) -> Result<(), String> {
    if !ACTIONS.contains(&action) {
        return Err(format!("{action}: not an action"));
    }

    match (action, args) {
        ("clear", []) => {
            vars.clear();
            Ok(())
        }
        ("unset", names) if !names.is_empty() => {
            for name in names {
                let name = name.trim();
                if !is_name(name) {
                    return Err(format!("unset: '{name}' is not a name"));
                }
                vars.remove(name);
            }
            Ok(())
        }
        ("inc", [name, rest @ ..]) if rest.len() <= 1 => {
            let by = match rest {
                [expr] => Parser::new(expr, vars).expression_to_end()?,
                _ => 1.0,
            };
            let value = vars
                .get_mut(name.trim())
                .ok_or_else(|| "undefined variable".to_string())?;
            *value += by;
            Ok(())
        }
        _ => Err(format!("{action}: wrong number of arguments")),
    }
}

fn call(function: &str, args: &[f64]) -> Result<f64, String> {
    match (function, args) {
        ("sum", _) => Ok(args.iter().sum()),
        ("min", [first, rest @ ..]) => Ok(rest.iter().fold(*first, |a, b| a.min(*b))),
        ("max", [first, rest @ ..]) => Ok(rest.iter().fold(*first, |a, b| a.max(*b))),
        ("abs", [x]) => Ok(x.abs()),
        _ if FUNCTIONS.contains(&function) => {
            Err(format!("{function}: wrong number of arguments"))
        }
        _ => Err(format!("unknown function '{function}'")),
    }
}

// ---------------------------------------------------------------------------
// Expression parser
// ---------------------------------------------------------------------------

/// Recursive-descent parser over `+ - * /`, unary minus, parentheses,
/// numbers, bound names and function calls.
struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    vars: &'a HashMap<String, f64>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, vars: &'a HashMap<String, f64>) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
            vars,
        }
    }

    fn expression_to_end(mut self) -> Result<f64, String> {
        let value = self.expression()?;
        self.skip_ws();
        match self.peek() {
            None => Ok(value),
            Some(c) => Err(format!("unexpected '{}'", c as char)),
        }
    }

    fn expression(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'+') => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(b'-') => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.factor()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'*') => {
                    self.pos += 1;
                    value *= self.factor()?;
                }
                Some(b'/') => {
                    self.pos += 1;
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err("division by zero".into());
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn factor(&mut self) -> Result<f64, String> {
        self.skip_ws();
        match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some(b'(') => {
                self.pos += 1;
                let value = self.expression()?;
                self.skip_ws();
                if self.peek() != Some(b')') {
                    return Err("missing ')'".into());
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => self.number(),
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => self.name(),
            Some(c) => Err(format!("unexpected '{}'", c as char)),
            None => Err("unexpected end of input".into()),
        }
    }

    fn number(&mut self) -> Result<f64, String> {
        let text = self.take_while(|c| c.is_ascii_digit() || c == b'.');
        text.parse()
            .map_err(|_| format!("invalid number '{text}'"))
    }

    fn name(&mut self) -> Result<f64, String> {
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_');
        self.skip_ws();
        if self.peek() == Some(b'(') {
            self.pos += 1;
            let args = self.arguments()?;
            return call(name, &args);
        }
        self.vars
            .get(name)
            .copied()
            .ok_or_else(|| "undefined variable".to_string())
    }

    /// Comma-separated expressions up to and including the closing `)`.
    fn arguments(&mut self) -> Result<Vec<f64>, String> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b')') {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b')') => {
                    self.pos += 1;
                    return Ok(args);
                }
                _ => return Err("missing ')'".into()),
            }
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let src = self.src;
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        // Only ASCII bytes are consumed, so the slice is valid UTF-8.
        std::str::from_utf8(&src[start..self.pos]).unwrap_or_default()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }
}
