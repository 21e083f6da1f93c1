//! TPL-003: Canonical rendering of scripts and nodes.
//!
//! Output is deterministic: command operands are rendered to `key=...` tokens
//! and sorted, so two renderings of the same resolution state are byte-equal
//! regardless of map iteration order. The parser reads this form back.

use super::ast::{CommandNode, DeclarationNode, Expr, Node, Operand, Script, Statement, ValueNode};
use super::types::Value;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Strings that need no quoting. Kept in sync with the parser's bare token class.
static SIMPLE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9\-._:/+;~@<>]+$").expect("simple token pattern is valid")
});

/// True if `s` can be written without quotes.
pub fn is_simple_token(s: &str) -> bool {
    SIMPLE_TOKEN.is_match(s)
}

/// Quote a string literal if it falls outside the simple token class.
///
/// Strings containing `'` or a line break or tab are double-quoted, with `\`,
/// `"`, `\n`, `\r` and `\t` backslash-escaped, so the rendering stays on one
/// line and strings holding both quote kinds still read back unchanged.
/// Everything else is single-quoted verbatim.
pub fn quote(s: &str) -> String {
    if is_simple_token(s) {
        return s.to_string();
    }
    if !s.contains(['\'', '\n', '\r', '\t']) {
        return format!("'{}'", s);
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render an operand value in canonical form.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Str(s) => quote(s),
        other => other.to_string(),
    }
}

fn render_operand(key: &str, operand: &Operand) -> String {
    match operand {
        Operand::Param(v) => format!("{}={}", key, render_value(v)),
        Operand::Hole(h) => format!("{}={{{}}}", key, h),
        Operand::Ref(r) => format!("{}=${}", key, r),
    }
}

impl fmt::Display for ValueNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hole(h) => write!(f, "{{{}}}", h),
            Self::Literal(v) => f.write_str(&render_value(v)),
        }
    }
}

impl fmt::Display for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tokens: Vec<String> = self
            .operands()
            .map(|(key, operand)| render_operand(key, operand))
            .collect();
        tokens.sort();

        write!(f, "{} {}", self.action(), self.entity())?;
        if !tokens.is_empty() {
            write!(f, " {}", tokens.join(" "))?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(cmd) => cmd.fmt(f),
            Self::Value(val) => val.fmt(f),
        }
    }
}

impl fmt::Display for DeclarationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.ident, self.expr)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declaration(decl) => decl.fmt(f),
            Self::Command(cmd) => cmd.fmt(f),
            Self::Value(val) => val.fmt(f),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.node.fmt(f)
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stat) in self.statements.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            stat.fmt(f)?;
        }
        Ok(())
    }
}
