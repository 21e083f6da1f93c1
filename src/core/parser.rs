//! TPL-004: Canonical script parsing, run config loading, and validation.
//!
//! Reads the line-oriented form produced by the renderer:
//! - `ident = <expr>` declares an identifier
//! - `<action> <entity> key=value...` is a command
//! - a single token is a value statement
//!
//! Validation is advisory. Forward references, references to undeclared
//! identifiers and duplicate identifiers come back as warnings; resolution
//! simply leaves such references pending.

use super::ast::{CommandNode, DeclarationNode, Expr, Node, Operand, Script, Statement, ValueNode};
use super::types::{ScriptConfig, Value};
use std::collections::HashMap;
use std::path::Path;

/// Kind of validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    DuplicateIdentifier,
    ForwardReference,
    UndeclaredReference,
}

/// Validation warning. `statement` is 1-based.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub statement: usize,
    pub kind: WarningKind,
    pub message: String,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "statement {}: {}", self.statement, self.message)
    }
}

// ============================================================================
// Scripts
// ============================================================================

/// Parse a script file from disk.
pub fn parse_script_file(path: &Path) -> Result<Script, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_script(&content)
}

/// Parse a script from source text. Blank lines and `#` comments are skipped.
pub fn parse_script(source: &str) -> Result<Script, String> {
    let mut statements = Vec::new();
    for (i, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let stat = parse_line(line).map_err(|e| format!("line {}: {}", i + 1, e))?;
        statements.push(stat);
    }
    Ok(Script::new(statements))
}

fn parse_line(line: &str) -> Result<Statement, String> {
    let tokens = tokenize(line)?;

    if tokens.len() >= 2 && tokens[1] == "=" {
        let ident = &tokens[0];
        if !is_identifier(ident) {
            return Err(format!("invalid identifier '{}'", ident));
        }
        // `ident =` with nothing after it is how a null value renders
        let expr = match &tokens[2..] {
            [] => Expr::Value(ValueNode::Literal(Value::Null)),
            rest => parse_expr(rest)?,
        };
        return Ok(Statement::new(Node::Declaration(DeclarationNode::new(
            ident.clone(),
            expr,
        ))));
    }

    let node = match parse_expr(&tokens)? {
        Expr::Command(cmd) => Node::Command(cmd),
        Expr::Value(val) => Node::Value(val),
    };
    Ok(Statement::new(node))
}

fn parse_expr(tokens: &[String]) -> Result<Expr, String> {
    match tokens {
        [] => Err("empty expression".to_string()),
        [single] => Ok(Expr::Value(parse_value_node(single)?)),
        [action, entity, operands @ ..] => {
            for word in [action, entity] {
                if !is_identifier(word) {
                    return Err(format!("invalid command word '{}'", word));
                }
            }
            let mut cmd = CommandNode::new(action.clone(), entity.clone());
            for token in operands {
                let (key, raw) = token
                    .split_once('=')
                    .ok_or_else(|| format!("expected key=value, got '{}'", token))?;
                if !is_identifier(key) {
                    return Err(format!("invalid parameter name '{}'", key));
                }
                if cmd.insert_operand(key, parse_operand(raw)?).is_some() {
                    return Err(format!("duplicate parameter '{}'", key));
                }
            }
            Ok(Expr::Command(cmd))
        }
    }
}

/// Split a line on whitespace, keeping quoted sections (quotes included) intact.
fn tokenize(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some('"') if c == '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            Some(q) if c == q => {
                current.push(c);
                quote = None;
            }
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                current.push(c);
                quote = Some(c);
            }
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }

    if let Some(q) = quote {
        return Err(format!("unterminated {} quote", q));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

fn parse_hole(raw: &str) -> Option<&str> {
    let name = raw.strip_prefix('{')?.strip_suffix('}')?;
    is_identifier(name).then_some(name)
}

fn parse_operand(raw: &str) -> Result<Operand, String> {
    if let Some(hole) = parse_hole(raw) {
        return Ok(Operand::Hole(hole.to_string()));
    }
    if let Some(ident) = raw.strip_prefix('$') {
        if !is_identifier(ident) {
            return Err(format!("invalid reference '{}'", raw));
        }
        return Ok(Operand::Ref(ident.to_string()));
    }
    Ok(Operand::Param(parse_value(raw)?))
}

fn parse_value_node(raw: &str) -> Result<ValueNode, String> {
    if let Some(hole) = parse_hole(raw) {
        return Ok(ValueNode::Hole(hole.to_string()));
    }
    if raw.starts_with('$') {
        return Err(format!(
            "reference '{}' is only allowed as a command parameter",
            raw
        ));
    }
    Ok(ValueNode::Literal(parse_value(raw)?))
}

/// Parse a literal value in canonical syntax.
///
/// Empty → null; `'...'` verbatim; `"..."` with `\\`, `\"`, `\n`, `\r` and
/// `\t` escapes; a bare token with a comma → list; integers and decimals in
/// their canonical spelling → numbers (`42`, `-1.5`, but not `007` or `1.50`);
/// anything else → string.
pub fn parse_value(raw: &str) -> Result<Value, String> {
    if raw.is_empty() {
        return Ok(Value::Null);
    }
    if let Some(rest) = raw.strip_prefix('\'') {
        let inner = rest
            .strip_suffix('\'')
            .ok_or_else(|| format!("unterminated quote in {}", raw))?;
        return Ok(Value::Str(inner.to_string()));
    }
    if raw.starts_with('"') {
        return unescape_double(raw).map(Value::Str);
    }
    if raw.contains(',') {
        return Ok(Value::List(raw.split(',').map(str::to_string).collect()));
    }
    if is_integer(raw) {
        if let Ok(i) = raw.parse::<i64>() {
            if i.to_string() == raw {
                return Ok(Value::Int(i));
            }
        }
    }
    if is_decimal(raw) {
        if let Ok(x) = raw.parse::<f64>() {
            if x.to_string() == raw {
                return Ok(Value::Float(x));
            }
        }
    }
    Ok(Value::Str(raw.to_string()))
}

fn unescape_double(raw: &str) -> Result<String, String> {
    let mut out = String::new();
    let mut chars = raw.chars().skip(1);
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next @ ('\\' | '"')) => out.push(next),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            },
            '"' => {
                if chars.next().is_some() {
                    return Err(format!("trailing characters after quoted string {}", raw));
                }
                return Ok(out);
            }
            _ => out.push(c),
        }
    }
    Err(format!("unterminated quote in {}", raw))
}

fn is_integer(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_decimal(s: &str) -> bool {
    let body = s.strip_prefix('-').unwrap_or(s);
    match body.split_once('.') {
        Some((int, frac)) => is_integer(int) && is_integer(frac) && !frac.starts_with('-'),
        None => false,
    }
}

// ============================================================================
// Run config and fills
// ============================================================================

/// Parse a run config file from disk.
pub fn parse_config_file(path: &Path) -> Result<ScriptConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_config(&content)
}

/// Parse a run config from YAML.
pub fn parse_config(yaml: &str) -> Result<ScriptConfig, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Parse a `name=value` fill flag. The value uses canonical value syntax.
pub fn parse_fill_flag(flag: &str) -> Result<(String, Value), String> {
    let (name, raw) = flag
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", flag))?;
    let name = name.trim();
    if !is_identifier(name) {
        return Err(format!("invalid hole name '{}'", name));
    }
    Ok((name.to_string(), parse_value(raw.trim())?))
}

// ============================================================================
// Validation
// ============================================================================

/// Check identifier usage. Returns warnings (empty = clean). Never mutates.
pub fn validate_script(script: &Script) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    // First declaration site of each identifier
    let mut declared_at: HashMap<&str, usize> = HashMap::new();
    for (i, stat) in script.statements.iter().enumerate() {
        let Some(ident) = stat.node.declared_ident() else {
            continue;
        };
        if let Some(&first) = declared_at.get(ident) {
            warnings.push(ValidationWarning {
                statement: i + 1,
                kind: WarningKind::DuplicateIdentifier,
                message: format!(
                    "identifier '{}' already declared at statement {}",
                    ident,
                    first + 1
                ),
            });
        } else {
            declared_at.insert(ident, i);
        }
    }

    for (i, stat) in script.statements.iter().enumerate() {
        let Some(cmd) = stat.node.command() else {
            continue;
        };
        for (key, ident) in cmd.refs() {
            match declared_at.get(ident) {
                None => warnings.push(ValidationWarning {
                    statement: i + 1,
                    kind: WarningKind::UndeclaredReference,
                    message: format!("{}=${} references an undeclared identifier", key, ident),
                }),
                Some(&at) if at >= i => warnings.push(ValidationWarning {
                    statement: i + 1,
                    kind: WarningKind::ForwardReference,
                    message: format!(
                        "{}=${} references statement {}, which has not run yet",
                        key,
                        ident,
                        at + 1
                    ),
                }),
                Some(_) => {}
            }
        }
    }

    warnings.sort_by_key(|w| w.statement);
    warnings
}
