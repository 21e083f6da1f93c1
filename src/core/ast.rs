//! TPL-002: Script syntax tree — statements, declarations, commands, values.
//!
//! Operands are value-incomplete at parse time: a command operand is either a
//! resolved parameter, a hole (filled by the caller) or a reference (filled
//! from the result of an earlier declaration). Resolution mutates nodes in
//! place. `Clone` yields a fully independent tree; cloned commands start
//! unexecuted.

use super::types::{Fills, Value};
use indexmap::IndexMap;

/// An ordered script. Statement order is execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub statements: Vec<Statement>,
}

impl Script {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// All command nodes, bare or declared, in script order.
    pub fn commands(&self) -> impl Iterator<Item = &CommandNode> {
        self.statements.iter().filter_map(|s| s.node.command())
    }
}

/// A single slot of the script.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub node: Node,
}

impl Statement {
    pub fn new(node: Node) -> Self {
        Self { node }
    }
}

impl From<Node> for Statement {
    fn from(node: Node) -> Self {
        Self { node }
    }
}

/// Closed set of node variants a statement can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Declaration(DeclarationNode),
    Command(CommandNode),
    Value(ValueNode),
}

impl Node {
    /// Fill holes; returns what was just bound.
    pub fn process_holes(&mut self, fills: &Fills) -> Fills {
        match self {
            Self::Declaration(decl) => decl.process_holes(fills),
            Self::Command(cmd) => cmd.process_holes(fills),
            Self::Value(val) => val.process_holes(fills),
        }
    }

    /// Fill references. Only commands carry references.
    pub fn process_refs(&mut self, fills: &Fills) {
        if let Some(cmd) = self.command_mut() {
            cmd.process_refs(fills);
        }
    }

    /// Pending hole names.
    pub fn holes(&self) -> Vec<String> {
        match self {
            Self::Declaration(decl) => decl.holes(),
            Self::Command(cmd) => cmd.holes(),
            Self::Value(val) => val.holes(),
        }
    }

    /// Identifier bound by this node, if it is a declaration.
    pub fn declared_ident(&self) -> Option<&str> {
        match self {
            Self::Declaration(decl) => Some(&decl.ident),
            _ => None,
        }
    }

    /// The command held by this node, directly or through a declaration.
    pub fn command(&self) -> Option<&CommandNode> {
        match self {
            Self::Command(cmd) => Some(cmd),
            Self::Declaration(DeclarationNode {
                expr: Expr::Command(cmd),
                ..
            }) => Some(cmd),
            _ => None,
        }
    }

    pub fn command_mut(&mut self) -> Option<&mut CommandNode> {
        match self {
            Self::Command(cmd) => Some(cmd),
            Self::Declaration(DeclarationNode {
                expr: Expr::Command(cmd),
                ..
            }) => Some(cmd),
            _ => None,
        }
    }
}

/// Binds an identifier to the result of an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclarationNode {
    pub ident: String,
    pub expr: Expr,
}

impl DeclarationNode {
    pub fn new(ident: impl Into<String>, expr: impl Into<Expr>) -> Self {
        Self {
            ident: ident.into(),
            expr: expr.into(),
        }
    }

    pub fn process_holes(&mut self, fills: &Fills) -> Fills {
        self.expr.process_holes(fills)
    }

    pub fn holes(&self) -> Vec<String> {
        self.expr.holes()
    }
}

/// Right-hand side of a declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Command(CommandNode),
    Value(ValueNode),
}

impl Expr {
    pub fn process_holes(&mut self, fills: &Fills) -> Fills {
        match self {
            Self::Command(cmd) => cmd.process_holes(fills),
            Self::Value(val) => val.process_holes(fills),
        }
    }

    pub fn holes(&self) -> Vec<String> {
        match self {
            Self::Command(cmd) => cmd.holes(),
            Self::Value(val) => val.holes(),
        }
    }

    /// Value produced by the expression, once known.
    pub fn result(&self) -> Option<&Value> {
        match self {
            Self::Command(cmd) => cmd.result(),
            Self::Value(val) => val.value(),
        }
    }

    /// Execution error, if any. Values never fail.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Command(cmd) => cmd.error(),
            Self::Value(_) => None,
        }
    }
}

impl From<CommandNode> for Expr {
    fn from(cmd: CommandNode) -> Self {
        Self::Command(cmd)
    }
}

impl From<ValueNode> for Expr {
    fn from(val: ValueNode) -> Self {
        Self::Value(val)
    }
}

// ============================================================================
// Command nodes
// ============================================================================

/// One command operand. Keeping all three states in a single map makes the
/// params/holes/refs key sets disjoint by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Resolved value
    Param(Value),
    /// Awaiting a caller fill under this hole name
    Hole(String),
    /// Awaiting the result of the declaration with this identifier
    Ref(String),
}

/// An `action entity key=value...` operation.
#[derive(Debug, PartialEq)]
pub struct CommandNode {
    action: String,
    entity: String,
    operands: IndexMap<String, Operand>,
    result: Option<Value>,
    error: Option<String>,
}

impl CommandNode {
    pub fn new(action: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            entity: entity.into(),
            operands: IndexMap::new(),
            result: None,
            error: None,
        }
    }

    /// Set a resolved parameter, replacing any operand under `key`.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.operands.insert(key.into(), Operand::Param(value.into()));
        self
    }

    /// Set a hole, replacing any operand under `key`.
    pub fn with_hole(mut self, key: impl Into<String>, hole: impl Into<String>) -> Self {
        self.operands.insert(key.into(), Operand::Hole(hole.into()));
        self
    }

    /// Set a reference, replacing any operand under `key`.
    pub fn with_ref(mut self, key: impl Into<String>, ident: impl Into<String>) -> Self {
        self.operands.insert(key.into(), Operand::Ref(ident.into()));
        self
    }

    /// Insert an operand; returns the operand previously stored under `key`.
    pub fn insert_operand(&mut self, key: impl Into<String>, operand: Operand) -> Option<Operand> {
        self.operands.insert(key.into(), operand)
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn operands(&self) -> impl Iterator<Item = (&str, &Operand)> {
        self.operands.iter().map(|(k, o)| (k.as_str(), o))
    }

    /// Every operand key, whatever its state. No duplicates.
    pub fn keys(&self) -> Vec<String> {
        self.operands.keys().cloned().collect()
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.operands.iter().filter_map(|(k, o)| match o {
            Operand::Param(v) => Some((k.as_str(), v)),
            _ => None,
        })
    }

    /// Pending `(key, hole name)` pairs.
    pub fn hole_operands(&self) -> impl Iterator<Item = (&str, &str)> {
        self.operands.iter().filter_map(|(k, o)| match o {
            Operand::Hole(h) => Some((k.as_str(), h.as_str())),
            _ => None,
        })
    }

    /// Pending `(key, identifier)` pairs.
    pub fn refs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.operands.iter().filter_map(|(k, o)| match o {
            Operand::Ref(r) => Some((k.as_str(), r.as_str())),
            _ => None,
        })
    }

    /// Pending hole names, one per pending operand.
    pub fn holes(&self) -> Vec<String> {
        self.hole_operands().map(|(_, h)| h.to_string()).collect()
    }

    /// True when no holes or refs remain.
    pub fn is_resolved(&self) -> bool {
        self.operands
            .values()
            .all(|o| matches!(o, Operand::Param(_)))
    }

    /// Resolved parameters as an owned map, for the executor.
    pub fn params_map(&self) -> IndexMap<String, Value> {
        self.params()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Move filled holes into params. Returned keys are `entity.key` so fills
    /// of a shared hole name stay attributable to each command.
    pub fn process_holes(&mut self, fills: &Fills) -> Fills {
        let mut processed = Fills::new();
        let entity = &self.entity;
        for (key, operand) in self.operands.iter_mut() {
            let Operand::Hole(hole) = operand else {
                continue;
            };
            if let Some(val) = fills.get(hole.as_str()) {
                processed.insert(format!("{}.{}", entity, key), val.clone());
                *operand = Operand::Param(val.clone());
            }
        }
        processed
    }

    /// Move references whose identifier is present in `fills` into params.
    pub fn process_refs(&mut self, fills: &Fills) {
        for operand in self.operands.values_mut() {
            let Operand::Ref(ident) = operand else {
                continue;
            };
            if let Some(val) = fills.get(ident.as_str()) {
                *operand = Operand::Param(val.clone());
            }
        }
    }

    /// Store the executor's outcome.
    pub fn record(&mut self, outcome: Result<Value, String>) {
        match outcome {
            Ok(val) => {
                self.result = Some(val);
                self.error = None;
            }
            Err(e) => {
                self.result = None;
                self.error = Some(e);
            }
        }
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// A clone is a fresh, not-yet-executed instance: result and error are dropped.
impl Clone for CommandNode {
    fn clone(&self) -> Self {
        Self {
            action: self.action.clone(),
            entity: self.entity.clone(),
            operands: self.operands.clone(),
            result: None,
            error: None,
        }
    }
}

// ============================================================================
// Value nodes
// ============================================================================

/// A single literal-or-hole operand.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueNode {
    Literal(Value),
    Hole(String),
}

impl ValueNode {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Literal(v) => Some(v),
            Self::Hole(_) => None,
        }
    }

    /// Bind the hole if `fills` has it. Returns `{hole: value}` when bound,
    /// an empty map otherwise.
    pub fn process_holes(&mut self, fills: &Fills) -> Fills {
        let mut processed = Fills::new();
        if let Self::Hole(hole) = self {
            if let Some(val) = fills.get(hole.as_str()) {
                processed.insert(hole.clone(), val.clone());
                *self = Self::Literal(val.clone());
            }
        }
        processed
    }

    pub fn holes(&self) -> Vec<String> {
        match self {
            Self::Hole(h) => vec![h.clone()],
            Self::Literal(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fills(pairs: &[(&str, &str)]) -> Fills {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    #[test]
    fn test_tpl002_value_hole_fill() {
        let mut val = ValueNode::Hole("region".to_string());
        assert!(!val.is_resolved());
        assert_eq!(val.holes(), vec!["region"]);

        let processed = val.process_holes(&fills(&[("region", "eu-west-1")]));
        assert_eq!(processed.len(), 1);
        assert_eq!(processed["region"], Value::from("eu-west-1"));
        assert!(val.is_resolved());
        assert!(val.holes().is_empty());
        assert_eq!(val.value(), Some(&Value::from("eu-west-1")));
    }

    #[test]
    fn test_tpl002_value_missing_fill_not_error() {
        let mut val = ValueNode::Hole("region".to_string());
        let processed = val.process_holes(&Fills::new());
        assert!(processed.is_empty());
        assert_eq!(val.holes().len(), 1);
    }

    #[test]
    fn test_tpl002_value_resolved_is_noop() {
        let mut val = ValueNode::Literal(Value::from("x"));
        let processed = val.process_holes(&fills(&[("x", "y")]));
        assert!(processed.is_empty());
        assert_eq!(val.value(), Some(&Value::from("x")));
    }

    #[test]
    fn test_tpl002_command_hole_fill_namespaced() {
        let mut cmd = CommandNode::new("create", "instance")
            .with_hole("subnet", "sub")
            .with_hole("name", "name")
            .with_param("type", "t2.micro");
        let processed = cmd.process_holes(&fills(&[("sub", "subnet-1")]));
        assert_eq!(processed.len(), 1);
        assert_eq!(processed["instance.subnet"], Value::from("subnet-1"));
        assert_eq!(cmd.holes(), vec!["name"]);
        assert_eq!(cmd.params().count(), 2);
    }

    #[test]
    fn test_tpl002_command_shared_hole_name() {
        let mut cmd = CommandNode::new("create", "route")
            .with_hole("src", "cidr")
            .with_hole("dst", "cidr");
        let processed = cmd.process_holes(&fills(&[("cidr", "0.0.0.0/0")]));
        assert_eq!(processed.len(), 2);
        assert!(processed.contains_key("route.src"));
        assert!(processed.contains_key("route.dst"));
        assert!(cmd.is_resolved());
    }

    #[test]
    fn test_tpl002_command_hole_fill_idempotent() {
        let mut cmd = CommandNode::new("create", "vpc").with_hole("cidr", "cidr");
        let f = fills(&[("cidr", "10.0.0.0/16")]);
        let first = cmd.process_holes(&f);
        let after_first = cmd.clone();
        let second = cmd.process_holes(&f);
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(cmd, after_first);
    }

    #[test]
    fn test_tpl002_command_refs() {
        let mut cmd = CommandNode::new("create", "subnet")
            .with_ref("vpc", "myvpc")
            .with_ref("zone", "myzone");
        cmd.process_refs(&fills(&[("myvpc", "vpc-123")]));
        let params = cmd.params_map();
        assert_eq!(params["vpc"], Value::from("vpc-123"));
        let refs: Vec<_> = cmd.refs().collect();
        assert_eq!(refs, vec![("zone", "myzone")]);
        assert!(!cmd.is_resolved());
    }

    #[test]
    fn test_tpl002_command_keys_union_unique() {
        let cmd = CommandNode::new("create", "subnet")
            .with_param("cidr", "10.0.1.0/24")
            .with_hole("zone", "zone")
            .with_ref("vpc", "myvpc")
            .with_hole("cidr", "cidr");
        let mut keys = cmd.keys();
        keys.sort();
        assert_eq!(keys, vec!["cidr", "vpc", "zone"]);
        assert_eq!(cmd.params().count(), 0);
    }

    #[test]
    fn test_tpl002_command_clone_drops_outcome() {
        let mut cmd = CommandNode::new("create", "vpc").with_param("cidr", "10.0.0.0/16");
        cmd.record(Ok(Value::from("vpc-1")));
        assert_eq!(cmd.result(), Some(&Value::from("vpc-1")));
        let clone = cmd.clone();
        assert!(clone.result().is_none());
        assert!(clone.error().is_none());
        assert_eq!(clone.action(), "create");
        assert_eq!(clone.params_map(), cmd.params_map());
    }

    #[test]
    fn test_tpl002_command_record_error() {
        let mut cmd = CommandNode::new("delete", "vpc");
        cmd.record(Err("DependencyViolation".to_string()));
        assert_eq!(cmd.error(), Some("DependencyViolation"));
        assert!(cmd.result().is_none());
    }

    #[test]
    fn test_tpl002_clone_independent() {
        let original = Script::new(vec![
            Statement::new(Node::Declaration(DeclarationNode::new(
                "myvpc",
                CommandNode::new("create", "vpc").with_hole("cidr", "cidr"),
            ))),
            Statement::new(Node::Command(
                CommandNode::new("create", "subnet").with_ref("vpc", "myvpc"),
            )),
        ]);
        let snapshot = original.clone();
        let mut clone = original.clone();
        for stat in &mut clone.statements {
            stat.node.process_holes(&fills(&[("cidr", "10.0.0.0/16")]));
            stat.node.process_refs(&fills(&[("myvpc", "vpc-1")]));
        }
        assert_eq!(original, snapshot);
        assert_ne!(clone, original);
        assert_eq!(original.commands().next().map(|c| c.holes()), Some(vec!["cidr".to_string()]));
    }

    #[test]
    fn test_tpl002_declaration_delegates() {
        let mut node = Node::Declaration(DeclarationNode::new(
            "name",
            ValueNode::Hole("instance_name".to_string()),
        ));
        assert_eq!(node.declared_ident(), Some("name"));
        assert_eq!(node.holes(), vec!["instance_name"]);
        assert!(node.command().is_none());
        let processed = node.process_holes(&fills(&[("instance_name", "web")]));
        assert_eq!(processed["instance_name"], Value::from("web"));
        assert!(node.holes().is_empty());
    }

    #[test]
    fn test_tpl002_expr_result() {
        let expr = Expr::from(ValueNode::Literal(Value::Int(3)));
        assert_eq!(expr.result(), Some(&Value::Int(3)));
        assert!(expr.error().is_none());
        let expr = Expr::from(CommandNode::new("create", "vpc"));
        assert!(expr.result().is_none());
    }

    #[test]
    fn test_tpl002_nodes_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Script>();
    }
}
