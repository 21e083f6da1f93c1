//! TPL-001: Shared types — operand values, run configuration, change records, audit events.
//!
//! Everything that crosses a module boundary or gets serialized lives here.
//! All config and audit types derive Serialize/Deserialize for YAML/JSON roundtripping.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Operand values
// ============================================================================

/// A concrete operand value: a literal from the script, a caller-supplied
/// fill, or the result of an executed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<String>),
}

impl Value {
    /// Borrow the inner string, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Default formatted representation (no quoting).
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "{}", s),
            Self::List(items) => write!(f, "{}", items.join(",")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

/// Flat name → value mapping used for hole fills, ref fills and
/// the "just bound" maps returned by resolution.
pub type Fills = HashMap<String, Value>;

// ============================================================================
// Run configuration (optional YAML file)
// ============================================================================

/// Run configuration — fills and execution policy for a script.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Script name used for the event log directory (defaults to file stem)
    #[serde(default)]
    pub name: Option<String>,

    /// Hole fills, by hole name
    #[serde(default)]
    pub fills: IndexMap<String, Value>,

    /// Execution policy
    #[serde(default)]
    pub policy: RunPolicy,
}

impl ScriptConfig {
    /// Fills as a lookup map.
    pub fn fill_map(&self) -> Fills {
        self.fills
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Execution policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPolicy {
    /// Failure handling
    #[serde(default)]
    pub failure: FailurePolicy,

    /// Append run events to the JSONL audit log
    #[serde(default = "default_true")]
    pub event_log: bool,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            failure: FailurePolicy::default(),
            event_log: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Failure handling strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    StopOnFirst,
    ContinueIndependent,
}

// ============================================================================
// Execution results
// ============================================================================

/// The unit of change handed to revision tracking: one executed command
/// with its final parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub action: String,
    pub entity: String,
    pub params: IndexMap<String, Value>,
    pub result: Value,
}

/// What happened to one statement during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutcome {
    /// Command executed and produced a result.
    Succeeded(ChangeRecord),
    /// Command executed and the executor returned an error.
    Failed {
        action: String,
        entity: String,
        error: String,
    },
    /// Command not executed (pending operands or an earlier failure).
    Skipped { reason: String },
    /// Value statement; nothing to execute.
    Literal,
}

impl StatementOutcome {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Succeeded(_) => "+",
            Self::Failed { .. } => "!",
            Self::Skipped { .. } => "?",
            Self::Literal => " ",
        }
    }
}

/// Result of running a script.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub outcomes: Vec<StatementOutcome>,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
    /// Fingerprint of the script rendering after the run
    pub fingerprint: String,
    pub total_duration: std::time::Duration,
}

impl RunReport {
    /// Changes of successfully executed commands, in execution order.
    pub fn changes(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.outcomes.iter().filter_map(|o| match o {
            StatementOutcome::Succeeded(change) => Some(change),
            _ => None,
        })
    }
}

// ============================================================================
// Audit events
// ============================================================================

/// Audit event for the JSONL event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        script: String,
        run_id: String,
        fingerprint: String,
        statements: usize,
        cloudscript_version: String,
    },
    CommandSucceeded {
        run_id: String,
        index: usize,
        change: ChangeRecord,
    },
    CommandFailed {
        run_id: String,
        index: usize,
        action: String,
        entity: String,
        error: String,
    },
    CommandSkipped {
        run_id: String,
        index: usize,
        reason: String,
    },
    RunCompleted {
        run_id: String,
        succeeded: u32,
        failed: u32,
        skipped: u32,
        fingerprint: String,
        total_seconds: f64,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: RunEvent,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tpl001_value_display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::from("my instance").to_string(), "my instance");
        assert_eq!(
            Value::List(vec!["a".into(), "b".into()]).to_string(),
            "a,b"
        );
    }

    #[test]
    fn test_tpl001_value_from_yaml() {
        let yaml = r#"
cidr: 10.0.0.0/16
count: 2
ratio: 0.5
public: true
zones: [eu-west-1a, eu-west-1b]
nothing: null
"#;
        let fills: IndexMap<String, Value> = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(fills["cidr"], Value::from("10.0.0.0/16"));
        assert_eq!(fills["count"], Value::Int(2));
        assert_eq!(fills["ratio"], Value::Float(0.5));
        assert_eq!(fills["public"], Value::Bool(true));
        assert_eq!(
            fills["zones"],
            Value::List(vec!["eu-west-1a".into(), "eu-west-1b".into()])
        );
        assert_eq!(fills["nothing"], Value::Null);
    }

    #[test]
    fn test_tpl001_script_config_defaults() {
        let config: ScriptConfig = serde_yaml_ng::from_str("fills: {}").unwrap();
        assert!(config.name.is_none());
        assert_eq!(config.policy.failure, FailurePolicy::StopOnFirst);
        assert!(config.policy.event_log);
    }

    #[test]
    fn test_tpl001_script_config_parse() {
        let yaml = r#"
name: web-stack
fills:
  region: eu-west-1
  count: 3
policy:
  failure: continue_independent
  event_log: false
"#;
        let config: ScriptConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.name.as_deref(), Some("web-stack"));
        assert_eq!(config.policy.failure, FailurePolicy::ContinueIndependent);
        assert!(!config.policy.event_log);
        let fills = config.fill_map();
        assert_eq!(fills.get("region"), Some(&Value::from("eu-west-1")));
        assert_eq!(fills.get("count"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_tpl001_run_event_serde() {
        let event = RunEvent::CommandSucceeded {
            run_id: "r-abc".to_string(),
            index: 0,
            change: ChangeRecord {
                action: "create".to_string(),
                entity: "vpc".to_string(),
                params: IndexMap::from([("cidr".to_string(), Value::from("10.0.0.0/16"))]),
                result: Value::from("vpc-123"),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"command_succeeded\""));
        assert!(json.contains("\"cidr\":\"10.0.0.0/16\""));
        assert!(json.contains("\"result\":\"vpc-123\""));
    }

    #[test]
    fn test_tpl001_outcome_symbols() {
        assert_eq!(StatementOutcome::Literal.symbol(), " ");
        assert_eq!(
            StatementOutcome::Skipped {
                reason: "x".to_string()
            }
            .symbol(),
            "?"
        );
    }
}
