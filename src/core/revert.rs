//! TPL-009: Revert planning from a run's change records.
//!
//! Walks succeeded changes newest-first and emits the inverse command for
//! each. A run is revertible only if every change has an inverse.

use super::ast::{CommandNode, Node, Script, Statement};
use super::types::{ChangeRecord, RunReport};

/// Inverse action pairs that keep the original parameters.
const SYMMETRIC: &[(&str, &str)] = &[("start", "stop"), ("attach", "detach")];

/// Build the script that undoes the succeeded changes of `report`.
pub fn plan_revert(report: &RunReport) -> Result<Script, String> {
    let changes: Vec<&ChangeRecord> = report.changes().collect();
    let mut statements = Vec::with_capacity(changes.len());
    let mut unrevertible = Vec::new();

    for change in changes.into_iter().rev() {
        match revert_change(change) {
            Some(cmd) => statements.push(Statement::new(Node::Command(cmd))),
            None => unrevertible.push(format!("{} {}", change.action, change.entity)),
        }
    }

    if !unrevertible.is_empty() {
        return Err(format!(
            "run {} cannot be reverted: no inverse for {}",
            report.run_id,
            unrevertible.join(", ")
        ));
    }
    Ok(Script::new(statements))
}

/// Inverse of one change, if it has one.
pub fn revert_change(change: &ChangeRecord) -> Option<CommandNode> {
    if change.action == "create" {
        if change.result.is_null() {
            return None;
        }
        return Some(
            CommandNode::new("delete", change.entity.clone()).with_param("id", change.result.clone()),
        );
    }

    let inverse = SYMMETRIC.iter().find_map(|&(a, b)| {
        if change.action == a {
            Some(b)
        } else if change.action == b {
            Some(a)
        } else {
            None
        }
    })?;
    Some(
        change
            .params
            .iter()
            .fold(CommandNode::new(inverse, change.entity.clone()), |cmd, (k, v)| {
                cmd.with_param(k.clone(), v.clone())
            }),
    )
}
