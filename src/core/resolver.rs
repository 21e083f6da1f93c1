//! TPL-005: Script-level resolution passes.
//!
//! One pass applies a fill map to every statement in script order. Absent
//! fills are not errors; the operand stays pending for a later pass, so
//! passes can be repeated as values become available.

use super::ast::Script;
use super::types::{Fills, Value};
use std::collections::BTreeSet;

/// Apply hole fills to every statement. Returns what was just bound, in
/// statement order: `entity.key` for command operands, the hole name for
/// value nodes. Two statements binding the same `entity.key` both appear.
pub fn fill_holes(script: &mut Script, fills: &Fills) -> Vec<(String, Value)> {
    let mut processed = Vec::new();
    for stat in &mut script.statements {
        let mut bound: Vec<_> = stat.node.process_holes(fills).into_iter().collect();
        bound.sort_by(|a, b| a.0.cmp(&b.0));
        processed.extend(bound);
    }
    processed
}

/// Apply reference fills (identifier → result) to every command.
pub fn fill_refs(script: &mut Script, fills: &Fills) {
    for stat in &mut script.statements {
        stat.node.process_refs(fills);
    }
}

/// Hole names still pending anywhere in the script, sorted and de-duplicated.
pub fn pending_holes(script: &Script) -> Vec<String> {
    let holes: BTreeSet<String> = script
        .statements
        .iter()
        .flat_map(|s| s.node.holes())
        .collect();
    holes.into_iter().collect()
}

/// Identifiers still referenced by pending operands, sorted and de-duplicated.
pub fn pending_refs(script: &Script) -> Vec<String> {
    let refs: BTreeSet<String> = script
        .commands()
        .flat_map(|c| c.refs().map(|(_, ident)| ident.to_string()))
        .collect();
    refs.into_iter().collect()
}

/// Declared identifiers in script order (duplicates kept).
pub fn declared_identifiers(script: &Script) -> Vec<String> {
    script
        .statements
        .iter()
        .filter_map(|s| s.node.declared_ident().map(str::to_string))
        .collect()
}

/// True when no holes or refs remain anywhere.
pub fn is_fully_resolved(script: &Script) -> bool {
    script.statements.iter().all(|s| s.node.holes().is_empty())
        && script.commands().all(|c| c.is_resolved())
}
