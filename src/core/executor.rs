//! TPL-006: Run driver — executes a script statement by statement.
//!
//! For each statement in order: apply the identifier bindings collected so
//! far to its references, execute it if fully resolved, record the outcome on
//! the node, and bind the result if the statement is a declaration. Bindings
//! only ever flow forward, so a reference to a later declaration stays pending.

use super::ast::{CommandNode, DeclarationNode, Expr, Node, Script};
use super::render::render_value;
use super::resolver;
use super::types::*;
use crate::audit::{eventlog, hasher};
use indexmap::IndexMap;
use std::path::Path;
use std::time::Instant;

/// Dispatches a resolved command to a provider action.
pub trait Executor {
    fn execute(
        &mut self,
        action: &str,
        entity: &str,
        params: &IndexMap<String, Value>,
    ) -> Result<Value, String>;
}

impl<F> Executor for F
where
    F: FnMut(&str, &str, &IndexMap<String, Value>) -> Result<Value, String>,
{
    fn execute(
        &mut self,
        action: &str,
        entity: &str,
        params: &IndexMap<String, Value>,
    ) -> Result<Value, String> {
        self(action, entity, params)
    }
}

/// Configuration for a run.
pub struct RunConfig<'a> {
    /// Script name, used for the event log location
    pub name: &'a str,
    pub policy: &'a RunPolicy,
    /// Where the event log lives; `None` disables it
    pub state_dir: Option<&'a Path>,
}

/// Writes run events when the policy and state dir allow it.
struct EventSink<'a> {
    state_dir: Option<&'a Path>,
    name: &'a str,
}

impl EventSink<'_> {
    fn emit(&self, event: RunEvent) -> Result<(), String> {
        match self.state_dir {
            Some(dir) => eventlog::append_event(dir, self.name, event),
            None => Ok(()),
        }
    }
}

/// Execute the script in place.
///
/// Errors only if the event log cannot be opened at the start of the run;
/// command failures are recorded on the nodes and in the report.
pub fn run(
    script: &mut Script,
    executor: &mut dyn Executor,
    cfg: &RunConfig,
) -> Result<RunReport, String> {
    let start = Instant::now();
    let run_id = eventlog::generate_run_id();
    let sink = EventSink {
        state_dir: cfg.state_dir.filter(|_| cfg.policy.event_log),
        name: cfg.name,
    };

    sink.emit(RunEvent::RunStarted {
        script: cfg.name.to_string(),
        run_id: run_id.clone(),
        fingerprint: hasher::fingerprint(script),
        statements: script.len(),
        cloudscript_version: env!("CARGO_PKG_VERSION").to_string(),
    })?;

    let mut bindings = Fills::new();
    let mut outcomes = Vec::with_capacity(script.len());
    let mut halted_at: Option<usize> = None;

    for (index, stat) in script.statements.iter_mut().enumerate() {
        let outcome = match halted_at {
            Some(failed) if stat.node.command().is_some() => StatementOutcome::Skipped {
                reason: format!("not run: statement {} failed", failed + 1),
            },
            Some(_) => match stat.node.holes() {
                holes if holes.is_empty() => StatementOutcome::Literal,
                holes => skipped_for(&holes, &[]),
            },
            None => {
                stat.node.process_refs(&bindings);
                run_node(&mut stat.node, executor, &mut bindings)
            }
        };

        // Event log failures past this point must not abort the run
        let event = match &outcome {
            StatementOutcome::Succeeded(change) => Some(RunEvent::CommandSucceeded {
                run_id: run_id.clone(),
                index,
                change: change.clone(),
            }),
            StatementOutcome::Failed {
                action,
                entity,
                error,
            } => Some(RunEvent::CommandFailed {
                run_id: run_id.clone(),
                index,
                action: action.clone(),
                entity: entity.clone(),
                error: error.clone(),
            }),
            StatementOutcome::Skipped { reason } => Some(RunEvent::CommandSkipped {
                run_id: run_id.clone(),
                index,
                reason: reason.clone(),
            }),
            StatementOutcome::Literal => None,
        };
        if let Some(event) = event {
            let _ = sink.emit(event);
        }

        if matches!(outcome, StatementOutcome::Failed { .. })
            && cfg.policy.failure == FailurePolicy::StopOnFirst
            && halted_at.is_none()
        {
            halted_at = Some(index);
        }
        outcomes.push(outcome);
    }

    let mut report = RunReport {
        run_id: run_id.clone(),
        outcomes,
        succeeded: 0,
        failed: 0,
        skipped: 0,
        fingerprint: hasher::fingerprint(script),
        total_duration: start.elapsed(),
    };
    for outcome in &report.outcomes {
        match outcome {
            StatementOutcome::Succeeded(_) => report.succeeded += 1,
            StatementOutcome::Failed { .. } => report.failed += 1,
            StatementOutcome::Skipped { .. } => report.skipped += 1,
            StatementOutcome::Literal => {}
        }
    }

    let _ = sink.emit(RunEvent::RunCompleted {
        run_id,
        succeeded: report.succeeded,
        failed: report.failed,
        skipped: report.skipped,
        fingerprint: report.fingerprint.clone(),
        total_seconds: report.total_duration.as_secs_f64(),
    });

    Ok(report)
}

/// Clone the script, fill holes on the clone, and run the clone.
/// The source script is left untouched.
pub fn dry_run(
    script: &Script,
    fills: &Fills,
    executor: &mut dyn Executor,
    cfg: &RunConfig,
) -> Result<(Script, RunReport), String> {
    let mut clone = script.clone();
    resolver::fill_holes(&mut clone, fills);
    let report = run(&mut clone, executor, cfg)?;
    Ok((clone, report))
}

fn run_node(node: &mut Node, executor: &mut dyn Executor, bindings: &mut Fills) -> StatementOutcome {
    match node {
        Node::Command(cmd) => run_command(cmd, executor),
        Node::Declaration(DeclarationNode {
            ident,
            expr: Expr::Command(cmd),
        }) => {
            let outcome = run_command(cmd, executor);
            // A redeclaration that produced nothing unbinds the identifier
            match cmd.result() {
                Some(result) => bindings.insert(ident.clone(), result.clone()),
                None => bindings.remove(ident.as_str()),
            };
            outcome
        }
        Node::Declaration(DeclarationNode {
            ident,
            expr: Expr::Value(val),
        }) => match val.value() {
            Some(v) => {
                bindings.insert(ident.clone(), v.clone());
                StatementOutcome::Literal
            }
            None => {
                bindings.remove(ident.as_str());
                skipped_for(&val.holes(), &[])
            }
        },
        Node::Value(val) => {
            if val.is_resolved() {
                StatementOutcome::Literal
            } else {
                skipped_for(&val.holes(), &[])
            }
        }
    }
}

fn run_command(cmd: &mut CommandNode, executor: &mut dyn Executor) -> StatementOutcome {
    if !cmd.is_resolved() {
        let refs: Vec<String> = cmd.refs().map(|(_, ident)| ident.to_string()).collect();
        return skipped_for(&cmd.holes(), &refs);
    }

    let params = cmd.params_map();
    let outcome = executor.execute(cmd.action(), cmd.entity(), &params);
    cmd.record(outcome.clone());

    match outcome {
        Ok(result) => StatementOutcome::Succeeded(ChangeRecord {
            action: cmd.action().to_string(),
            entity: cmd.entity().to_string(),
            params,
            result,
        }),
        Err(error) => StatementOutcome::Failed {
            action: cmd.action().to_string(),
            entity: cmd.entity().to_string(),
            error,
        },
    }
}

fn skipped_for(holes: &[String], refs: &[String]) -> StatementOutcome {
    let pending: Vec<String> = holes
        .iter()
        .map(|h| format!("{{{}}}", h))
        .chain(refs.iter().map(|r| format!("${}", r)))
        .collect();
    StatementOutcome::Skipped {
        reason: format!("unresolved {}", pending.join(", ")),
    }
}

// ============================================================================
// Simulated provider
// ============================================================================

/// Deterministic stand-in for a cloud provider.
///
/// Returns `<entity>-<8 hex>` ids derived from the command and a call
/// counter. Commands whose action (or `action entity`) is listed in
/// `fail_on` return an error instead.
#[derive(Debug, Default)]
pub struct SimulatedExecutor {
    calls: usize,
    fail_on: Vec<String>,
}

impl SimulatedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every command matching `action` or `action entity`.
    pub fn failing_on(mut self, pattern: impl Into<String>) -> Self {
        self.fail_on.push(pattern.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Executor for SimulatedExecutor {
    fn execute(
        &mut self,
        action: &str,
        entity: &str,
        params: &IndexMap<String, Value>,
    ) -> Result<Value, String> {
        self.calls += 1;
        let full = format!("{} {}", action, entity);
        if self.fail_on.iter().any(|p| p == action || *p == full) {
            return Err(format!("simulated failure: {}", full));
        }

        let mut rendered: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, render_value(v)))
            .collect();
        rendered.sort();
        let digest = hasher::short_digest(
            &[&full, &rendered.join(" "), &self.calls.to_string()],
            8,
        );
        Ok(Value::Str(format!("{}-{}", entity, digest)))
    }
}
