//! cloudscript — template IR for ordered infrastructure-change scripts.
//!
//! Scripts are parsed once and resolved in passes: holes take caller-supplied
//! values, references take the results of earlier statements. Any script can
//! be cloned for dry-runs and rendered to a canonical, diffable text form.

pub mod audit;
pub mod cli;
pub mod core;
