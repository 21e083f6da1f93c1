//! Core template logic — syntax tree, rendering, parsing, resolution, execution.

pub mod ast;
pub mod executor;
pub mod parser;
pub mod render;
pub mod resolver;
pub mod revert;
pub mod types;
