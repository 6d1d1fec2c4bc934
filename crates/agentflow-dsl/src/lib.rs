//! Workflow definition language.
//!
//! Text is parsed into an immutable [`Workflow`]: a named set of typed nodes,
//! ordered edges between them, and literal variables.

pub mod export;
pub mod literal;
pub mod parser;
pub mod workflow;

pub use export::{export_registry, generate_registry, RegistryEntry};
pub use literal::coerce_literal;
pub use parser::{extract_params, parse_workflow};
pub use workflow::{Edge, EdgeKind, NodeDef, NodeKind, Workflow};
