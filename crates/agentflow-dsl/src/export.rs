//! Export workflows as callable-function registry entries.
//!
//! Each prompt node becomes a `urfn_prompt_*` entry and the workflow itself a
//! `urfn_workflow_*` entry carrying its serialized definition, so a function
//! registry can expose them by name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use agentflow_core::error::Result;

use crate::parser::parse_workflow;
use crate::workflow::{NodeKind, Workflow};

pub const PROMPT_MODULE: &str = "agent_dsl.prompts";
pub const WORKFLOW_MODULE: &str = "agent_dsl.workflows";

/// A registry entry describing how to invoke an exported unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub description: String,
    pub module: String,
    pub function: String,
    pub parameters: BTreeMap<String, String>,
}

/// Build registry entries for a workflow.
pub fn export_registry(workflow: &Workflow) -> Result<BTreeMap<String, RegistryEntry>> {
    let mut registry = BTreeMap::new();

    for node in workflow
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Prompt)
    {
        let parameters = BTreeMap::from([
            ("system_template".to_string(), node.param_or("system", "").to_string()),
            ("user_template".to_string(), node.param_or("user", "").to_string()),
            ("variables".to_string(), "{}".to_string()),
        ]);
        registry.insert(
            format!("urfn_prompt_{}", slug(&node.name)),
            RegistryEntry {
                description: format!("Prompt template for {}", node.name),
                module: PROMPT_MODULE.to_string(),
                function: "execute_prompt".to_string(),
                parameters,
            },
        );
    }

    let parameters = BTreeMap::from([
        ("workflow_def".to_string(), workflow.to_json()?),
        ("input".to_string(), "{}".to_string()),
    ]);
    registry.insert(
        format!("urfn_workflow_{}", slug(&workflow.name)),
        RegistryEntry {
            description: format!("Workflow: {}", workflow.name),
            module: WORKFLOW_MODULE.to_string(),
            function: "execute_workflow".to_string(),
            parameters,
        },
    );

    Ok(registry)
}

/// Parse workflow text and export it in one step.
pub fn generate_registry(text: &str) -> Result<BTreeMap<String, RegistryEntry>> {
    export_registry(&parse_workflow(text)?)
}

fn slug(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}
