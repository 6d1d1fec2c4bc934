use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use agentflow_core::value::{Object, Value};

/// The type of a workflow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Input,
    Output,
    Agent,
    Function,
    Prompt,
    Condition,
}

impl NodeKind {
    /// The keyword used for this kind in workflow text.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Input => "input",
            NodeKind::Output => "output",
            NodeKind::Agent => "agent",
            NodeKind::Function => "function",
            NodeKind::Prompt => "prompt",
            NodeKind::Condition => "condition",
        }
    }

    /// Map a keyword from workflow text to a kind.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "input" => Some(NodeKind::Input),
            "output" => Some(NodeKind::Output),
            "agent" => Some(NodeKind::Agent),
            "function" => Some(NodeKind::Function),
            "prompt" => Some(NodeKind::Prompt),
            "condition" => Some(NodeKind::Condition),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node definition: kind plus the raw, unresolved parameters from the source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl NodeDef {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// A parameter, or `default` when absent.
    pub fn param_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.param(key).unwrap_or(default)
    }

    /// Variable name under which this node's result is stored.
    pub fn result_key(&self) -> String {
        format!("{}_result", self.name)
    }
}

/// How an edge is followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// `-->`: always followed.
    #[serde(rename = "-->")]
    Sequence,
    /// `==>`: followed when the source condition evaluated true.
    #[serde(rename = "==>")]
    ConditionTrue,
    /// `=/>`: followed when the source condition evaluated false.
    #[serde(rename = "=/>")]
    ConditionFalse,
}

impl EdgeKind {
    /// All kinds, in the order operators are matched.
    pub const ALL: [EdgeKind; 3] = [
        EdgeKind::Sequence,
        EdgeKind::ConditionTrue,
        EdgeKind::ConditionFalse,
    ];

    pub fn operator(&self) -> &'static str {
        match self {
            EdgeKind::Sequence => "-->",
            EdgeKind::ConditionTrue => "==>",
            EdgeKind::ConditionFalse => "=/>",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operator())
    }
}

/// A directed edge between two nodes.
///
/// Endpoints are not checked against the node set; a dangling target only
/// fails when traversal reaches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }

    /// Create an unconditional edge.
    pub fn sequence(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(source, target, EdgeKind::Sequence)
    }

    /// Create an edge followed when the source condition is true.
    pub fn when_true(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(source, target, EdgeKind::ConditionTrue)
    }

    /// Create an edge followed when the source condition is false.
    pub fn when_false(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(source, target, EdgeKind::ConditionFalse)
    }
}

/// A parsed workflow. Immutable once registered with an engine.
///
/// Nodes keep declaration order; names are unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub variables: Object,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            variables: Object::new(),
        }
    }

    /// Add a node. A node with the same name is replaced in place.
    pub fn with_node(mut self, node: NodeDef) -> Self {
        self.insert_node(node);
        self
    }

    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Insert a node, replacing (in place) any node with the same name.
    /// Returns true when an existing node was replaced.
    pub fn insert_node(&mut self, node: NodeDef) -> bool {
        match self.nodes.iter_mut().find(|n| n.name == node.name) {
            Some(existing) => {
                *existing = node;
                true
            }
            None => {
                self.nodes.push(node);
                false
            }
        }
    }

    /// Look up a node by name.
    pub fn node(&self, name: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Input nodes in declaration order.
    pub fn input_nodes(&self) -> impl Iterator<Item = &NodeDef> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Input)
    }

    /// Edges leaving `source`, in declaration order.
    pub fn outgoing<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == source)
    }

    /// Edge endpoints that do not name a node, sorted and unique.
    pub fn dangling_endpoints(&self) -> Vec<&str> {
        let missing: BTreeSet<&str> = self
            .edges
            .iter()
            .flat_map(|e| [e.source.as_str(), e.target.as_str()])
            .filter(|name| self.node(name).is_none())
            .collect();
        missing.into_iter().collect()
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON produced by [`Workflow::to_json`].
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Workflow {
        Workflow::new("Sample")
            .with_node(NodeDef::new("in", NodeKind::Input))
            .with_node(NodeDef::new("check", NodeKind::Condition).with_param("expression", "$x > 1"))
            .with_node(NodeDef::new("in2", NodeKind::Input))
            .with_edge(Edge::sequence("in", "check"))
            .with_edge(Edge::when_true("check", "out"))
            .with_edge(Edge::when_false("check", "in2"))
            .with_variable("x", 3i64)
    }

    #[test]
    fn test_node_builder() {
        let node = NodeDef::new("p", NodeKind::Prompt)
            .with_param("system", "be brief")
            .with_param("user", "hi");
        assert_eq!(node.param("system"), Some("be brief"));
        assert_eq!(node.param_or("model", "default"), "default");
        assert_eq!(node.result_key(), "p_result");
    }

    #[test]
    fn test_edge_builders() {
        let e = Edge::sequence("a", "b");
        assert_eq!(e.source, "a");
        assert_eq!(e.target, "b");
        assert_eq!(e.kind, EdgeKind::Sequence);
        assert_eq!(Edge::when_true("a", "c").kind.operator(), "==>");
        assert_eq!(Edge::when_false("a", "d").kind.operator(), "=/>");
    }

    #[test]
    fn test_input_nodes_keep_declaration_order() {
        let wf = sample();
        let inputs: Vec<&str> = wf.input_nodes().map(|n| n.name.as_str()).collect();
        assert_eq!(inputs, vec!["in", "in2"]);
    }

    #[test]
    fn test_insert_node_replaces_in_place() {
        let mut wf = sample();
        let replaced = wf.insert_node(NodeDef::new("check", NodeKind::Agent));
        assert!(replaced);
        assert_eq!(wf.nodes.len(), 3);
        assert_eq!(wf.nodes[1].kind, NodeKind::Agent);
    }

    #[test]
    fn test_outgoing_and_dangling() {
        let wf = sample();
        let targets: Vec<&str> = wf.outgoing("check").map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["out", "in2"]);
        assert_eq!(wf.dangling_endpoints(), vec!["out"]);
    }

    #[test]
    fn test_dangling_endpoints_reported_once() {
        let wf = Workflow::new("Ghosts")
            .with_node(NodeDef::new("b", NodeKind::Input))
            .with_node(NodeDef::new("x", NodeKind::Output))
            .with_edge(Edge::sequence("a", "ghost"))
            .with_edge(Edge::sequence("b", "x"))
            .with_edge(Edge::sequence("c", "ghost"));
        assert_eq!(wf.dangling_endpoints(), vec!["a", "c", "ghost"]);
    }

    #[test]
    fn test_kind_keywords() {
        for kind in [
            NodeKind::Input,
            NodeKind::Output,
            NodeKind::Agent,
            NodeKind::Function,
            NodeKind::Prompt,
            NodeKind::Condition,
        ] {
            assert_eq!(NodeKind::from_keyword(kind.as_str()), Some(kind));
        }
        assert_eq!(NodeKind::from_keyword("variable"), None);
    }

    #[test]
    fn test_json_shape() {
        let wf = sample();
        let json: serde_json::Value = serde_json::from_str(&wf.to_json().unwrap()).unwrap();
        assert_eq!(json["name"], "Sample");
        assert_eq!(json["nodes"][1]["type"], "condition");
        assert_eq!(json["edges"][1]["type"], "==>");
        assert_eq!(json["variables"]["x"], 3);

        let back = Workflow::from_json(&wf.to_json().unwrap()).unwrap();
        assert_eq!(back, wf);
    }
}
