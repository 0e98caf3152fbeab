//! Indexed graph model over node-graph documents.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::TRACING_TARGET;
use crate::document;
use crate::roles::{Role, RoleRegistry};

/// Default bound for graph traversals. Generous for real graphs, small
/// enough to cap the cost of adversarially deep chains.
pub const MAX_TRAVERSAL_DEPTH: usize = 50;

/// One node input: either a literal value or a link to another node's
/// output slot.
///
/// A link is a reference by id only; whether the id exists is a property of
/// the surrounding [`Graph`].
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Literal(Value),
    Link { source: String, slot: i64 },
}

impl From<&Value> for InputValue {
    fn from(value: &Value) -> Self {
        if let Some(items) = value.as_array() {
            // ["5", 0] or [["5", 0], ...]
            let head = match items.first() {
                Some(Value::Array(inner)) if inner.len() >= 2 => inner.first(),
                _ if items.len() >= 2 => items.first(),
                _ => None,
            };
            if let Some(id) = head.filter(|v| v.is_string() || v.is_i64() || v.is_u64()) {
                let slot = match items.first() {
                    Some(Value::Array(inner)) => inner.get(1).and_then(Value::as_i64),
                    _ => items.get(1).and_then(Value::as_i64),
                };
                return Self::Link {
                    source: document::id_string(id),
                    slot: slot.unwrap_or(0),
                };
            }
        }
        Self::Literal(value.clone())
    }
}

impl InputValue {
    /// Returns the linked source id for explicit link forms.
    pub fn as_link(&self) -> Option<&str> {
        match self {
            Self::Link { source, .. } => Some(source),
            Self::Literal(_) => None,
        }
    }

    /// Returns a node id this input points at, leniently.
    ///
    /// Accepts explicit links plus bare string/integer literals, which some
    /// producers store when only the id survived serialization.
    pub fn link_target(&self) -> Option<String> {
        match self {
            Self::Link { source, .. } => Some(source.clone()),
            Self::Literal(Value::String(s)) => Some(s.clone()),
            Self::Literal(value) if value.is_i64() || value.is_u64() => Some(value.to_string()),
            Self::Literal(_) => None,
        }
    }

    /// Returns the literal string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Literal(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Renders the input back into document form.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Link { source, slot } => json!([source, slot]),
        }
    }
}

/// A graph node: type name, ordered inputs and display metadata.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub class_type: Option<String>,
    pub inputs: IndexMap<String, InputValue>,
    pub meta: Map<String, Value>,
    pub title: Option<String>,
    pub widgets: Value,
}

impl Node {
    fn from_document(id: &str, value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        let class_type = object
            .get("class_type")
            .and_then(Value::as_str)
            .map(str::to_string);
        let meta = object
            .get("_meta")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let title = object
            .get("title")
            .and_then(Value::as_str)
            .or_else(|| meta.get("title").and_then(Value::as_str))
            .map(str::to_string);

        let inputs = object
            .get("inputs")
            .and_then(Value::as_object)
            .map(|inputs| {
                inputs
                    .iter()
                    .map(|(name, value)| (name.clone(), InputValue::from(value)))
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            id: id.to_string(),
            class_type,
            inputs,
            meta,
            title,
            widgets: object.get("widgets_values").cloned().unwrap_or(Value::Null),
        })
    }

    /// Lowercase type name, empty when absent.
    pub fn type_name(&self) -> String {
        self.class_type.as_deref().unwrap_or_default().to_lowercase()
    }

    /// Lowercase display title, empty when absent.
    pub fn title_lower(&self) -> String {
        self.title.as_deref().unwrap_or_default().to_lowercase()
    }

    /// Returns the first present input among the given names.
    pub fn first_input(&self, names: &[&str]) -> Option<&InputValue> {
        names.iter().find_map(|name| self.inputs.get(*name))
    }

    /// Returns the first non-null literal or link among the given names.
    pub fn first_value(&self, names: &[&str]) -> Option<Value> {
        names
            .iter()
            .filter_map(|name| self.inputs.get(*name))
            .map(InputValue::to_value)
            .find(|value| !value.is_null())
    }
}

/// Immutable indexed graph with derived adjacency.
///
/// Built fresh per call from a document; edges are derived strictly from
/// link inputs whose source id exists in the node set, so adjacency is
/// always consistent with the nodes.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    graph: DiGraph<Node, ()>,
    node_indices: HashMap<String, NodeIndex>,
}

impl Graph {
    /// Builds a graph from any supported document shape.
    ///
    /// Fails softly: an unrecognizable document yields an empty graph.
    pub fn from_document(document: &Value) -> Self {
        match document::normalize_to_prompt_graph(document) {
            Some(prompt_graph) => Self::from_prompt_graph(&prompt_graph),
            None => {
                debug!(target: TRACING_TARGET, "unrecognized graph document shape");
                Self::default()
            }
        }
    }

    /// Builds a graph from an already-flat id-to-node map.
    pub fn from_prompt_graph(prompt_graph: &Map<String, Value>) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();

        for (id, value) in prompt_graph {
            let Some(node) = Node::from_document(id, value) else {
                continue;
            };
            let index = graph.add_node(node);
            node_indices.insert(id.clone(), index);
        }

        // Producer -> consumer edges from link inputs.
        let consumers: Vec<(NodeIndex, Vec<String>)> = graph
            .node_indices()
            .map(|index| {
                let sources = graph[index]
                    .inputs
                    .values()
                    .filter_map(|input| input.as_link().map(str::to_string))
                    .collect();
                (index, sources)
            })
            .collect();
        for (consumer, sources) in consumers {
            for source in sources {
                if let Some(&producer) = node_indices.get(&source) {
                    graph.add_edge(producer, consumer, ());
                }
            }
        }

        Self { graph, node_indices }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        let index = self.node_indices.get(id)?;
        self.graph.node_weight(*index)
    }

    /// Returns an iterator over all nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_indices().filter_map(|index| self.graph.node_weight(index))
    }

    /// Ids of nodes feeding directly into the given node.
    pub fn upstream(&self, id: &str) -> Vec<String> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Ids of nodes directly consuming the given node's outputs.
    pub fn downstream(&self, id: &str) -> Vec<String> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<String> {
        let Some(&index) = self.node_indices.get(id) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(index, direction)
            .filter_map(|neighbor| self.graph.node_weight(neighbor))
            .map(|node| node.id.clone())
            .collect()
    }

    /// Ids of all nodes whose type matches the given role.
    pub fn nodes_with_role(&self, registry: &RoleRegistry, role: Role) -> Vec<String> {
        self.nodes()
            .filter(|node| {
                node.class_type
                    .as_deref()
                    .is_some_and(|class| registry.matches(role, class))
            })
            .map(|node| node.id.clone())
            .collect()
    }

    /// Breadth-first upstream traversal from the given start nodes.
    ///
    /// Returns ids in discovery order. A visited set and the depth bound
    /// guarantee termination on cyclic or adversarially deep graphs.
    pub fn trace_upstream(&self, start_ids: &[&str], max_depth: usize) -> Vec<String> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut order = Vec::new();
        let mut queue: VecDeque<(String, usize)> =
            start_ids.iter().map(|id| (id.to_string(), 0)).collect();

        while let Some((id, depth)) = queue.pop_front() {
            if depth > max_depth || !visited.insert(id.clone()) {
                continue;
            }
            if self.node(&id).is_none() {
                continue;
            }
            order.push(id.clone());
            for upstream_id in self.upstream(&id) {
                if !visited.contains(&upstream_id) {
                    queue.push_back((upstream_id, depth + 1));
                }
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_graph() -> Graph {
        Graph::from_document(&json!({
            "1": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": "sd15.safetensors"}},
            "2": {"class_type": "CLIPTextEncode", "inputs": {"text": "a cat", "clip": ["1", 1]}},
            "3": {"class_type": "KSampler", "inputs": {"model": ["1", 0], "positive": ["2", 0], "seed": 9}},
            "4": {"class_type": "SaveImage", "inputs": {"images": ["3", 0]}},
        }))
    }

    #[test]
    fn test_build_and_adjacency() {
        let graph = sample_graph();
        assert_eq!(graph.node_count(), 4);

        let mut upstream = graph.upstream("3");
        upstream.sort();
        assert_eq!(upstream, vec!["1", "2"]);
        assert_eq!(graph.downstream("3"), vec!["4"]);
        assert!(graph.upstream("1").is_empty());
    }

    #[test]
    fn test_invalid_documents_build_empty() {
        assert!(Graph::from_document(&json!("nope")).is_empty());
        assert!(Graph::from_document(&json!({"a": 3})).is_empty());
        assert!(Graph::from_document(&json!(null)).is_empty());
    }

    #[test]
    fn test_dangling_links_produce_no_edges() {
        let graph = Graph::from_document(&json!({
            "1": {"class_type": "KSampler", "inputs": {"model": ["99", 0]}},
        }));
        assert_eq!(graph.node_count(), 1);
        assert!(graph.upstream("1").is_empty());
    }

    #[test]
    fn test_input_value_classification() {
        assert_eq!(
            InputValue::from(&json!(["5", 0])).as_link(),
            Some("5")
        );
        assert_eq!(
            InputValue::from(&json!([[7, 2], [8, 0]])).as_link(),
            Some("7")
        );
        assert_eq!(InputValue::from(&json!("hello")).as_link(), None);
        assert_eq!(
            InputValue::from(&json!("5")).link_target(),
            Some("5".to_string())
        );
        assert_eq!(InputValue::from(&json!(5)).link_target(), Some("5".to_string()));
        assert_eq!(InputValue::from(&json!(1.5)).link_target(), None);
    }

    #[test]
    fn test_nodes_with_role() {
        let graph = sample_graph();
        let registry = RoleRegistry::new();
        assert_eq!(graph.nodes_with_role(&registry, Role::Sampler), vec!["3"]);
        assert_eq!(
            graph.nodes_with_role(&registry, Role::CheckpointLoader),
            vec!["1"]
        );
    }

    #[test]
    fn test_trace_upstream_order_and_cycles() {
        let graph = sample_graph();
        let order = graph.trace_upstream(&["4"], MAX_TRAVERSAL_DEPTH);
        assert_eq!(order[0], "4");
        assert_eq!(order[1], "3");
        assert_eq!(order.len(), 4);

        // A -> B -> A cycle terminates.
        let cyclic = Graph::from_document(&json!({
            "a": {"class_type": "Reroute", "inputs": {"value": ["b", 0]}},
            "b": {"class_type": "Reroute", "inputs": {"value": ["a", 0]}},
        }));
        let order = cyclic.trace_upstream(&["a"], MAX_TRAVERSAL_DEPTH);
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_title_from_meta() {
        let graph = Graph::from_document(&json!({
            "2": {
                "class_type": "CLIPTextEncode",
                "inputs": {"text": "low quality"},
                "_meta": {"title": "Negative Prompt"},
            },
        }));
        assert_eq!(graph.node("2").unwrap().title_lower(), "negative prompt");
    }

    #[test]
    fn test_depth_bound_limits_traversal() {
        // Chain of 6 reroutes; depth 3 stops early.
        let mut doc = Map::new();
        for i in 0..6 {
            doc.insert(
                i.to_string(),
                json!({"class_type": "Reroute", "inputs": {"value": [(i + 1).to_string(), 0]}}),
            );
        }
        doc.insert("6".to_string(), json!({"class_type": "KSampler", "inputs": {}}));

        let graph = Graph::from_prompt_graph(&doc);
        let order = graph.trace_upstream(&["0"], 3);
        assert_eq!(order.len(), 4);
    }
}
