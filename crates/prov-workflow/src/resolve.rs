//! Indirection resolution.
//!
//! Graphs routinely interpose passthrough nodes between a consumer and the
//! node that actually produces a value: reroutes, and variable set/get pairs
//! that connect by name instead of by link. Resolution follows such chains
//! to the first concrete node. The terminal id is always returned, never an
//! error: an unresolvable or cyclic chain terminates at the last id seen.

use std::collections::HashSet;

use tracing::trace;

use crate::TRACING_TARGET;
use crate::graph::{Graph, InputValue, Node};
use crate::roles::{Role, RoleRegistry};

/// Input names a passthrough node may store its source under.
const VALUE_INPUTS: &[&str] = &["value", "input", "link"];
/// Input names a variable node may store its name under.
const VARIABLE_INPUTS: &[&str] = &["variable", "name", "key"];

/// Follows indirection nodes from `start_id` to a concrete node id.
///
/// A visited set plus `max_depth` bound the walk; hitting either returns
/// the current id. Matching a get-variable node scans the graph for the
/// set-variable node with the same name, which is O(n) per hop but bounded
/// by the same depth limit.
pub fn resolve(graph: &Graph, registry: &RoleRegistry, start_id: &str, max_depth: usize) -> String {
    let mut visited: HashSet<String> = HashSet::new();
    let mut current = start_id.to_string();
    let mut depth = 0;

    while depth < max_depth && visited.insert(current.clone()) {
        let Some(node) = graph.node(&current) else {
            // Dangling id: nothing more to follow.
            return current;
        };
        let class = node.type_name();

        let next = if registry.matches(Role::Reroute, &class) {
            follow_value(node)
        } else if registry.matches(Role::GetVariable, &class) {
            follow_variable(graph, registry, node)
        } else if registry.matches(Role::SetVariable, &class) {
            follow_value(node)
        } else {
            // Concrete node.
            return current;
        };

        match next {
            Some(next_id) => {
                trace!(target: TRACING_TARGET, from = %current, to = %next_id, "resolved hop");
                current = next_id;
                depth += 1;
            }
            None => return current,
        }
    }

    current
}

/// Follows a passthrough node's value-like input.
fn follow_value(node: &Node) -> Option<String> {
    node.first_input(VALUE_INPUTS).and_then(InputValue::link_target)
}

/// Jumps from a get-variable node to its matching set-variable's source.
fn follow_variable(graph: &Graph, registry: &RoleRegistry, node: &Node) -> Option<String> {
    let wanted = node.first_input(VARIABLE_INPUTS)?.as_str()?;

    graph
        .nodes()
        .filter(|candidate| registry.matches(Role::SetVariable, &candidate.type_name()))
        .find(|candidate| {
            candidate
                .first_input(VARIABLE_INPUTS)
                .and_then(InputValue::as_str)
                == Some(wanted)
        })
        .and_then(|setter| setter.first_input(&["value", "input"]))
        .and_then(InputValue::link_target)
}
