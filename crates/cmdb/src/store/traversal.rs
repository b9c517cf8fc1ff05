//! Graph traversal over relationship edges.
//!
//! Edges are followed in the source -> destination direction only.

use super::index::RelationshipTables;
use std::collections::{HashSet, VecDeque};

/// Breadth-first search from `start`, returning the ids first reached at
/// exactly `steps` hops, in discovery order.
///
/// A visited set keeps every id to its shortest distance, so cycles
/// terminate and an id reachable at several depths is reported only at the
/// smallest one. `steps == 0` yields nothing.
pub(crate) fn ids_at_distance(
    relationships: &RelationshipTables,
    start: &str,
    steps: usize,
) -> Vec<String> {
    if steps == 0 {
        return Vec::new();
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue = VecDeque::new();
    let mut result = Vec::new();

    visited.insert(start);
    queue.push_back((start, 0usize));

    while let Some((current, depth)) = queue.pop_front() {
        if depth == steps {
            result.push(current.to_string());
            continue;
        }

        for relationship in relationships.from_source(current) {
            let next = relationship.destination();
            if visited.insert(next) {
                queue.push_back((next, depth + 1));
            }
        }
    }

    result
}
