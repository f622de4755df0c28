//! Cycle detection for the module dependency graph
//!
//! The module graph must be a DAG. Before the resolver admits a new
//! edge it checks whether the dependee can already reach the dependent;
//! if so the edge would close a cycle and the import is rejected with
//! E5004 before any recursive load can diverge.

use std::collections::{BTreeMap, BTreeSet};

/// Visit state for the DFS walk
#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Completed,
}

/// Returns the cycle path `from -> to -> ... -> from` that adding the
/// edge `from -> to` would create, or `None` when the edge is safe.
pub fn edge_creates_cycle(
    edges: &BTreeMap<String, BTreeSet<String>>,
    from: &str,
    to: &str,
) -> Option<Vec<String>> {
    if from == to {
        return Some(vec![from.to_string(), to.to_string()]);
    }

    let mut state: BTreeMap<&str, VisitState> = BTreeMap::new();
    let mut path: Vec<&str> = Vec::new();
    if visit(edges, to, from, &mut state, &mut path) {
        let mut cycle = vec![from.to_string(), to.to_string()];
        // `path` holds the walk from `to` to `from`, minus its endpoints.
        cycle.extend(path.iter().skip(1).map(|s| s.to_string()));
        cycle.push(from.to_string());
        cycle.dedup();
        return Some(cycle);
    }
    None
}

fn visit<'a>(
    edges: &'a BTreeMap<String, BTreeSet<String>>,
    node: &'a str,
    target: &str,
    state: &mut BTreeMap<&'a str, VisitState>,
    path: &mut Vec<&'a str>,
) -> bool {
    if node == target {
        return true;
    }
    match state.get(node) {
        Some(VisitState::InProgress) | Some(VisitState::Completed) => return false,
        None => {}
    }
    state.insert(node, VisitState::InProgress);
    path.push(node);

    if let Some(next) = edges.get(node) {
        for dep in next {
            if visit(edges, dep, target, state, path) {
                return true;
            }
        }
    }

    path.pop();
    state.insert(node, VisitState::Completed);
    false
}

/// Render a cycle as `a -> b -> a` for diagnostics.
pub fn render_cycle(cycle: &[String]) -> String {
    cycle.join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(&str, &str)]) -> BTreeMap<String, BTreeSet<String>> {
        let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (from, to) in pairs {
            map.entry(from.to_string())
                .or_default()
                .insert(to.to_string());
        }
        map
    }

    #[test]
    fn no_cycle_in_a_chain() {
        let e = edges(&[("a", "b"), ("b", "c")]);
        assert!(edge_creates_cycle(&e, "a", "c").is_none());
    }

    #[test]
    fn two_node_cycle_detected() {
        let e = edges(&[("a", "b")]);
        let cycle = edge_creates_cycle(&e, "b", "a").expect("cycle expected");
        assert_eq!(render_cycle(&cycle), "b -> a -> b");
    }

    #[test]
    fn three_node_cycle_detected() {
        let e = edges(&[("a", "b"), ("b", "c")]);
        let cycle = edge_creates_cycle(&e, "c", "a").expect("cycle expected");
        assert_eq!(cycle.first().map(String::as_str), Some("c"));
        assert_eq!(cycle.last().map(String::as_str), Some("c"));
    }

    #[test]
    fn self_import_is_a_cycle() {
        let e = edges(&[]);
        assert!(edge_creates_cycle(&e, "a", "a").is_some());
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        // a -> b, a -> c, b -> d, c -> d
        let e = edges(&[("a", "b"), ("a", "c"), ("b", "d")]);
        assert!(edge_creates_cycle(&e, "c", "d").is_none());
    }
}
