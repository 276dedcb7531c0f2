// Uninformed traversals: breadth-first, depth-first, and the depth- and cost-limited forms of
// depth-first search used when a vehicle's range bounds how far it may go.
use std::collections::{HashMap, HashSet, VecDeque};

use super::city_graph::{CityGraph, CostMetric};
use super::search::{reconstruct_path, SearchOutcome, SearchResult};


pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Fewest edges.  Nodes are marked when enqueued, so each is queued at most once.
pub fn bfs(graph: &CityGraph, origin: usize, destination: usize, metric: CostMetric)
           -> SearchResult {
    let mut queued = HashSet::new();
    let mut predecessors = HashMap::new();
    let mut to_visit = VecDeque::new();
    let mut nodes_expanded = 0;

    queued.insert(origin);
    to_visit.push_back(origin);
    while let Some(node) = to_visit.pop_front() {
        nodes_expanded += 1;
        for (next, _) in graph.neighbors(node) {
            if !queued.insert(next) {
                continue;
            }
            predecessors.insert(next, node);
            if next == destination {
                let path = reconstruct_path(&predecessors, origin, destination);
                return SearchResult::found(graph, path, nodes_expanded, metric);
            }
            to_visit.push_back(next);
        }
    }
    SearchResult::failed(SearchOutcome::NoPath, vec![], nodes_expanded, metric)
}

/// Stack-based depth-first search.  Neighbours are explored in adjacency order.
pub fn dfs(graph: &CityGraph, origin: usize, destination: usize, metric: CostMetric)
           -> SearchResult {
    let mut visited = HashSet::new();
    let mut predecessors = HashMap::new();
    let mut stack: Vec<(usize, Option<usize>)> = vec![(origin, None)];
    let mut nodes_expanded = 0;

    while let Some((node, parent)) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }
        if let Some(parent) = parent {
            predecessors.insert(node, parent);
        }
        if node == destination {
            let path = reconstruct_path(&predecessors, origin, destination);
            return SearchResult::found(graph, path, nodes_expanded, metric);
        }
        nodes_expanded += 1;

        // push in reverse so the first neighbour is popped first
        let neighbors: Vec<usize> = graph.neighbors(node).map(|(next, _)| next).collect();
        for next in neighbors.into_iter().rev() {
            if !visited.contains(&next) {
                stack.push((next, Some(node)));
            }
        }
    }
    SearchResult::failed(SearchOutcome::NoPath, vec![], nodes_expanded, metric)
}

/// Depth-limited DFS with limits 0, 1, ..., `max_depth`.  Finds a path with the fewest edges,
/// using memory proportional to the depth.
pub fn dfs_iterative_deepening(graph: &CityGraph, origin: usize, destination: usize,
                               metric: CostMetric, max_depth: usize) -> SearchResult {
    let mut nodes_expanded = 0;
    for limit in 0..=max_depth {
        let mut path = vec![origin];
        let mut on_path = HashSet::new();
        on_path.insert(origin);
        let found = depth_limited(graph, destination, limit, &mut path, &mut on_path,
                                  &mut nodes_expanded);
        if found {
            return SearchResult::found(graph, path, nodes_expanded, metric);
        }
    }
    SearchResult::failed(SearchOutcome::NoPath, vec![], nodes_expanded, metric)
}

fn depth_limited(graph: &CityGraph, destination: usize, limit: usize, path: &mut Vec<usize>,
                 on_path: &mut HashSet<usize>, nodes_expanded: &mut usize) -> bool {
    let node = match path.last() {
        Some(node) => *node,
        None => return false,
    };
    if node == destination {
        return true;
    }
    if limit == 0 {
        return false;
    }
    *nodes_expanded += 1;
    let neighbors: Vec<usize> = graph.neighbors(node).map(|(next, _)| next).collect();
    for next in neighbors {
        if on_path.contains(&next) {
            continue;
        }
        path.push(next);
        on_path.insert(next);
        if depth_limited(graph, destination, limit - 1, path, on_path, nodes_expanded) {
            return true;
        }
        on_path.remove(&next);
        path.pop();
    }
    false
}

/// DFS that abandons any branch whose accumulated cost exceeds `max_cost`, eg. the remaining
/// range of a vehicle.  Returns the first path found within budget, which need not be the
/// cheapest.
pub fn dfs_cost_bounded(graph: &CityGraph, origin: usize, destination: usize,
                        metric: CostMetric, max_cost: f64) -> SearchResult {
    // the cheapest cost at which each node has been reached so far; reaching it again at
    // equal or higher cost can't lead anywhere new.
    let mut best_cost: HashMap<usize, f64> = HashMap::new();
    let mut stack = vec![(vec![origin], 0.0)];
    let mut nodes_expanded = 0;

    while let Some((path, cost)) = stack.pop() {
        let node = match path.last() {
            Some(node) => *node,
            None => continue,
        };
        if let Some(prev_cost) = best_cost.get(&node) {
            if *prev_cost <= cost {
                continue;
            }
        }
        best_cost.insert(node, cost);
        if node == destination {
            return SearchResult::found(graph, path, nodes_expanded, metric);
        }
        nodes_expanded += 1;

        let neighbors: Vec<(usize, f64)> = graph.neighbors(node)
            .map(|(next, segment)| (next, segment.cost(metric))).collect();
        for (next, edge_cost) in neighbors.into_iter().rev() {
            let next_cost = cost + edge_cost;
            if next_cost > max_cost || path.contains(&next) {
                continue;
            }
            let mut next_path = path.clone();
            next_path.push(next);
            stack.push((next_path, next_cost));
        }
    }
    SearchResult::failed(SearchOutcome::NoPath, vec![], nodes_expanded, metric)
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::super::test_utils::{detour_city, square_city};
    use approx::assert_relative_eq;

    fn ids(graph: &CityGraph, path: &[usize]) -> Vec<String> {
        path.iter().map(|idx| String::from(graph.get_node_id_by_idx(*idx).unwrap())).collect()
    }

    fn sg(graph: &CityGraph) -> (usize, usize) {
        (graph.resolve("S").unwrap(), graph.resolve("G").unwrap())
    }

    #[test]
    fn test_bfs_min_hops() {
        let graph = detour_city();
        let (ss, gg) = sg(&graph);
        let result = bfs(&graph, ss, gg, CostMetric::Distance);
        assert!(result.success());
        // one hop, even though it's the longest road
        assert_eq!(ids(&graph, &result.path), vec!["S", "G"]);
        assert_relative_eq!(result.total_cost, 30.0);
    }

    #[test]
    fn test_dfs_adjacency_order() {
        let graph = detour_city();
        let (ss, gg) = sg(&graph);
        let result = dfs(&graph, ss, gg, CostMetric::Distance);
        assert!(result.success());
        assert_eq!(ids(&graph, &result.path), vec!["S", "X", "G"]);
        assert_relative_eq!(result.total_cost, 40.0);
    }

    #[test]
    fn test_iterative_deepening() {
        let graph = square_city();
        let aa = graph.resolve("A").unwrap();
        let cc = graph.resolve("C").unwrap();
        let result = dfs_iterative_deepening(&graph, aa, cc, CostMetric::Distance,
                                             DEFAULT_MAX_DEPTH);
        assert!(result.success());
        assert_eq!(result.path.len(), 3);

        let result = dfs_iterative_deepening(&graph, aa, cc, CostMetric::Distance, 1);
        assert!(!result.success());
    }

    #[test]
    fn test_cost_bounded() {
        let graph = detour_city();
        let (ss, gg) = sg(&graph);
        // only S-Y-G fits within 20 km
        let result = dfs_cost_bounded(&graph, ss, gg, CostMetric::Distance, 20.0);
        assert!(result.success());
        assert_eq!(ids(&graph, &result.path), vec!["S", "Y", "G"]);
        assert!(result.total_cost <= 20.0);

        let result = dfs_cost_bounded(&graph, ss, gg, CostMetric::Distance, 10.0);
        assert!(!result.success());
        assert_eq!(result.outcome, SearchOutcome::NoPath);
    }
}
