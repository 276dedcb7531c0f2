// Single-pair route search over the city graph.  Every strategy has the same signature, so
// the simulator can switch between them at runtime through `SearchStrategy`.
use std::collections::hash_map::Entry::{Occupied, Vacant};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::city_graph::{CityGraph, CostMetric, DEFAULT_SPEED_KMH};
use super::traversal;
use super::FleetError;


pub const HILL_CLIMBING_MAX_STEPS: usize = 1000;
/// Weighted A* inflates the heuristic by this much.  Its routes cost at most this many times
/// the cheapest one.
pub const HEURISTIC_WEIGHT: f64 = 1.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOutcome {
    Found,
    NoPath,
    StuckAtLocalOptimum,
    IterationLimit,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult {
    pub outcome: SearchOutcome,
    /// The route from origin to destination.  Empty when no path was found, except for hill
    /// climbing, which reports how far it got.
    pub path: Vec<usize>,
    pub total_cost: f64,
    pub nodes_expanded: usize,
    pub metric: CostMetric,
}

impl SearchResult {
    pub fn success(&self) -> bool {
        self.outcome == SearchOutcome::Found
    }

    pub(crate) fn found(graph: &CityGraph, path: Vec<usize>, nodes_expanded: usize,
                        metric: CostMetric) -> SearchResult {
        let total_cost = graph.path_cost(&path, metric).unwrap_or(f64::INFINITY);
        SearchResult {outcome: SearchOutcome::Found, path, total_cost, nodes_expanded, metric}
    }

    pub(crate) fn failed(outcome: SearchOutcome, path: Vec<usize>, nodes_expanded: usize,
                         metric: CostMetric) -> SearchResult {
        SearchResult {outcome, path, total_cost: f64::INFINITY, nodes_expanded, metric}
    }
}

pub type SearchFn = fn(&CityGraph, usize, usize, CostMetric) -> SearchResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    UniformCost,
    AStar,
    WeightedAStar,
    Greedy,
    HillClimbing,
    BreadthFirst,
    DepthFirst,
}

impl SearchStrategy {
    pub const ALL: [SearchStrategy; 7] = [
        SearchStrategy::UniformCost,
        SearchStrategy::AStar,
        SearchStrategy::WeightedAStar,
        SearchStrategy::Greedy,
        SearchStrategy::HillClimbing,
        SearchStrategy::BreadthFirst,
        SearchStrategy::DepthFirst,
    ];

    pub fn search_fn(&self) -> SearchFn {
        match self {
            SearchStrategy::UniformCost => uniform_cost,
            SearchStrategy::AStar => astar,
            SearchStrategy::WeightedAStar => weighted_astar,
            SearchStrategy::Greedy => greedy,
            SearchStrategy::HillClimbing => hill_climbing,
            SearchStrategy::BreadthFirst => traversal::bfs,
            SearchStrategy::DepthFirst => traversal::dfs,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SearchStrategy::UniformCost => "uniform_cost",
            SearchStrategy::AStar => "astar",
            SearchStrategy::WeightedAStar => "weighted_astar",
            SearchStrategy::Greedy => "greedy",
            SearchStrategy::HillClimbing => "hill_climbing",
            SearchStrategy::BreadthFirst => "bfs",
            SearchStrategy::DepthFirst => "dfs",
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, ff: &mut fmt::Formatter) -> fmt::Result {
        write!(ff, "{}", self.name())
    }
}

impl FromStr for SearchStrategy {
    type Err = FleetError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let name = name.trim().to_lowercase().replace(|cc: char| cc == '-' || cc == ' ', "_");
        match name.as_str() {
            "uniform_cost" | "ucs" | "dijkstra" => Ok(SearchStrategy::UniformCost),
            "astar" | "a*" | "a_star" => Ok(SearchStrategy::AStar),
            "weighted_astar" | "weighted_a*" | "weighted_a_star" =>
                Ok(SearchStrategy::WeightedAStar),
            "greedy" | "greedy_best_first" => Ok(SearchStrategy::Greedy),
            "hill_climbing" => Ok(SearchStrategy::HillClimbing),
            "bfs" | "breadth_first" => Ok(SearchStrategy::BreadthFirst),
            "dfs" | "depth_first" => Ok(SearchStrategy::DepthFirst),
            _ => Err(FleetError::UnknownStrategy(name)),
        }
    }
}

/// Checks the endpoints, then runs the strategy.  A route from a node to itself is free.
pub fn find_route(graph: &CityGraph, strategy: SearchStrategy, origin: usize,
                  destination: usize, metric: CostMetric) -> Result<SearchResult, FleetError> {
    for idx in &[origin, destination] {
        if !graph.contains_idx(*idx) {
            return Err(FleetError::UnknownNode(format!("#{}", idx)));
        }
    }
    if origin == destination {
        return Ok(SearchResult::found(graph, vec![origin], 0, metric));
    }
    let search = strategy.search_fn();
    Ok(search(graph, origin, destination, metric))
}

pub fn find_route_by_id(graph: &CityGraph, strategy: SearchStrategy, origin: &str,
                        destination: &str, metric: CostMetric)
                        -> Result<SearchResult, FleetError> {
    let orig_idx = graph.resolve(origin)?;
    let dest_idx = graph.resolve(destination)?;
    find_route(graph, strategy, orig_idx, dest_idx, metric)
}

/// Straight-line estimate of the remaining cost.  Under the time metric it's the time to
/// cover the straight line at the free-flow speed, which no congested road can beat.
pub fn heuristic(graph: &CityGraph, from_idx: usize, to_idx: usize, metric: CostMetric) -> f64 {
    let distance = graph.euclidean(from_idx, to_idx);
    match metric {
        CostMetric::Distance => distance,
        CostMetric::Time => distance / DEFAULT_SPEED_KMH * 60.0,
    }
}

/// Straight-line distance estimate for a vehicle with `range_km` left.  If the destination is
/// out of range, the estimate detours through the best of `stations`; with no station it is
/// infinite.
pub fn heuristic_with_range(graph: &CityGraph, from_idx: usize, to_idx: usize, range_km: f64,
                            stations: &[usize]) -> f64 {
    let direct = graph.euclidean(from_idx, to_idx);
    if range_km >= direct {
        return direct;
    }
    stations.iter()
        .map(|station| graph.euclidean(from_idx, *station) + graph.euclidean(*station, to_idx))
        .fold(f64::INFINITY, f64::min)
}


/// Min-heap entry.  The score is (priority, insertion counter), so equal priorities pop in
/// insertion order.
#[derive(Copy, Clone, Debug)]
pub struct MinScored<K, T>(pub K, pub T);

impl<K: PartialOrd, T> PartialEq for MinScored<K, T> {
    #[inline]
    fn eq(&self, other: &MinScored<K, T>) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: PartialOrd, T> Eq for MinScored<K, T> {}

impl<K: PartialOrd, T> PartialOrd for MinScored<K, T> {
    #[inline]
    fn partial_cmp(&self, other: &MinScored<K, T>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: PartialOrd, T> Ord for MinScored<K, T> {
    #[inline]
    fn cmp(&self, other: &MinScored<K, T>) -> Ordering {
        let a = &self.0;
        let b = &other.0;
        if a == b {
            Ordering::Equal
        } else if a < b {
            Ordering::Greater
        } else if a > b {
            Ordering::Less
        } else if a.ne(a) && b.ne(b) {
            // these are the NaN cases
            Ordering::Equal
        } else if a.ne(a) {
            // Order NaN less, so that it is last in the MinScore order
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum FrontierOrder {
    Cost,
    CostPlusHeuristic,
    CostPlusWeightedHeuristic,
    Heuristic,
}

/// Frontier ordered by accumulated cost.  Optimal for non-negative edge costs.
pub fn uniform_cost(graph: &CityGraph, origin: usize, destination: usize, metric: CostMetric)
                    -> SearchResult {
    best_first(graph, origin, destination, metric, FrontierOrder::Cost)
}

/// Frontier ordered by cost so far plus the straight-line heuristic.
pub fn astar(graph: &CityGraph, origin: usize, destination: usize, metric: CostMetric)
             -> SearchResult {
    best_first(graph, origin, destination, metric, FrontierOrder::CostPlusHeuristic)
}

/// A* with the heuristic scaled by `HEURISTIC_WEIGHT`: fewer expansions, bounded
/// sub-optimality.
pub fn weighted_astar(graph: &CityGraph, origin: usize, destination: usize, metric: CostMetric)
                      -> SearchResult {
    best_first(graph, origin, destination, metric, FrontierOrder::CostPlusWeightedHeuristic)
}

/// Frontier ordered by the heuristic alone.  Fast, but the path may be far from the cheapest.
pub fn greedy(graph: &CityGraph, origin: usize, destination: usize, metric: CostMetric)
              -> SearchResult {
    best_first(graph, origin, destination, metric, FrontierOrder::Heuristic)
}

fn best_first(graph: &CityGraph, origin: usize, destination: usize, metric: CostMetric,
              order: FrontierOrder) -> SearchResult {
    let priority = |gg: f64, node: usize| match order {
        FrontierOrder::Cost => gg,
        FrontierOrder::CostPlusHeuristic => gg + heuristic(graph, node, destination, metric),
        FrontierOrder::CostPlusWeightedHeuristic =>
            gg + HEURISTIC_WEIGHT * heuristic(graph, node, destination, metric),
        FrontierOrder::Heuristic => heuristic(graph, node, destination, metric),
    };

    let mut closed = HashSet::new();
    let mut scores = HashMap::new();
    let mut predecessors: HashMap<usize, usize> = HashMap::new();
    let mut visit_next = BinaryHeap::new();
    let mut counter: u64 = 0;
    let mut nodes_expanded = 0;

    scores.insert(origin, 0.0);
    visit_next.push(MinScored((priority(0.0, origin), counter), origin));
    while let Some(MinScored(_, node)) = visit_next.pop() {
        if closed.contains(&node) {
            continue;
        }
        if node == destination {
            let path = reconstruct_path(&predecessors, origin, destination);
            return SearchResult::found(graph, path, nodes_expanded, metric);
        }
        closed.insert(node);
        nodes_expanded += 1;

        let node_score = scores[&node];
        for (next, segment) in graph.neighbors(node) {
            if closed.contains(&next) {
                continue;
            }
            let next_score = node_score + segment.cost(metric);
            let improved = match scores.entry(next) {
                Occupied(ent) => {
                    // greedy search keeps the first route it found to a node
                    if order != FrontierOrder::Heuristic && next_score < *ent.get() {
                        *ent.into_mut() = next_score;
                        true
                    } else {
                        false
                    }
                }
                Vacant(ent) => {
                    ent.insert(next_score);
                    true
                }
            };
            if improved {
                predecessors.insert(next, node);
                counter += 1;
                visit_next.push(MinScored((priority(next_score, next), counter), next));
            }
        }
    }
    SearchResult::failed(SearchOutcome::NoPath, vec![], nodes_expanded, metric)
}

pub(crate) fn reconstruct_path(predecessors: &HashMap<usize, usize>, origin: usize,
                               destination: usize) -> Vec<usize> {
    let mut path = vec![destination];
    let mut node = destination;
    while node != origin {
        match predecessors.get(&node) {
            Some(prev) => {
                node = *prev;
                path.push(node);
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Always steps to the unvisited neighbour closest to the destination, as long as that is
/// closer than where it stands.  Never backtracks.
pub fn hill_climbing(graph: &CityGraph, origin: usize, destination: usize, metric: CostMetric)
                     -> SearchResult {
    let mut path = vec![origin];
    let mut visited = HashSet::new();
    visited.insert(origin);
    let mut current = origin;
    let mut nodes_expanded = 0;

    for _ in 0..HILL_CLIMBING_MAX_STEPS {
        if current == destination {
            return SearchResult::found(graph, path, nodes_expanded, metric);
        }
        nodes_expanded += 1;
        let current_h = heuristic(graph, current, destination, metric);
        let mut best: Option<(usize, f64)> = None;
        for (next, _) in graph.neighbors(current) {
            if visited.contains(&next) {
                continue;
            }
            let next_h = heuristic(graph, next, destination, metric);
            match best {
                Some((_, best_h)) if best_h <= next_h => (),
                _ => best = Some((next, next_h)),
            }
        }

        match best {
            Some((next, next_h)) if next_h < current_h => {
                visited.insert(next);
                path.push(next);
                current = next;
            }
            _ => {
                log::debug!("hill climbing stuck at {} after {} steps", current, nodes_expanded);
                return SearchResult::failed(SearchOutcome::StuckAtLocalOptimum, path,
                                            nodes_expanded, metric);
            }
        }
    }
    if current == destination {
        return SearchResult::found(graph, path, nodes_expanded, metric);
    }
    SearchResult::failed(SearchOutcome::IterationLimit, path, nodes_expanded, metric)
}
