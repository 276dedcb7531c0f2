// Chooses which vehicle to send to which request.  The planner runs a best-first search over
// simulation states, where each step commits one vehicle to one request, and returns the
// most promising sequence of assignments it finds within its expansion budget.
use std::cmp::Ordering;

use priority_queue::PriorityQueue;

use super::city_graph::{CityGraph, Zone};
use super::request::{dispatch_order, EnvPreference, Request, RequestId};
use super::state::SimulationState;
use super::vehicle::{Propulsion, Vehicle, VehicleId, VehicleState};
use super::SimConfig;


/// Waiting time, in minutes, that doubles a request's urgency.
const URGENCY_WAIT_SCALE_MIN: f64 = 30.0;

/// Cost terms of the planner's heuristic.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannerPenalties {
    pub electric_only: f64,
    pub prefers_electric: f64,
    pub zone: f64,
    // the zone penalty applies while fewer than this fraction of the fleet is downtown
    pub center_balance_fraction: f64,
    pub no_vehicle: f64,
    pub unserved_request: f64,
    pub fallback_cost_per_km: f64,
}

impl Default for PlannerPenalties {
    fn default() -> Self {
        PlannerPenalties {
            electric_only: 1000.0,
            prefers_electric: 100.0,
            zone: 200.0,
            center_balance_fraction: 0.5,
            no_vehicle: 10000.0,
            unserved_request: 500.0,
            fallback_cost_per_km: 0.20,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Assignment {
    pub vehicle: VehicleId,
    pub request: RequestId,
    // straight-line estimates
    pub pickup_km: f64,
    pub trip_km: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Plan {
    pub assignments: Vec<Assignment>,
    pub f_score: f64,
    pub nodes_expanded: usize,
    /// True if the plan leaves no request pending.
    pub reached_goal: bool,
}

impl Plan {
    /// The assignment to carry out now.
    pub fn first(&self) -> Option<&Assignment> {
        self.assignments.first()
    }
}

/// Every assignment that could be made right now, in dispatch order of the requests.
pub fn feasible_assignments<CC: SimConfig>(state: &SimulationState, cfg: &CC)
                                           -> Vec<Assignment> {
    let graph = state.get_graph();
    let now_min = state.get_clock_min();
    let mut requests: Vec<&Request> = state.pending().collect();
    requests.sort_by(|r1, r2| dispatch_order(r1, r2));

    let mut assignments = vec![];
    for request in requests {
        let elapsed = request.elapsed_min(now_min);
        if elapsed >= request.max_wait_min {
            continue;
        }
        let trip_km = graph.euclidean(request.origin, request.destination);
        for vehicle in state.vehicles() {
            if !vehicle.is_available() ||
               vehicle.needs_recharge(cfg.get_critical_range_threshold()) {
                continue;
            }
            if !vehicle.can_carry(request.passengers) || !request.accepts_vehicle(&vehicle.kind) {
                continue;
            }
            let pickup_km = graph.euclidean(vehicle.get_location(), request.origin);
            if elapsed + cfg.dist_to_drive_time(pickup_km) > request.max_wait_min {
                continue;
            }
            if !vehicle.can_cover(pickup_km + trip_km, cfg.get_range_safety_margin()) {
                continue;
            }
            assignments.push(Assignment {
                vehicle: vehicle.id,
                request: request.id,
                pickup_km,
                trip_km,
            });
        }
    }
    assignments
}

/// Straight-line distance from a node to the closest station serving the propulsion.  Zero
/// if the city has no such station, since there's nothing to reserve range for.
fn nearest_station_km(graph: &CityGraph, from_idx: usize, propulsion: Propulsion) -> f64 {
    let nearest = graph.station_nodes(propulsion).into_iter()
        .map(|station| graph.euclidean(from_idx, station))
        .fold(f64::INFINITY, f64::min);
    if nearest.is_finite() { nearest } else { 0.0 }
}

fn zone_of(graph: &CityGraph, idx: usize) -> Zone {
    graph.get_node(idx).map(|node| node.zone).unwrap_or_default()
}

/// Estimated cost of serving every request still pending, each by its cheapest compatible
/// available vehicle.
pub fn estimate_remaining_cost<CC: SimConfig>(state: &SimulationState, cfg: &CC) -> f64 {
    let penalties = cfg.get_penalties();
    let graph = state.get_graph();
    let now_min = state.get_clock_min();
    let num_pending = state.get_num_pending();
    if num_pending == 0 {
        return 0.0;
    }
    let available: Vec<&Vehicle> = state.vehicles().filter(|vv| vv.is_available()).collect();
    if available.is_empty() {
        return penalties.no_vehicle * num_pending as f64;
    }

    let in_fleet: Vec<&Vehicle> = state.vehicles()
        .filter(|vv| vv.get_state() != VehicleState::OutOfService)
        .collect();
    let num_in_center = in_fleet.iter()
        .filter(|vv| zone_of(graph, vv.get_location()) == Zone::Center)
        .count();
    let center_short = (num_in_center as f64) <
                       in_fleet.len() as f64 * penalties.center_balance_fraction;

    let mut total = 0.0;
    for request in state.pending() {
        let wait = request.elapsed_min(now_min);
        let urgency = (1.0 + wait / URGENCY_WAIT_SCALE_MIN) *
                      request.get_priority().urgency_multiplier();
        let trip_km = graph.euclidean(request.origin, request.destination);
        let leaves_center = zone_of(graph, request.destination) == Zone::Periphery;
        let electric_reserve = nearest_station_km(graph, request.destination,
                                                  Propulsion::Electric);
        let fuel_reserve = nearest_station_km(graph, request.destination,
                                              Propulsion::Combustion);

        let mut best = f64::INFINITY;
        for vehicle in &available {
            if !vehicle.can_carry(request.passengers) {
                continue;
            }
            let reserve = match vehicle.kind.propulsion {
                Propulsion::Electric => electric_reserve,
                Propulsion::Combustion => fuel_reserve,
            };
            let pickup_km = graph.euclidean(vehicle.get_location(), request.origin);
            if !vehicle.can_cover(pickup_km + trip_km + reserve, cfg.get_range_safety_margin()) {
                continue;
            }

            let base_cost = (pickup_km + trip_km) * vehicle.kind.cost_per_km();
            let preference_penalty = match request.preference {
                EnvPreference::ElectricOnly if !vehicle.kind.is_electric() =>
                    penalties.electric_only,
                EnvPreference::PrefersElectric if !vehicle.kind.is_electric() =>
                    penalties.prefers_electric,
                _ => 0.0,
            };
            let zone_penalty = if center_short && leaves_center &&
                                  zone_of(graph, vehicle.get_location()) == Zone::Center {
                penalties.zone
            } else {
                0.0
            };
            let cost = base_cost * urgency + preference_penalty + zone_penalty;
            if cost < best {
                best = cost;
            }
        }

        if best.is_infinite() {
            best = trip_km * penalties.fallback_cost_per_km * urgency +
                   penalties.unserved_request;
        }
        total += best;
    }
    total
}


struct PlanNode {
    state: SimulationState,
    g_score: f64,
    assignments: Vec<Assignment>,
}

/// Frontier priority: lowest f first, then earliest inserted.
#[derive(Clone, Copy, Debug)]
struct PlanPriority {
    f_score: f64,
    seq: usize,
}

impl Ord for PlanPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed, so the max-first priority queue pops the cheapest node
        if self.f_score < other.f_score {
            return Ordering::Greater;
        } else if self.f_score > other.f_score {
            return Ordering::Less;
        } else {
            return other.seq.cmp(&self.seq);
        }
    }
}

impl PartialOrd for PlanPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        return Some(self.cmp(other));
    }
}

impl PartialEq for PlanPriority {
    fn eq(&self, other: &Self) -> bool {
        return self.cmp(other) == Ordering::Equal;
    }
}

impl Eq for PlanPriority {}

fn to_plan(node: &PlanNode, f_score: f64, nodes_expanded: usize) -> Plan {
    Plan {
        assignments: node.assignments.clone(),
        f_score,
        nodes_expanded,
        reached_goal: node.state.get_num_pending() == 0,
    }
}

/// Searches for the best sequence of assignments from `state`.  Returns None only when no
/// assignment is feasible right now; otherwise the cheapest goal found, or failing that the
/// most promising partial plan.
pub fn plan_assignments<CC: SimConfig>(state: &SimulationState, cfg: &CC) -> Option<Plan> {
    let root_actions = feasible_assignments(state, cfg);
    if root_actions.is_empty() {
        return None;
    }

    // nodes live in an arena; the queue holds indices into it
    let mut arena = vec![PlanNode {state: state.clone(), g_score: 0.0, assignments: vec![]}];
    let mut frontier = PriorityQueue::new();
    let root_f = estimate_remaining_cost(state, cfg);
    frontier.push(0, PlanPriority {f_score: root_f, seq: 0});

    let mut best: Option<(usize, f64)> = None;
    let mut nodes_expanded = 0;
    let max_iterations = cfg.get_planner_max_iterations().max(1);

    while let Some((node_idx, priority)) = frontier.pop() {
        let node = &arena[node_idx];
        if node_idx != 0 && node.state.get_num_pending() == 0 {
            log::debug!("planner reached a goal after {} expansions", nodes_expanded);
            return Some(to_plan(node, priority.f_score, nodes_expanded));
        }
        if node_idx != 0 {
            match best {
                Some((_, best_f)) if best_f <= priority.f_score => (),
                _ => best = Some((node_idx, priority.f_score)),
            }
        }
        if nodes_expanded >= max_iterations {
            log::debug!("planner hit its cap of {} expansions", max_iterations);
            break;
        }
        nodes_expanded += 1;

        let actions = if node_idx == 0 {
            root_actions.clone()
        } else {
            feasible_assignments(&node.state, cfg)
        };
        let g_score = node.g_score;
        let mut children = vec![];
        for action in actions {
            let mut child_state = arena[node_idx].state.clone();
            if let Err(err) = child_state.assign(action.vehicle, action.request) {
                log::debug!("skipping infeasible branch: {}", err);
                continue;
            }
            let child_g = g_score + action.pickup_km + action.trip_km;
            let child_f = child_g + estimate_remaining_cost(&child_state, cfg);
            let mut child_assignments = arena[node_idx].assignments.clone();
            child_assignments.push(action);
            children.push((PlanNode {state: child_state, g_score: child_g,
                                     assignments: child_assignments}, child_f));
        }
        for (child, child_f) in children {
            let child_idx = arena.len();
            arena.push(child);
            frontier.push(child_idx, PlanPriority {f_score: child_f, seq: child_idx});
        }
    }

    // the head of the frontier may be better than anything expanded so far
    if let Some((head_idx, head_priority)) = frontier.peek() {
        match best {
            Some((_, best_f)) if best_f <= head_priority.f_score => (),
            _ => best = Some((*head_idx, head_priority.f_score)),
        }
    }
    let (best_idx, best_f) = best?;
    Some(to_plan(&arena[best_idx], best_f, nodes_expanded))
}
