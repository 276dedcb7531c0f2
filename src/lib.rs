// imports of other modules from this crate
mod error;
pub use error::FleetError;

mod geometry;
pub use geometry::Point2d;

mod config_utils;

mod city_graph;
pub use city_graph::{CityGraph, CityNode, CostMetric, GraphStats, NodeCategory, RoadSegment,
                     Zone, DEFAULT_SPEED_KMH};

mod vehicle;
pub use vehicle::{MoveOutcome, Propulsion, Vehicle, VehicleCategory, VehicleCounters,
                  VehicleId, VehicleKind, VehicleState};

mod request;
pub use request::{dispatch_order, DeadlineStatus, EnvPreference, Priority, Request, RequestId,
                  RequestState, ScheduledRequest};

mod station;
pub use station::{ServiceOutcome, ServiceSlot, Station, StationStats, StationStatus};

mod search;
pub use search::{find_route, find_route_by_id, heuristic, heuristic_with_range, SearchOutcome,
                 SearchResult, SearchStrategy, HEURISTIC_WEIGHT, HILL_CLIMBING_MAX_STEPS};

pub mod traversal;

mod state;
pub use state::SimulationState;

mod planner;
pub use planner::{estimate_remaining_cost, feasible_assignments, plan_assignments, Assignment,
                  Plan, PlannerPenalties};

mod sim_config;
pub use sim_config::{FleetEntry, FleetSimConfig, GraphSource};

mod snapshot;
pub use snapshot::{FleetMetrics, RequestView, Snapshot, VehicleView};

mod simulation;
pub use simulation::{SimCounters, Simulation, TICK_MINUTES};

#[cfg(test)]
mod test_utils;


/// Tunables shared by the planner and the engine.
pub trait SimConfig {
    fn get_avg_speed_kmh(&self) -> f64;
    fn get_range_safety_margin(&self) -> f64;
    fn get_critical_range_threshold(&self) -> f64;
    fn get_planner_max_iterations(&self) -> usize;
    fn get_electric_recovery_rate(&self) -> f64;
    fn get_combustion_recovery_rate(&self) -> f64;
    fn get_penalties(&self) -> &PlannerPenalties;

    /// Minutes to drive `distance` km at the average speed.
    fn dist_to_drive_time(&self, distance: f64) -> f64 {
        return distance / self.get_avg_speed_kmh() * 60.0;
    }
}
