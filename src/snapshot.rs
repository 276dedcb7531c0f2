use std::collections::BTreeMap;

use serde::Serialize;

use super::geometry::Point2d;
use super::request::{Priority, RequestState};
use super::simulation::SimCounters;
use super::state::SimulationState;
use super::station::{Station, StationStats};
use super::vehicle::{Propulsion, VehicleCategory, VehicleState};


#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VehicleView {
    pub id: usize,
    pub label: String,
    pub node: String,
    pub position: Point2d,
    pub category: VehicleCategory,
    pub propulsion: Propulsion,
    pub state: VehicleState,
    pub range_fraction: f64,
    pub occupied: bool,
    pub route: Vec<String>,
    pub passengers: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestView {
    pub id: String,
    pub origin: String,
    pub destination: String,
    pub priority: Priority,
    pub passengers: u32,
    pub remaining_wait_min: f64,
}

/// A read-only picture of the simulation at one instant, for display.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    pub clock_min: u32,
    pub vehicles: Vec<VehicleView>,
    pub pending_requests: Vec<RequestView>,
}

impl Snapshot {
    pub fn from_state(state: &SimulationState) -> Snapshot {
        let graph = state.get_graph();
        let node_id = |idx: usize| String::from(graph.get_node_id_by_idx(idx).unwrap_or("?"));
        let now_min = state.get_clock_min();

        let vehicles = state.vehicles().map(|vehicle| VehicleView {
            id: vehicle.id.0,
            label: vehicle.label.clone(),
            node: node_id(vehicle.get_location()),
            position: vehicle.position(graph),
            category: vehicle.kind.category,
            propulsion: vehicle.kind.propulsion,
            state: vehicle.get_state(),
            range_fraction: vehicle.range_fraction(),
            occupied: vehicle.is_occupied(),
            route: vehicle.get_remaining_route().iter().map(|idx| node_id(*idx)).collect(),
            passengers: vehicle.get_passengers(),
        }).collect();

        let pending_requests = state.pending().map(|request| RequestView {
            id: request.id.to_string(),
            origin: node_id(request.origin),
            destination: node_id(request.destination),
            priority: request.get_priority(),
            passengers: request.passengers,
            remaining_wait_min: request.remaining_wait_min(now_min),
        }).collect();

        Snapshot {clock_min: now_min, vehicles, pending_requests}
    }
}


fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { 100.0 * part / whole } else { 0.0 }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Aggregate performance of the fleet so far.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FleetMetrics {
    pub clock_min: u32,

    pub total_vehicles: usize,
    pub available_vehicles: usize,
    pub serving_vehicles: usize,
    pub at_station_vehicles: usize,
    pub out_of_service_vehicles: usize,
    pub electric_vehicles: usize,
    pub combustion_vehicles: usize,
    pub mean_range_fraction: f64,
    pub occupancy_pct: f64,

    pub total_requests: usize,
    pub pending_requests: usize,
    pub active_requests: usize,
    pub finished_requests: usize,
    pub completed_requests: usize,
    pub success_pct: f64,
    pub counters: SimCounters,

    pub mean_wait_min: f64,
    pub mean_satisfaction: f64,
    pub km_total: f64,
    pub km_with_passengers: f64,
    pub km_empty: f64,
    pub fleet_efficiency_pct: f64,

    pub revenue: f64,
    pub operating_cost: f64,
    pub energy_cost: f64,
    pub profit: f64,
    pub co2_kg: f64,

    pub stations: BTreeMap<String, StationStats>,
}

impl FleetMetrics {
    pub fn compute(state: &SimulationState, counters: &SimCounters,
                   stations: &BTreeMap<usize, Station>) -> FleetMetrics {
        let mut metrics = FleetMetrics::default();
        metrics.clock_min = state.get_clock_min();
        metrics.counters = counters.clone();

        let mut range_fractions = vec![];
        for vehicle in state.vehicles() {
            metrics.total_vehicles += 1;
            match vehicle.get_state() {
                VehicleState::Available => metrics.available_vehicles += 1,
                VehicleState::EnRouteToPickup | VehicleState::InService =>
                    metrics.serving_vehicles += 1,
                VehicleState::OutOfService => metrics.out_of_service_vehicles += 1,
                _ => metrics.at_station_vehicles += 1,
            }
            match vehicle.kind.propulsion {
                Propulsion::Electric => metrics.electric_vehicles += 1,
                Propulsion::Combustion => metrics.combustion_vehicles += 1,
            }
            range_fractions.push(vehicle.range_fraction());
            metrics.km_total += vehicle.counters.km_total;
            metrics.km_with_passengers += vehicle.counters.km_with_passengers;
            metrics.revenue += vehicle.counters.revenue;
            metrics.operating_cost += vehicle.counters.cost;
            metrics.co2_kg += vehicle.counters.emissions_g / 1000.0;
        }
        metrics.mean_range_fraction = mean(&range_fractions);
        metrics.occupancy_pct = percent((metrics.total_vehicles - metrics.available_vehicles) as f64,
                                        metrics.total_vehicles as f64);
        metrics.km_empty = metrics.km_total - metrics.km_with_passengers;
        metrics.fleet_efficiency_pct = percent(metrics.km_with_passengers, metrics.km_total);

        metrics.pending_requests = state.get_num_pending();
        metrics.active_requests = state.active().count();
        let mut waits = vec![];
        let mut satisfactions = vec![];
        for request in state.finished() {
            metrics.finished_requests += 1;
            if request.get_state() == RequestState::Completed {
                metrics.completed_requests += 1;
                waits.extend(request.pickup_wait_min());
                satisfactions.extend(request.get_satisfaction());
            }
        }
        metrics.total_requests = metrics.pending_requests + metrics.active_requests +
                                 metrics.finished_requests;
        metrics.success_pct = percent(metrics.completed_requests as f64,
                                      metrics.finished_requests as f64);
        metrics.mean_wait_min = mean(&waits);
        metrics.mean_satisfaction = mean(&satisfactions);

        let graph = state.get_graph();
        for (node, station) in stations {
            metrics.energy_cost += station.get_stats().energy_billed;
            let name = graph.get_node_id_by_idx(*node).map(String::from)
                            .unwrap_or_else(|| format!("#{}", node));
            metrics.stations.insert(name, station.get_stats().clone());
        }
        metrics.profit = metrics.revenue - metrics.operating_cost;
        metrics
    }
}
