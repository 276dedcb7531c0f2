use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::city_graph::CityGraph;
use super::geometry::Point2d;
use super::request::RequestId;
use super::FleetError;
use super::SimConfig;


/// Tolerance on range, time and edge progress, so float noise can't leave a vehicle a
/// hair short of a node.
const EPSILON: f64 = 1e-9;

/// Edges shorter or faster than this are floored, so a zero-length road can't stall movement.
const MIN_EDGE_COST: f64 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Propulsion {
    Electric,
    Combustion,
}

impl FromStr for Propulsion {
    type Err = FleetError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_lowercase().as_str() {
            "electric" => Ok(Propulsion::Electric),
            "combustion" => Ok(Propulsion::Combustion),
            _ => Err(FleetError::InvalidConfig(format!("unknown propulsion {}", name))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleCategory {
    Standard,
    Large,
}

impl FromStr for VehicleCategory {
    type Err = FleetError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_lowercase().as_str() {
            "standard" | "taxi" => Ok(VehicleCategory::Standard),
            "large" | "xl" => Ok(VehicleCategory::Large),
            _ => Err(FleetError::InvalidConfig(format!("unknown vehicle category {}", name))),
        }
    }
}

/// The variant of a vehicle.  All per-class constants hang off this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct VehicleKind {
    pub category: VehicleCategory,
    pub propulsion: Propulsion,
}

impl VehicleKind {
    pub fn new(category: VehicleCategory, propulsion: Propulsion) -> VehicleKind {
        VehicleKind {category, propulsion}
    }

    pub fn capacity(&self) -> u32 {
        match self.category {
            VehicleCategory::Standard => 4,
            VehicleCategory::Large => 6,
        }
    }

    /// Grams of CO2 per km.
    pub fn emission_factor(&self) -> f64 {
        match self.propulsion {
            Propulsion::Electric => 0.0,
            Propulsion::Combustion => 120.0,
        }
    }

    /// Operating cost in euros per km.
    pub fn cost_per_km(&self) -> f64 {
        match (self.category, self.propulsion) {
            (VehicleCategory::Standard, Propulsion::Electric) => 0.10,
            (VehicleCategory::Standard, Propulsion::Combustion) => 0.15,
            (VehicleCategory::Large, Propulsion::Electric) => 0.14,
            (VehicleCategory::Large, Propulsion::Combustion) => 0.20,
        }
    }

    pub fn default_max_range_km(&self) -> f64 {
        match (self.category, self.propulsion) {
            (VehicleCategory::Standard, Propulsion::Electric) => 250.0,
            (VehicleCategory::Standard, Propulsion::Combustion) => 400.0,
            (VehicleCategory::Large, Propulsion::Electric) => 200.0,
            (VehicleCategory::Large, Propulsion::Combustion) => 350.0,
        }
    }

    /// Km of range restored per minute at a station.
    pub fn recharge_rate<CC: SimConfig>(&self, cfg: &CC) -> f64 {
        match self.propulsion {
            Propulsion::Electric => cfg.get_electric_recovery_rate(),
            Propulsion::Combustion => cfg.get_combustion_recovery_rate(),
        }
    }

    pub fn class_label(&self) -> &'static str {
        match (self.category, self.propulsion) {
            (VehicleCategory::Standard, Propulsion::Electric) => "electric taxi",
            (VehicleCategory::Standard, Propulsion::Combustion) => "combustion taxi",
            (VehicleCategory::Large, Propulsion::Electric) => "electric xl",
            (VehicleCategory::Large, Propulsion::Combustion) => "combustion xl",
        }
    }

    /// Prefix of the display labels given to vehicles of this kind, eg. "T_E" for T_E1.
    pub fn label_prefix(&self) -> &'static str {
        match (self.category, self.propulsion) {
            (VehicleCategory::Standard, Propulsion::Electric) => "T_E",
            (VehicleCategory::Standard, Propulsion::Combustion) => "T_C",
            (VehicleCategory::Large, Propulsion::Electric) => "X_E",
            (VehicleCategory::Large, Propulsion::Combustion) => "X_C",
        }
    }

    pub fn is_electric(&self) -> bool {
        self.propulsion == Propulsion::Electric
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VehicleId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleState {
    Available,
    EnRouteToPickup,
    InService,
    EnRouteToStation,
    QueuedAtStation,
    Charging,
    Refueling,
    OutOfService,
}

impl fmt::Display for VehicleState {
    fn fmt(&self, ff: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            VehicleState::Available => "available",
            VehicleState::EnRouteToPickup => "en route to pickup",
            VehicleState::InService => "in service",
            VehicleState::EnRouteToStation => "en route to station",
            VehicleState::QueuedAtStation => "queued at station",
            VehicleState::Charging => "charging",
            VehicleState::Refueling => "refueling",
            VehicleState::OutOfService => "out of service",
        };
        write!(ff, "{}", text)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct VehicleCounters {
    pub km_total: f64,
    pub km_with_passengers: f64,
    pub trips: u32,
    pub revenue: f64,
    pub cost: f64,
    pub emissions_g: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveOutcome {
    pub distance_km: f64,
    pub arrived: bool,
    // ran out of range before reaching the end of the route
    pub stranded: bool,
}

#[derive(Clone, Debug)]
pub struct Vehicle {
    pub id: VehicleId,
    pub label: String,
    pub kind: VehicleKind,
    max_range_km: f64,
    range_km: f64,
    location: usize,
    state: VehicleState,
    // the route includes the node the vehicle set out from.
    route: Vec<usize>,
    next_route_idx: usize,
    edge_progress: f64,
    request: Option<RequestId>,
    passengers: u32,
    target_station: Option<usize>,
    pub counters: VehicleCounters,
}

impl Vehicle {
    pub fn new(id: VehicleId, label: &str, kind: VehicleKind, location: usize) -> Vehicle {
        let max_range_km = kind.default_max_range_km();
        Vehicle {
            id,
            label: String::from(label),
            kind,
            max_range_km,
            range_km: max_range_km,
            location,
            state: VehicleState::Available,
            route: vec![],
            next_route_idx: 0,
            edge_progress: 0.0,
            request: None,
            passengers: 0,
            target_station: None,
            counters: VehicleCounters::default(),
        }
    }

    pub fn get_location(&self) -> usize {
        self.location
    }

    pub fn get_state(&self) -> VehicleState {
        self.state
    }

    pub fn get_range_km(&self) -> f64 {
        self.range_km
    }

    pub fn get_max_range_km(&self) -> f64 {
        self.max_range_km
    }

    pub fn range_fraction(&self) -> f64 {
        if self.max_range_km <= 0.0 {
            return 0.0;
        }
        self.range_km / self.max_range_km
    }

    pub fn get_request(&self) -> Option<RequestId> {
        self.request
    }

    pub fn get_passengers(&self) -> u32 {
        self.passengers
    }

    pub fn get_target_station(&self) -> Option<usize> {
        self.target_station
    }

    /// The part of the route not yet completed, starting with the last node reached.
    pub fn get_remaining_route(&self) -> &[usize] {
        if self.route.is_empty() {
            return &[];
        }
        &self.route[self.next_route_idx - 1..]
    }

    pub fn get_edge_progress(&self) -> f64 {
        self.edge_progress
    }

    pub fn is_available(&self) -> bool {
        self.state == VehicleState::Available
    }

    pub fn is_occupied(&self) -> bool {
        self.state != VehicleState::Available
    }

    pub fn is_moving(&self) -> bool {
        match self.state {
            VehicleState::EnRouteToPickup | VehicleState::InService |
            VehicleState::EnRouteToStation => true,
            _ => false,
        }
    }

    pub fn can_carry(&self, passengers: u32) -> bool {
        passengers <= self.kind.capacity()
    }

    /// Whether the remaining range covers `distance_km` with the given safety margin.
    pub fn can_cover(&self, distance_km: f64, safety_margin: f64) -> bool {
        self.range_km >= distance_km * safety_margin
    }

    pub fn needs_recharge(&self, threshold: f64) -> bool {
        self.range_fraction() < threshold
    }

    /// Overrides the range.  The current range is clamped to [0, max].
    pub fn set_range(&mut self, max_range_km: f64, range_km: f64) {
        self.max_range_km = max_range_km.max(0.0);
        self.range_km = range_km.max(0.0).min(self.max_range_km);
    }

    /// Binds the vehicle to a request, heading for its pickup.
    pub fn assign(&mut self, request: RequestId, passengers: u32) {
        self.request = Some(request);
        self.passengers = passengers;
        self.state = VehicleState::EnRouteToPickup;
    }

    /// Called at pickup, with the route to the request's destination.
    pub fn begin_service(&mut self, route: Vec<usize>) {
        self.state = VehicleState::InService;
        self.set_route(route);
    }

    pub fn head_to_station(&mut self, station_node: usize, route: Vec<usize>) {
        self.target_station = Some(station_node);
        self.state = VehicleState::EnRouteToStation;
        self.set_route(route);
    }

    /// Starts a station session, or waits in the station's queue.
    pub fn arrive_at_station(&mut self, admitted: bool) {
        self.clear_route();
        self.state = if !admitted {
            VehicleState::QueuedAtStation
        } else if self.kind.is_electric() {
            VehicleState::Charging
        } else {
            VehicleState::Refueling
        };
    }

    /// Adds range while at a station.  Returns true once the vehicle is full.
    pub fn recover(&mut self, km: f64) -> bool {
        self.range_km = (self.range_km + km).min(self.max_range_km);
        return self.range_km >= self.max_range_km;
    }

    /// Records a finished trip.
    pub fn complete_trip(&mut self, fare: f64) {
        self.counters.trips += 1;
        self.counters.revenue += fare;
        self.release();
    }

    /// Drops whatever the vehicle was doing and makes it available where it stands.  Returns
    /// the request it was serving, if any.
    pub fn release(&mut self) -> Option<RequestId> {
        let request = self.request.take();
        self.passengers = 0;
        self.target_station = None;
        self.clear_route();
        self.state = VehicleState::Available;
        return request;
    }

    pub fn take_out_of_service(&mut self) -> Option<RequestId> {
        let request = self.release();
        self.state = VehicleState::OutOfService;
        return request;
    }

    pub fn set_route(&mut self, route: Vec<usize>) {
        self.route = route;
        self.next_route_idx = 1;
        self.edge_progress = 0.0;
    }

    fn clear_route(&mut self) {
        self.route.clear();
        self.next_route_idx = 0;
        self.edge_progress = 0.0;
    }

    pub fn has_arrived(&self) -> bool {
        self.next_route_idx >= self.route.len()
    }

    /// Moves the vehicle along its route for `minutes`, crossing at most `max_edges` edges.
    /// Partial progress along an edge carries over to the next call.
    pub fn advance(&mut self, graph: &CityGraph, minutes: f64, max_edges: usize) -> MoveOutcome {
        let mut outcome = MoveOutcome {distance_km: 0.0, arrived: false, stranded: false};
        if self.has_arrived() {
            outcome.arrived = true;
            return outcome;
        }

        let mut time_left = minutes;
        let mut num_edges = 0;
        while time_left > EPSILON && num_edges < max_edges {
            num_edges += 1;
            let from_idx = self.route[self.next_route_idx - 1];
            let to_idx = self.route[self.next_route_idx];
            let (edge_time, edge_dist) = match graph.segment(from_idx, to_idx) {
                Some(segment) => (segment.travel_time_min().max(MIN_EDGE_COST),
                                  segment.distance_km.max(MIN_EDGE_COST)),
                None => {
                    log::warn!("{} has no road from {} to {}, dropping its route", self.label,
                               from_idx, to_idx);
                    self.clear_route();
                    outcome.arrived = true;
                    break;
                }
            };

            // how far along the edge we can get with the time and range we have
            let time_fraction = time_left / edge_time;
            let range_fraction = self.range_km / edge_dist;
            let remaining = 1.0 - self.edge_progress;
            let step = remaining.min(time_fraction).min(range_fraction);
            self.edge_progress += step;
            time_left -= step * edge_time;
            let dist = step * edge_dist;
            self.consume(dist);
            outcome.distance_km += dist;

            if step >= remaining - EPSILON {
                self.location = to_idx;
                self.next_route_idx += 1;
                self.edge_progress = 0.0;
                if self.has_arrived() {
                    outcome.arrived = true;
                    break;
                }
            }
            if self.range_km <= EPSILON {
                outcome.stranded = true;
                break;
            }
        }
        outcome
    }

    fn consume(&mut self, distance_km: f64) {
        self.range_km = (self.range_km - distance_km).max(0.0);
        self.counters.km_total += distance_km;
        if self.passengers > 0 && self.state == VehicleState::InService {
            self.counters.km_with_passengers += distance_km;
        }
        self.counters.cost += distance_km * self.kind.cost_per_km();
        self.counters.emissions_g += distance_km * self.kind.emission_factor();
    }

    /// Where the vehicle is, interpolated along its current edge.
    pub fn position(&self, graph: &CityGraph) -> Point2d {
        let here = match graph.get_node(self.location) {
            Some(node) => node.pos,
            None => return Point2d::new(f64::NAN, f64::NAN),
        };
        if self.has_arrived() || self.edge_progress <= 0.0 {
            return here;
        }
        match graph.get_node(self.route[self.next_route_idx]) {
            Some(next) => here.interpolate(&next.pos, self.edge_progress),
            None => here,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::super::test_utils::square_city;
    use approx::assert_relative_eq;

    fn route(graph: &CityGraph, ids: &[&str]) -> Vec<usize> {
        ids.iter().map(|id| graph.resolve(id).unwrap()).collect()
    }

    fn taxi(graph: &CityGraph, propulsion: Propulsion) -> Vehicle {
        let kind = VehicleKind::new(VehicleCategory::Standard, propulsion);
        Vehicle::new(VehicleId(0), "T_E1", kind, graph.resolve("A").unwrap())
    }

    #[test]
    fn test_kind_constants() {
        let ee = VehicleKind::new(VehicleCategory::Standard, Propulsion::Electric);
        let cx = VehicleKind::new(VehicleCategory::Large, Propulsion::Combustion);
        assert_eq!(ee.capacity(), 4);
        assert_eq!(cx.capacity(), 6);
        assert_eq!(ee.emission_factor(), 0.0);
        assert_eq!(cx.emission_factor(), 120.0);
        assert_eq!(ee.default_max_range_km(), 250.0);
        assert_eq!(cx.default_max_range_km(), 350.0);
        assert_eq!(cx.label_prefix(), "X_C");
        assert_eq!("xl".parse::<VehicleCategory>().unwrap(), VehicleCategory::Large);
        assert!("hovercraft".parse::<Propulsion>().is_err());
    }

    #[test]
    fn test_range_checks() {
        let graph = square_city();
        let mut vehicle = taxi(&graph, Propulsion::Electric);
        assert!(vehicle.can_cover(200., 1.2));
        assert!(!vehicle.can_cover(220., 1.2));
        assert!(!vehicle.needs_recharge(0.3));
        vehicle.set_range(250., 50.);
        assert!(vehicle.needs_recharge(0.3));
        vehicle.set_range(100., 500.);
        assert_relative_eq!(vehicle.get_range_km(), 100.);
        assert!(vehicle.can_carry(4));
        assert!(!vehicle.can_carry(5));
    }

    #[test]
    fn test_advance_partial_edges() {
        let graph = square_city();
        let mut vehicle = taxi(&graph, Propulsion::Combustion);
        vehicle.assign(RequestId(1), 2);
        vehicle.begin_service(route(&graph, &["A", "B", "C"]));

        // each edge is 1 km and takes 1.5 minutes
        let outcome = vehicle.advance(&graph, 1.0, 10);
        assert!(!outcome.arrived);
        assert_relative_eq!(outcome.distance_km, 2. / 3., epsilon = 1e-9);
        assert_eq!(vehicle.get_location(), graph.resolve("A").unwrap());
        assert_relative_eq!(vehicle.get_edge_progress(), 2. / 3., epsilon = 1e-9);
        let pos = vehicle.position(&graph);
        assert_relative_eq!(pos.x_coord, 2. / 3., epsilon = 1e-9);

        let outcome = vehicle.advance(&graph, 1.0, 10);
        assert!(!outcome.arrived);
        assert_eq!(vehicle.get_location(), graph.resolve("B").unwrap());
        assert_eq!(vehicle.get_remaining_route(), &route(&graph, &["B", "C"])[..]);

        let outcome = vehicle.advance(&graph, 1.0, 10);
        assert!(outcome.arrived);
        assert_relative_eq!(outcome.distance_km, 2. / 3., epsilon = 1e-9);
        assert_eq!(vehicle.get_location(), graph.resolve("C").unwrap());
        assert_relative_eq!(vehicle.counters.km_total, 2.0, epsilon = 1e-9);
        assert_relative_eq!(vehicle.counters.km_with_passengers, 2.0, epsilon = 1e-9);
        assert_relative_eq!(vehicle.counters.emissions_g, 240.0, epsilon = 1e-6);
        assert_relative_eq!(vehicle.get_range_km(), 398.0, epsilon = 1e-9);
    }

    #[test]
    fn test_advance_edge_cap() {
        let graph = square_city();
        let mut vehicle = taxi(&graph, Propulsion::Electric);
        vehicle.set_route(route(&graph, &["A", "B", "C", "D", "A"]));
        // plenty of time, but only two edges per call
        let outcome = vehicle.advance(&graph, 100.0, 2);
        assert!(!outcome.arrived);
        assert_eq!(vehicle.get_location(), graph.resolve("C").unwrap());
    }

    #[test]
    fn test_range_never_negative() {
        let graph = square_city();
        let mut vehicle = taxi(&graph, Propulsion::Electric);
        vehicle.set_range(250., 0.5);
        vehicle.set_route(route(&graph, &["A", "B", "C"]));
        let outcome = vehicle.advance(&graph, 10.0, 10);
        assert!(outcome.stranded);
        assert!(!outcome.arrived);
        assert_relative_eq!(outcome.distance_km, 0.5, epsilon = 1e-9);
        assert_eq!(vehicle.get_range_km(), 0.0);
        assert_relative_eq!(vehicle.get_edge_progress(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_station_cycle() {
        let graph = square_city();
        let mut vehicle = taxi(&graph, Propulsion::Electric);
        vehicle.set_range(10., 2.);
        let dd = graph.resolve("D").unwrap();
        vehicle.head_to_station(dd, route(&graph, &["A", "D"]));
        assert_eq!(vehicle.get_state(), VehicleState::EnRouteToStation);
        vehicle.arrive_at_station(false);
        assert_eq!(vehicle.get_state(), VehicleState::QueuedAtStation);
        vehicle.arrive_at_station(true);
        assert_eq!(vehicle.get_state(), VehicleState::Charging);
        assert!(!vehicle.recover(5.));
        assert!(vehicle.recover(5.));
        assert_relative_eq!(vehicle.get_range_km(), 10.);
        assert_eq!(vehicle.release(), None);
        assert!(vehicle.is_available());
        assert_eq!(vehicle.get_target_station(), None);
    }
}
