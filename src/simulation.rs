use std::collections::{BTreeMap, HashMap, VecDeque};

use kdtree::distance::squared_euclidean;
use kdtree::KdTree;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_isaac::Isaac64Rng;
use serde::Serialize;

use super::city_graph::{CityGraph, CostMetric};
use super::planner::{plan_assignments, Assignment};
use super::request::{DeadlineStatus, EnvPreference, Request, RequestId, RequestState,
                     ScheduledRequest};
use super::search::{find_route, SearchStrategy};
use super::sim_config::{FleetSimConfig, GraphSource};
use super::snapshot::{FleetMetrics, Snapshot};
use super::state::SimulationState;
use super::station::{ServiceOutcome, Station};
use super::vehicle::{Propulsion, VehicleCategory, VehicleId, VehicleKind, VehicleState};
use super::FleetError;


/// Simulated minutes per tick.
pub const TICK_MINUTES: u32 = 1;

/// Largest party any vehicle can carry.
const MAX_PARTY_SIZE: u32 = 6;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SimCounters {
    pub requests_created: u32,
    pub completed: u32,
    pub expired: u32,
    pub escalated: u32,
    pub cancelled: u32,
    pub rejected: u32,
    pub aborted_trips: u32,
    pub routing_failures: u32,
    pub recharge_trips: u32,
    pub stranded: u32,
}

/// Hands out request ids and per-class vehicle labels.
#[derive(Debug, Default)]
struct IdGenerator {
    last_request: u32,
    vehicles_by_prefix: HashMap<&'static str, u32>,
}

impl IdGenerator {
    fn next_request_id(&mut self) -> RequestId {
        self.last_request += 1;
        RequestId(self.last_request)
    }

    fn next_vehicle_label(&mut self, kind: &VehicleKind) -> String {
        let count = self.vehicles_by_prefix.entry(kind.label_prefix()).or_insert(0);
        *count += 1;
        format!("{}{}", kind.label_prefix(), count)
    }
}

type StationTree = KdTree<f64, usize, [f64; 2]>;

pub struct Simulation {
    cfg: FleetSimConfig,
    state: SimulationState,
    stations: BTreeMap<usize, Station>,
    // station nodes by the propulsion they serve, for nearest-station queries
    station_index: HashMap<Propulsion, StationTree>,
    strategy: SearchStrategy,
    rng: Isaac64Rng,
    ids: IdGenerator,
    counters: SimCounters,
    schedule: VecDeque<ScheduledRequest>,
}

impl Simulation {
    pub fn from_cfg(cfg_path: &str) -> Result<Simulation, FleetError> {
        let cfg = FleetSimConfig::from_file(cfg_path)?;
        let graph = match &cfg.graph {
            GraphSource::File(path) => CityGraph::load(path)?,
            GraphSource::Grid {width, height, spacing_km, num_stations} => {
                let mut rng = Isaac64Rng::seed_from_u64(cfg.seed);
                CityGraph::grid(*width, *height, *spacing_km, *num_stations, &mut rng)?
            }
        };
        Simulation::new(graph, cfg)
    }

    /// Sets up stations, the request schedule and the initial fleet.
    pub fn new(graph: CityGraph, cfg: FleetSimConfig) -> Result<Simulation, FleetError> {
        cfg.validate()?;
        let num_components = graph.components().len();
        log::debug!("city graph has {} strongly connected components", num_components);

        let mut stations = BTreeMap::new();
        for (idx, node) in graph.get_nodes().iter().enumerate() {
            if node.category.is_station() {
                stations.insert(idx, Station::new(idx, node.category, node.charging_capacity));
            }
        }
        let mut station_index = HashMap::new();
        for propulsion in &[Propulsion::Electric, Propulsion::Combustion] {
            let mut kdtree = KdTree::new(2);
            for idx in graph.station_nodes(*propulsion) {
                if let Some(node) = graph.get_node(idx) {
                    kdtree.add(node.pos.as_array(), idx).map_err(|err| {
                        FleetError::InvalidConfig(format!("bad station position: {:?}", err))
                    })?;
                }
            }
            station_index.insert(*propulsion, kdtree);
        }
        if stations.is_empty() {
            log::warn!("the city has no stations; vehicles will run dry");
        }

        let schedule = match &cfg.request_schedule_path {
            Some(path) => ScheduledRequest::all_from_csv(path)?.into_iter().collect(),
            None => VecDeque::new(),
        };
        let strategy = cfg.strategy;
        let rng = Isaac64Rng::seed_from_u64(cfg.seed);
        let fleet = cfg.fleet.clone();

        let mut sim = Simulation {
            cfg,
            state: SimulationState::new(graph),
            stations,
            station_index,
            strategy,
            rng,
            ids: IdGenerator::default(),
            counters: SimCounters::default(),
            schedule,
        };

        for entry in fleet {
            let location = match &entry.node {
                Some(node_id) => sim.state.get_graph().resolve(node_id)?,
                None => match sim.random_node() {
                    Some(idx) => idx,
                    None => return Err(FleetError::InvalidConfig(
                        String::from("can't place a fleet in an empty city"))),
                },
            };
            sim.add_vehicle(entry.kind, location);
        }
        log::info!("simulation ready: {} nodes, {} stations, {} vehicles, strategy {}",
                   sim.state.get_graph().get_num_nodes(), sim.stations.len(),
                   sim.state.get_num_vehicles(), sim.strategy);
        Ok(sim)
    }

    pub fn get_state(&self) -> &SimulationState {
        &self.state
    }

    pub fn get_graph(&self) -> &CityGraph {
        self.state.get_graph()
    }

    pub fn get_clock_min(&self) -> u32 {
        self.state.get_clock_min()
    }

    pub fn get_config(&self) -> &FleetSimConfig {
        &self.cfg
    }

    pub fn get_strategy(&self) -> SearchStrategy {
        self.strategy
    }

    pub fn get_counters(&self) -> &SimCounters {
        &self.counters
    }

    pub fn get_stations(&self) -> &BTreeMap<usize, Station> {
        &self.stations
    }

    pub fn get_station(&self, node_id: &str) -> Option<&Station> {
        let idx = self.state.get_graph().get_node_idx_by_id(node_id)?;
        self.stations.get(&idx)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_state(&self.state)
    }

    pub fn metrics(&self) -> FleetMetrics {
        FleetMetrics::compute(&self.state, &self.counters, &self.stations)
    }

    pub fn run(&mut self, num_ticks: u32) -> Result<(), FleetError> {
        for _ in 0..num_ticks {
            self.advance_one_tick()?;
        }
        Ok(())
    }

    /// Advances the clock by one tick: deadlines, new demand, planning, movement and
    /// stations, then the range check.
    pub fn advance_one_tick(&mut self) -> Result<(), FleetError> {
        self.state.advance_clock(TICK_MINUTES);
        log::debug!("tick {}", self.state.get_clock_min());

        self.update_deadlines();
        self.inject_scheduled_requests();
        if self.cfg.random_request_probability > 0.0 &&
           self.rng.gen_bool(self.cfg.random_request_probability) {
            self.spawn_random_request();
        }

        if let Some(plan) = plan_assignments(&self.state, &self.cfg) {
            log::debug!("plan of {} assignments, f = {:.3}, {} expansions",
                        plan.assignments.len(), plan.f_score, plan.nodes_expanded);
            if let Some(action) = plan.first() {
                self.dispatch(*action)?;
            }
        }

        self.move_vehicles()?;
        self.update_stations();
        self.check_ranges()?;
        Ok(())
    }

    fn update_deadlines(&mut self) {
        for (request_id, status) in self.state.check_deadlines(self.cfg.escalation_fraction) {
            match status {
                DeadlineStatus::Escalated => {
                    self.counters.escalated += 1;
                    log::info!("{} escalated to critical", request_id);
                }
                DeadlineStatus::Expired {escalated_now} => {
                    if escalated_now {
                        self.counters.escalated += 1;
                        log::info!("{} escalated to critical", request_id);
                    }
                    self.counters.expired += 1;
                    log::info!("{} expired without a vehicle", request_id);
                }
                DeadlineStatus::OnTime => (),
            }
        }
    }

    fn inject_scheduled_requests(&mut self) {
        let now_min = self.state.get_clock_min();
        while self.schedule.front().map_or(false, |row| row.time_min <= now_min) {
            let row = match self.schedule.pop_front() {
                Some(row) => row,
                None => break,
            };
            let result = self.create_request(&row.origin, &row.destination, row.passengers,
                                             row.premium, row.preference);
            if let Err(err) = result {
                log::warn!("skipping scheduled request at minute {}: {}", row.time_min, err);
            }
        }
    }

    /// Commits a planned assignment and routes the vehicle to the pickup.  If there's no
    /// route, the assignment is undone.
    fn dispatch(&mut self, action: Assignment) -> Result<(), FleetError> {
        self.state.assign(action.vehicle, action.request)?;
        let (location, label) = match self.state.get_vehicle(action.vehicle) {
            Some(vehicle) => (vehicle.get_location(), vehicle.label.clone()),
            None => return Err(FleetError::UnknownVehicle(format!("{:?}", action.vehicle))),
        };
        let origin = match self.state.get_request(action.request) {
            Some(request) => request.origin,
            None => return Err(FleetError::UnknownRequest(action.request.to_string())),
        };

        let result = find_route(self.state.get_graph(), self.strategy, location, origin,
                                self.cfg.route_metric)?;
        if result.success() {
            log::info!("{} assigned to {}, pickup in {:.1} ({} nodes expanded)", label,
                       action.request, result.total_cost, result.nodes_expanded);
            if let Some(vehicle) = self.state.vehicle_mut(action.vehicle) {
                vehicle.set_route(result.path);
            }
        } else {
            log::warn!("no route for {} to the pickup of {}: {:?}", label, action.request,
                       result.outcome);
            self.state.requeue(action.request)?;
            if let Some(vehicle) = self.state.vehicle_mut(action.vehicle) {
                vehicle.release();
            }
            self.counters.routing_failures += 1;
        }
        Ok(())
    }

    fn move_vehicles(&mut self) -> Result<(), FleetError> {
        let max_edges = self.cfg.max_edges_per_tick;
        for idx in 0..self.state.get_num_vehicles() {
            let id = VehicleId(idx);
            match self.state.get_vehicle(id) {
                Some(vehicle) if vehicle.is_moving() => (),
                _ => continue,
            }
            let outcome = match self.state.advance_vehicle(id, TICK_MINUTES as f64, max_edges) {
                Some(outcome) => outcome,
                None => continue,
            };
            if outcome.arrived {
                self.handle_arrival(id)?;
            } else if outcome.stranded {
                self.strand(id)?;
            }
        }
        Ok(())
    }

    fn handle_arrival(&mut self, id: VehicleId) -> Result<(), FleetError> {
        let (state, location, request_id, target_station, kind, label) =
            match self.state.get_vehicle(id) {
                Some(vv) => (vv.get_state(), vv.get_location(), vv.get_request(),
                             vv.get_target_station(), vv.kind, vv.label.clone()),
                None => return Err(FleetError::UnknownVehicle(format!("{:?}", id))),
            };
        let now_min = self.state.get_clock_min();

        match (state, request_id) {
            (VehicleState::EnRouteToPickup, Some(request_id)) => {
                let destination = match self.state.get_request(request_id) {
                    Some(request) => request.destination,
                    None => return Err(FleetError::UnknownRequest(request_id.to_string())),
                };
                let graph = self.state.get_graph();
                let result = find_route(graph, self.strategy, location, destination,
                                        self.cfg.route_metric)?;
                if !result.success() {
                    log::warn!("{} has no route to the destination of {}", label, request_id);
                    self.state.requeue(request_id)?;
                    if let Some(vehicle) = self.state.vehicle_mut(id) {
                        vehicle.release();
                    }
                    self.counters.routing_failures += 1;
                    return Ok(());
                }
                let trip_km = graph.path_cost(&result.path, CostMetric::Distance)?;
                if let Some(request) = self.state.request_mut(request_id) {
                    request.pick_up(now_min, trip_km);
                }
                if let Some(vehicle) = self.state.vehicle_mut(id) {
                    vehicle.begin_service(result.path);
                }
                log::info!("{} picked up {}, {:.2} km to go", label, request_id, trip_km);
            }
            (VehicleState::InService, Some(request_id)) => {
                let fare = match self.state.get_request(request_id) {
                    Some(request) => self.fare(request),
                    None => return Err(FleetError::UnknownRequest(request_id.to_string())),
                };
                if let Some(request) = self.state.request_mut(request_id) {
                    request.complete(now_min, fare, &kind);
                }
                self.state.archive(request_id)?;
                if let Some(vehicle) = self.state.vehicle_mut(id) {
                    vehicle.complete_trip(fare);
                }
                self.counters.completed += 1;
                log::info!("{} completed {}, fare {:.2}", label, request_id, fare);
            }
            (VehicleState::EnRouteToStation, _) => {
                let est_minutes = self.session_minutes(id);
                let station = match target_station {
                    Some(node) if node == location => self.stations.get_mut(&node),
                    _ => None,
                };
                match station {
                    Some(station) if station.category.serves(kind.propulsion) => {
                        match station.request_service(id, now_min, est_minutes) {
                            ServiceOutcome::Admitted => {
                                if let Some(vehicle) = self.state.vehicle_mut(id) {
                                    vehicle.arrive_at_station(true);
                                }
                                log::info!("{} started a {} minute session", label, est_minutes);
                            }
                            ServiceOutcome::Queued => {
                                if let Some(vehicle) = self.state.vehicle_mut(id) {
                                    vehicle.arrive_at_station(false);
                                }
                                log::info!("{} queued at a full station", label);
                            }
                            ServiceOutcome::Refused => {
                                log::warn!("{} found its station out of service", label);
                                if let Some(vehicle) = self.state.vehicle_mut(id) {
                                    vehicle.release();
                                }
                                self.send_to_station(id)?;
                            }
                        }
                    }
                    _ => {
                        log::warn!("{} reached a node that can't serve it", label);
                        if let Some(vehicle) = self.state.vehicle_mut(id) {
                            vehicle.release();
                        }
                    }
                }
            }
            _ => {
                log::warn!("{} arrived while {}", label, state);
                if let Some(vehicle) = self.state.vehicle_mut(id) {
                    vehicle.release();
                }
            }
        }
        Ok(())
    }

    fn fare(&self, request: &Request) -> f64 {
        let fare = self.cfg.fare_base + self.cfg.fare_per_km * request.trip_km;
        if request.is_premium() {
            return fare * self.cfg.premium_fare_multiplier;
        }
        fare
    }

    /// Whole minutes a station session would take to fill the vehicle.
    fn session_minutes(&self, id: VehicleId) -> u32 {
        match self.state.get_vehicle(id) {
            Some(vehicle) => {
                let missing = vehicle.get_max_range_km() - vehicle.get_range_km();
                let rate = vehicle.kind.recharge_rate(&self.cfg);
                ((missing / rate).ceil() as u32).max(1)
            }
            None => 1,
        }
    }

    /// A vehicle that ran dry between nodes.
    fn strand(&mut self, id: VehicleId) -> Result<(), FleetError> {
        let (label, request_id) = match self.state.vehicle_mut(id) {
            Some(vehicle) => (vehicle.label.clone(), vehicle.take_out_of_service()),
            None => return Err(FleetError::UnknownVehicle(format!("{:?}", id))),
        };
        log::warn!("{} ran out of range and is out of service", label);
        self.counters.stranded += 1;
        if let Some(request_id) = request_id {
            self.state.requeue(request_id)?;
            self.counters.aborted_trips += 1;
        }
        Ok(())
    }

    fn update_stations(&mut self) {
        let now_min = self.state.get_clock_min();
        for (_, station) in self.stations.iter_mut() {
            if !station.is_operational() {
                if !station.tick_downtime(TICK_MINUTES as f64) {
                    continue;
                }
                log::info!("station at {} is back in service",
                           self.state.get_graph().get_node_id_by_idx(station.node).unwrap_or("?"));
            }
            let in_service: Vec<VehicleId> = station.get_active().iter()
                .map(|slot| slot.vehicle).collect();
            for vid in in_service {
                let vehicle = match self.state.vehicle_mut(vid) {
                    Some(vehicle) => vehicle,
                    None => {
                        station.withdraw(vid);
                        continue;
                    }
                };
                let before = vehicle.get_range_km();
                let full = vehicle.recover(vehicle.kind.recharge_rate(&self.cfg) *
                                           TICK_MINUTES as f64);
                station.record_recovery(vehicle.kind.propulsion,
                                        vehicle.get_range_km() - before);
                if full {
                    vehicle.release();
                    station.finish(vid);
                    log::info!("{} is full again", vehicle.label);
                }
            }

            // slots freed this tick go to the queue straight away
            loop {
                let admitted = {
                    let state = &self.state;
                    let cfg = &self.cfg;
                    station.admit_next(now_min, |vid| match state.get_vehicle(vid) {
                        Some(vehicle) => {
                            let missing = vehicle.get_max_range_km() - vehicle.get_range_km();
                            ((missing / vehicle.kind.recharge_rate(cfg)).ceil() as u32).max(1)
                        }
                        None => 1,
                    })
                };
                match admitted {
                    Some(vid) => {
                        if let Some(vehicle) = self.state.vehicle_mut(vid) {
                            vehicle.arrive_at_station(true);
                            log::info!("{} left the queue for a free slot", vehicle.label);
                        }
                    }
                    None => break,
                }
            }
            station.record_tick(TICK_MINUTES as f64);
        }
    }

    /// Sends low vehicles to a station.  Vehicles carrying out a request abort it only when
    /// critically low.
    fn check_ranges(&mut self) -> Result<(), FleetError> {
        for idx in 0..self.state.get_num_vehicles() {
            let id = VehicleId(idx);
            let (state, fraction) = match self.state.get_vehicle(id) {
                Some(vehicle) => (vehicle.get_state(), vehicle.range_fraction()),
                None => continue,
            };
            match state {
                VehicleState::Available if fraction < self.cfg.recharge_threshold => {
                    self.send_to_station(id)?;
                }
                VehicleState::EnRouteToPickup | VehicleState::InService
                    if fraction < self.cfg.critical_range_threshold => {
                    self.send_to_station(id)?;
                }
                _ => (),
            }
        }
        Ok(())
    }

    /// Drops the vehicle's request, which goes back to the pending pool.
    fn abort_trip(&mut self, id: VehicleId) -> Result<(), FleetError> {
        let (label, request_id) = match self.state.vehicle_mut(id) {
            Some(vehicle) => (vehicle.label.clone(), vehicle.release()),
            None => return Err(FleetError::UnknownVehicle(format!("{:?}", id))),
        };
        if let Some(request_id) = request_id {
            log::warn!("{} aborted {}", label, request_id);
            self.state.requeue(request_id)?;
            self.counters.aborted_trips += 1;
        }
        Ok(())
    }

    /// Routes a vehicle to the nearest station that serves it, trying stations in order of
    /// straight-line distance until one can be reached.  A vehicle busy with a request
    /// abandons it.  Returns false if no station could be reached.
    pub fn send_to_station(&mut self, id: VehicleId) -> Result<bool, FleetError> {
        let (state, location, propulsion, label) = match self.state.get_vehicle(id) {
            Some(vv) => (vv.get_state(), vv.get_location(), vv.kind.propulsion, vv.label.clone()),
            None => return Err(FleetError::UnknownVehicle(format!("{:?}", id))),
        };
        match state {
            VehicleState::EnRouteToStation | VehicleState::QueuedAtStation |
            VehicleState::Charging | VehicleState::Refueling => return Ok(true),
            VehicleState::OutOfService => return Ok(false),
            VehicleState::EnRouteToPickup | VehicleState::InService => self.abort_trip(id)?,
            VehicleState::Available => (),
        }

        let graph = self.state.get_graph();
        let pos = match graph.get_node(location) {
            Some(node) => node.pos,
            None => return Err(FleetError::UnknownNode(format!("#{}", location))),
        };
        let candidates: Vec<usize> = match self.station_index.get(&propulsion) {
            Some(kdtree) if kdtree.size() > 0 => {
                match kdtree.nearest(&pos.as_array(), kdtree.size(), &squared_euclidean) {
                    Ok(found) => found.into_iter().map(|(_, idx)| *idx).collect(),
                    Err(err) => {
                        log::warn!("station lookup failed: {:?}", err);
                        vec![]
                    }
                }
            }
            _ => vec![],
        };

        for station in candidates {
            if !self.stations.get(&station).map_or(false, |st| st.is_operational()) {
                log::debug!("skipping the station at {:?}, it is down",
                            graph.get_node_id_by_idx(station));
                continue;
            }
            let result = find_route(graph, self.strategy, location, station, CostMetric::Time)?;
            if !result.success() {
                log::debug!("{} can't reach the station at {:?}", label,
                            graph.get_node_id_by_idx(station));
                continue;
            }
            log::info!("{} heading to the station at {}, {:.1} min away", label,
                       graph.get_node_id_by_idx(station).unwrap_or("?"), result.total_cost);
            if let Some(vehicle) = self.state.vehicle_mut(id) {
                vehicle.head_to_station(station, result.path);
            }
            self.counters.recharge_trips += 1;
            return Ok(true);
        }
        log::warn!("{} can't reach any station", label);
        Ok(false)
    }

    fn random_node(&mut self) -> Option<usize> {
        let num_nodes = self.state.get_graph().get_num_nodes();
        if num_nodes == 0 {
            return None;
        }
        Some(self.rng.gen_range(0..num_nodes))
    }

    fn add_vehicle(&mut self, kind: VehicleKind, location: usize) -> VehicleId {
        let label = self.ids.next_vehicle_label(&kind);
        let id = self.state.add_vehicle(&label, kind, location);
        log::info!("added {} ({}) at {}", label, kind.class_label(),
                   self.state.get_graph().get_node_id_by_idx(location).unwrap_or("?"));
        id
    }

    pub fn create_vehicle(&mut self, category: VehicleCategory, propulsion: Propulsion,
                          node_id: &str) -> Result<VehicleId, FleetError> {
        let location = self.state.get_graph().resolve(node_id)?;
        Ok(self.add_vehicle(VehicleKind::new(category, propulsion), location))
    }

    /// Adds a vehicle of a random class at a random node: 70% taxis, the rest XL, half of
    /// each electric.
    pub fn spawn_random_vehicle(&mut self) -> Option<VehicleId> {
        let location = self.random_node()?;
        let category = if self.rng.gen_bool(0.7) {
            VehicleCategory::Standard
        } else {
            VehicleCategory::Large
        };
        let propulsion = *[Propulsion::Electric, Propulsion::Combustion].choose(&mut self.rng)?;
        Some(self.add_vehicle(VehicleKind::new(category, propulsion), location))
    }

    pub fn set_vehicle_range(&mut self, id: VehicleId, max_range_km: f64, range_km: f64)
                             -> Result<(), FleetError> {
        match self.state.vehicle_mut(id) {
            Some(vehicle) => {
                vehicle.set_range(max_range_km, range_km);
                Ok(())
            }
            None => Err(FleetError::UnknownVehicle(format!("{:?}", id))),
        }
    }

    /// Creates a request at the current minute.  A request no vehicle could ever serve is
    /// rejected on the spot; it still gets an id and is counted.
    pub fn create_request(&mut self, origin: &str, destination: &str, passengers: u32,
                          premium: bool, preference: EnvPreference)
                          -> Result<RequestId, FleetError> {
        let orig_idx = self.state.get_graph().resolve(origin)?;
        let dest_idx = self.state.get_graph().resolve(destination)?;
        Ok(self.add_request(orig_idx, dest_idx, passengers, premium, preference))
    }

    fn add_request(&mut self, origin: usize, destination: usize, passengers: u32,
                   premium: bool, preference: EnvPreference) -> RequestId {
        let id = self.ids.next_request_id();
        let max_wait_min = if premium {
            self.cfg.premium_max_wait_min
        } else {
            self.cfg.normal_max_wait_min
        };
        let mut request = Request::new(id, origin, destination, passengers,
                                       self.state.get_clock_min(), premium, preference,
                                       max_wait_min);
        self.counters.requests_created += 1;

        let rejection = if passengers == 0 {
            Some(String::from("no passengers"))
        } else if passengers > MAX_PARTY_SIZE {
            Some(format!("{} passengers is more than any vehicle carries", passengers))
        } else if origin == destination {
            Some(String::from("origin and destination are the same"))
        } else {
            None
        };
        if let Some(reason) = rejection {
            log::warn!("rejected {}: {}", id, reason);
            request.reject(&reason);
            self.state.add_finished(request);
            self.counters.rejected += 1;
            return id;
        }

        let graph = self.state.get_graph();
        log::info!("new request {}: {} -> {}, {} passengers{}", id,
                   graph.get_node_id_by_idx(origin).unwrap_or("?"),
                   graph.get_node_id_by_idx(destination).unwrap_or("?"), passengers,
                   if premium { ", premium" } else { "" });
        self.state.add_request(request);
        id
    }

    /// A random trip between two distinct nodes.  None if the city has fewer than two nodes.
    pub fn spawn_random_request(&mut self) -> Option<RequestId> {
        let num_nodes = self.state.get_graph().get_num_nodes();
        if num_nodes < 2 {
            return None;
        }
        let origin = self.rng.gen_range(0..num_nodes);
        // shift past the origin so the two are always distinct
        let mut destination = self.rng.gen_range(0..num_nodes - 1);
        if destination >= origin {
            destination += 1;
        }
        let passengers = if self.rng.gen_bool(self.cfg.large_party_probability) {
            self.rng.gen_range(5..=MAX_PARTY_SIZE)
        } else {
            self.rng.gen_range(1..=4)
        };
        let premium = self.rng.gen_bool(self.cfg.premium_probability);
        Some(self.add_request(origin, destination, passengers, premium,
                              EnvPreference::Indifferent))
    }

    /// Cancels a pending or active request.  A vehicle bound to it is freed where it stands.
    pub fn cancel_request(&mut self, id: RequestId, reason: &str) -> Result<(), FleetError> {
        let vehicle_id = match self.state.get_request(id) {
            Some(request) if !request.get_state().is_terminal() => request.get_vehicle(),
            _ => return Err(FleetError::UnknownRequest(id.to_string())),
        };
        if let Some(vehicle_id) = vehicle_id {
            if let Some(vehicle) = self.state.vehicle_mut(vehicle_id) {
                if vehicle.get_request() == Some(id) {
                    vehicle.release();
                }
            }
        }
        if let Some(request) = self.state.request_mut(id) {
            request.cancel(reason);
        }
        self.state.archive(id)?;
        self.counters.cancelled += 1;
        log::info!("cancelled {}: {}", id, reason);
        Ok(())
    }

    /// Takes the station at `node_id` out of service for `duration_min` minutes.  Vehicles
    /// already charging there pause, and new arrivals look for another station.
    pub fn fail_station(&mut self, node_id: &str, duration_min: f64) -> Result<(), FleetError> {
        let idx = self.state.get_graph().resolve(node_id)?;
        match self.stations.get_mut(&idx) {
            Some(station) => {
                station.fail(duration_min);
                log::warn!("station at {} failed for {} min", node_id, duration_min);
                Ok(())
            }
            None => Err(FleetError::UnknownNode(format!("{} is not a station", node_id))),
        }
    }

    pub fn repair_station(&mut self, node_id: &str) -> Result<(), FleetError> {
        let idx = self.state.get_graph().resolve(node_id)?;
        match self.stations.get_mut(&idx) {
            Some(station) => {
                station.repair();
                log::info!("station at {} repaired", node_id);
                Ok(())
            }
            None => Err(FleetError::UnknownNode(format!("{} is not a station", node_id))),
        }
    }

    pub fn set_strategy_by_name(&mut self, name: &str) -> Result<(), FleetError> {
        self.strategy = name.parse()?;
        log::info!("route search strategy is now {}", self.strategy);
        Ok(())
    }

    pub fn update_congestion(&mut self, origin: &str, destination: &str, factor: f64)
                             -> Result<(), FleetError> {
        self.state.graph_mut().update_congestion(origin, destination, factor)
    }

    pub fn get_request_state(&self, id: RequestId) -> Option<RequestState> {
        self.state.get_request(id).map(|request| request.get_state())
    }
}
