use std::path::PathBuf;
use glob::glob;
use approx::assert_abs_diff_eq;
use approx::assert_relative_eq;

use fleet_dispatch_sim::CityGraph;
use fleet_dispatch_sim::EnvPreference;
use fleet_dispatch_sim::FleetError;
use fleet_dispatch_sim::Priority;
use fleet_dispatch_sim::Propulsion;
use fleet_dispatch_sim::RequestState;
use fleet_dispatch_sim::Simulation;
use fleet_dispatch_sim::VehicleCategory;
use fleet_dispatch_sim::VehicleState;


const SQUARE_CFG: &str = "tests/envs/square/config.yaml";

/// this allows logging output from tests.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn node_ids(sim: &Simulation, route: &[usize]) -> Vec<String> {
    route.iter()
         .map(|idx| String::from(sim.get_graph().get_node_id_by_idx(*idx).unwrap()))
         .collect()
}

/// One electric taxi with 2 km of range carries a passenger from A to C, then heads for the
/// charging station at D with an empty battery.
#[test]
fn test_square_end_to_end() -> Result<(), FleetError> {
    init_logging();
    let mut sim = Simulation::from_cfg(SQUARE_CFG)?;
    let vid = sim.create_vehicle(VehicleCategory::Standard, Propulsion::Electric, "A")?;
    sim.set_vehicle_range(vid, 2.0, 2.0)?;
    let rid = sim.create_request("A", "C", 1, false, EnvPreference::Indifferent)?;

    // assigned and picked up on the spot
    sim.advance_one_tick()?;
    assert_eq!(sim.get_request_state(rid), Some(RequestState::InProgress));
    let snapshot = sim.snapshot();
    assert_eq!(snapshot.vehicles[0].state, VehicleState::InService);
    assert_eq!(snapshot.vehicles[0].route, vec!["A", "B", "C"]);
    assert!(snapshot.pending_requests.is_empty());

    sim.run(2)?;
    assert_eq!(sim.get_request_state(rid), Some(RequestState::InProgress));
    let vehicle = sim.get_state().get_vehicle(vid).unwrap();
    assert_eq!(node_ids(&sim, &[vehicle.get_location()]), vec!["B"]);

    sim.advance_one_tick()?;
    assert_eq!(sim.get_clock_min(), 4);
    let request = sim.get_state().get_request(rid).unwrap();
    assert_eq!(request.get_state(), RequestState::Completed);
    assert_eq!(request.get_completed_min(), Some(4));
    assert_relative_eq!(request.trip_km, 2.0);
    assert_relative_eq!(request.fare, 3.0 + 1.2 * 2.0);
    assert_relative_eq!(request.get_satisfaction().unwrap(), 100.0);

    let vehicle = sim.get_state().get_vehicle(vid).unwrap();
    assert_abs_diff_eq!(vehicle.get_range_km(), 0.0, epsilon = 1e-9);
    assert_eq!(vehicle.get_state(), VehicleState::EnRouteToStation);
    assert_eq!(node_ids(&sim, &[vehicle.get_target_station().unwrap()]), vec!["D"]);
    assert_eq!(node_ids(&sim, vehicle.get_remaining_route()), vec!["C", "D"]);

    let metrics = sim.metrics();
    assert_eq!(metrics.completed_requests, 1);
    assert_relative_eq!(metrics.km_total, 2.0, epsilon = 1e-9);
    assert_relative_eq!(metrics.fleet_efficiency_pct, 100.0, epsilon = 1e-6);
    assert_relative_eq!(metrics.success_pct, 100.0);
    assert_eq!(metrics.co2_kg, 0.0);
    Ok(())
}

/// With one vehicle equidistant from two requests, the premium one is served first.
#[test]
fn test_premium_preferred() -> Result<(), FleetError> {
    init_logging();
    let mut sim = Simulation::from_cfg(SQUARE_CFG)?;
    sim.create_vehicle(VehicleCategory::Standard, Propulsion::Combustion, "B")?;
    let normal = sim.create_request("A", "D", 1, false, EnvPreference::Indifferent)?;
    let premium = sim.create_request("C", "D", 1, true, EnvPreference::Indifferent)?;

    sim.advance_one_tick()?;
    assert_eq!(sim.get_request_state(premium), Some(RequestState::Assigned));
    assert_eq!(sim.get_request_state(normal), Some(RequestState::Pending));
    Ok(())
}

/// Nobody can serve an electric-only request with a combustion fleet, so it escalates at 70%
/// of its maximum wait and expires at 100%.
#[test]
fn test_electric_only_expires() -> Result<(), FleetError> {
    init_logging();
    let mut sim = Simulation::from_cfg(SQUARE_CFG)?;
    sim.create_vehicle(VehicleCategory::Standard, Propulsion::Combustion, "B")?;
    sim.create_vehicle(VehicleCategory::Large, Propulsion::Combustion, "C")?;
    let rid = sim.create_request("A", "C", 2, false, EnvPreference::ElectricOnly)?;

    sim.run(41)?;
    let request = sim.get_state().get_request(rid).unwrap();
    assert_eq!(request.get_priority(), Priority::Normal);
    assert_eq!(sim.get_counters().escalated, 0);

    sim.advance_one_tick()?;
    let request = sim.get_state().get_request(rid).unwrap();
    assert_eq!(request.get_priority(), Priority::Critical);
    assert_eq!(request.get_state(), RequestState::Pending);
    assert_eq!(sim.get_counters().escalated, 1);

    sim.run(17)?;
    assert_eq!(sim.get_request_state(rid), Some(RequestState::Pending));
    sim.advance_one_tick()?;
    let request = sim.get_state().get_request(rid).unwrap();
    assert_eq!(request.get_state(), RequestState::Expired);
    assert!(request.get_terminal_reason().is_some());
    assert_eq!(sim.get_counters().escalated, 1);
    assert_eq!(sim.get_counters().expired, 1);
    assert!(sim.get_state().vehicles().all(|vv| vv.is_available()));
    Ok(())
}

/// A vehicle that drops below the critical range mid-trip gives its request back and goes to
/// recharge.
#[test]
fn test_abort_on_critical_range() -> Result<(), FleetError> {
    init_logging();
    let mut sim = Simulation::from_cfg(SQUARE_CFG)?;
    let vid = sim.create_vehicle(VehicleCategory::Standard, Propulsion::Electric, "A")?;
    sim.set_vehicle_range(vid, 100.0, 16.0)?;
    let rid = sim.create_request("A", "C", 1, false, EnvPreference::Indifferent)?;

    sim.run(2)?;
    assert_eq!(sim.get_request_state(rid), Some(RequestState::InProgress));
    // 16 - 4/3 km is under 15%
    sim.advance_one_tick()?;
    let request = sim.get_state().get_request(rid).unwrap();
    assert_eq!(request.get_state(), RequestState::Pending);
    assert_eq!(request.get_vehicle(), None);
    assert_eq!(sim.get_counters().aborted_trips, 1);

    let vehicle = sim.get_state().get_vehicle(vid).unwrap();
    assert_eq!(vehicle.get_state(), VehicleState::EnRouteToStation);
    assert_eq!(vehicle.get_request(), None);
    assert_eq!(vehicle.get_passengers(), 0);
    assert_eq!(node_ids(&sim, &[vehicle.get_location()]), vec!["B"]);
    assert!(vehicle.get_range_km() >= 0.0);
    Ok(())
}

#[test]
fn test_request_schedule() -> Result<(), FleetError> {
    init_logging();
    let mut sim = Simulation::from_cfg("tests/envs/square/config_schedule.yaml")?;
    assert_eq!(sim.get_state().get_num_vehicles(), 1);
    sim.run(1)?;
    assert_eq!(sim.get_counters().requests_created, 1);
    // the row with an unknown node is skipped
    sim.run(2)?;
    assert_eq!(sim.get_counters().requests_created, 2);
    assert_eq!(sim.metrics().total_requests, 2);
    Ok(())
}

#[test]
fn test_deterministic_for_seed() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let mut outputs = vec![];
    for _ in 0..2 {
        let mut sim = Simulation::from_cfg("tests/envs/grid/config.yaml")?;
        sim.run(60)?;
        outputs.push(serde_json::to_string(&sim.metrics())?);
    }
    assert_eq!(outputs[0], outputs[1]);
    Ok(())
}

#[test]
fn test_graph_file_round_trip() -> Result<(), FleetError> {
    let graph = CityGraph::load(&PathBuf::from("tests/envs/square/city.json"))?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("saved.json");
    graph.save(&path)?;
    let reloaded = CityGraph::load(&path)?;
    assert_eq!(reloaded.get_num_nodes(), graph.get_num_nodes());
    assert_eq!(reloaded.get_num_edges(), graph.get_num_edges());
    assert_eq!(reloaded.get_num_edges(), 8);
    for from_idx in 0..graph.get_num_nodes() {
        for (to_idx, segment) in graph.neighbors(from_idx) {
            let from_id = graph.get_node_id_by_idx(from_idx).unwrap();
            let to_id = graph.get_node_id_by_idx(to_idx).unwrap();
            let other = reloaded.segment(reloaded.resolve(from_id)?, reloaded.resolve(to_id)?)
                                .unwrap();
            assert_relative_eq!(other.distance_km, segment.distance_km);
            assert_relative_eq!(other.travel_time_min(), segment.travel_time_min());
        }
    }
    Ok(())
}

/// Runs every environment for its configured length, checking the bookkeeping after each
/// tick.
#[test]
fn test_envs_keep_invariants() {
    init_logging();
    for path in glob("tests/envs/*/config*.yaml").expect("Failed to read glob pattern") {
        let path = path.unwrap();
        println!("Testing {:?}", path);
        let mut sim = Simulation::from_cfg(path.to_str().unwrap()).unwrap();
        for _ in 0..sim.get_config().num_ticks {
            sim.advance_one_tick().unwrap();
            check_invariants(&sim);
        }
    }
}

fn check_invariants(sim: &Simulation) {
    for station in sim.get_stations().values() {
        assert!(station.get_active().len() <= station.get_capacity());
    }
    let state = sim.get_state();
    for vehicle in state.vehicles() {
        assert!(vehicle.get_range_km() >= 0.0);
        assert!(vehicle.get_range_km() <= vehicle.get_max_range_km());
    }
    for request in state.pending() {
        assert_eq!(request.get_vehicle(), None);
    }
    for request in state.active() {
        let vid = request.get_vehicle().unwrap();
        assert_eq!(state.get_vehicle(vid).unwrap().get_request(), Some(request.id));
    }
    for request in state.finished() {
        assert!(request.get_state().is_terminal());
    }
    let metrics = sim.metrics();
    assert_eq!(metrics.total_requests, metrics.counters.requests_created as usize);
}
