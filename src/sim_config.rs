use std::path::{Path, PathBuf};

use yaml_rust::Yaml;

use super::city_graph::CostMetric;
use super::config_utils;
use super::planner::PlannerPenalties;
use super::search::SearchStrategy;
use super::vehicle::{Propulsion, VehicleCategory, VehicleKind};
use super::FleetError;
use super::SimConfig;


/// Where the simulator gets its city from.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphSource {
    File(PathBuf),
    Grid {width: usize, height: usize, spacing_km: f64, num_stations: usize},
}

/// One vehicle of the initial fleet.  Without a node it starts at a random one.
#[derive(Clone, Debug, PartialEq)]
pub struct FleetEntry {
    pub kind: VehicleKind,
    pub node: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FleetSimConfig {
    pub graph: GraphSource,
    pub request_schedule_path: Option<PathBuf>,
    pub seed: u64,
    pub num_ticks: u32,
    pub strategy: SearchStrategy,
    pub route_metric: CostMetric,
    pub avg_speed_kmh: f64,
    pub range_safety_margin: f64,
    pub recharge_threshold: f64,
    pub critical_range_threshold: f64,
    pub escalation_fraction: f64,
    pub planner_max_iterations: usize,
    pub max_edges_per_tick: usize,
    pub electric_recovery_km_per_min: f64,
    pub combustion_recovery_km_per_min: f64,
    pub penalties: PlannerPenalties,
    // random demand; set the probability to 0 to only use scheduled and manual requests
    pub random_request_probability: f64,
    pub premium_probability: f64,
    pub large_party_probability: f64,
    pub normal_max_wait_min: f64,
    pub premium_max_wait_min: f64,
    pub fare_base: f64,
    pub fare_per_km: f64,
    pub premium_fare_multiplier: f64,
    pub fleet: Vec<FleetEntry>,
}

/// Two electric and two combustion taxis, plus one XL of each.
pub fn default_fleet() -> Vec<FleetEntry> {
    let mut fleet = vec![];
    let taxi_e = VehicleKind::new(VehicleCategory::Standard, Propulsion::Electric);
    let taxi_c = VehicleKind::new(VehicleCategory::Standard, Propulsion::Combustion);
    let xl_e = VehicleKind::new(VehicleCategory::Large, Propulsion::Electric);
    let xl_c = VehicleKind::new(VehicleCategory::Large, Propulsion::Combustion);
    for kind in &[taxi_e, taxi_e, taxi_c, taxi_c, xl_e, xl_c] {
        fleet.push(FleetEntry {kind: *kind, node: None});
    }
    fleet
}

impl Default for FleetSimConfig {
    fn default() -> Self {
        FleetSimConfig {
            graph: GraphSource::Grid {width: 6, height: 6, spacing_km: 0.5, num_stations: 4},
            request_schedule_path: None,
            seed: 100,
            num_ticks: 120,
            strategy: SearchStrategy::AStar,
            route_metric: CostMetric::Time,
            avg_speed_kmh: 40.0,
            range_safety_margin: 1.2,
            recharge_threshold: 0.3,
            critical_range_threshold: 0.15,
            escalation_fraction: 0.7,
            planner_max_iterations: 50,
            max_edges_per_tick: 10,
            electric_recovery_km_per_min: 20.0,
            combustion_recovery_km_per_min: 70.0,
            penalties: PlannerPenalties::default(),
            random_request_probability: 0.3,
            premium_probability: 0.2,
            large_party_probability: 0.3,
            normal_max_wait_min: 60.0,
            premium_max_wait_min: 30.0,
            fare_base: 3.0,
            fare_per_km: 1.2,
            premium_fare_multiplier: 1.5,
            fleet: default_fleet(),
        }
    }
}

impl FleetSimConfig {
    pub fn from_file(path: &str) -> Result<FleetSimConfig, FleetError> {
        let path = Path::new(path);
        let yaml_cfg = config_utils::yaml_from_path(path)?;
        let config_dir = match path.parent() {
            Some(dir) => dir,
            None => Path::new("."),
        };
        FleetSimConfig::from_yaml(&yaml_cfg, config_dir)
    }

    /// Every key is optional; missing keys take their default.  Relative paths are relative
    /// to `config_dir`.
    pub fn from_yaml(yaml_cfg: &Yaml, config_dir: &Path) -> Result<FleetSimConfig, FleetError> {
        let dflt = FleetSimConfig::default();
        let dpen = &dflt.penalties;

        let graph = if let Some(graph_path) = config_utils::yaml_opt_str(yaml_cfg, "graph_path") {
            GraphSource::File(config_utils::str_to_absolute_path(graph_path, config_dir))
        } else if !yaml_cfg["grid"].is_badvalue() {
            let grid = &yaml_cfg["grid"];
            GraphSource::Grid {
                width: config_utils::yaml_u32(grid, "width", 6)? as usize,
                height: config_utils::yaml_u32(grid, "height", 6)? as usize,
                spacing_km: config_utils::yaml_f64(grid, "spacing_km", 0.5)?,
                num_stations: config_utils::yaml_u32(grid, "stations", 4)? as usize,
            }
        } else {
            dflt.graph.clone()
        };

        let request_schedule_path = config_utils::yaml_opt_str(yaml_cfg, "request_schedule_path")
            .map(|pp| config_utils::str_to_absolute_path(pp, config_dir));

        let strategy = match config_utils::yaml_opt_str(yaml_cfg, "strategy") {
            Some(name) => name.parse()?,
            None => dflt.strategy,
        };
        let route_metric = match config_utils::yaml_opt_str(yaml_cfg, "route_metric") {
            Some(name) => name.parse()?,
            None => dflt.route_metric,
        };

        let fleet = match yaml_cfg["fleet"].as_vec() {
            Some(entries) => entries.iter().map(parse_fleet_entry)
                                    .collect::<Result<Vec<_>, _>>()?,
            None => dflt.fleet.clone(),
        };

        let cfg = FleetSimConfig {
            graph,
            request_schedule_path,
            seed: config_utils::yaml_u32(yaml_cfg, "seed", dflt.seed as u32)? as u64,
            num_ticks: config_utils::yaml_u32(yaml_cfg, "num_ticks", dflt.num_ticks)?,
            strategy,
            route_metric,
            avg_speed_kmh: config_utils::yaml_f64(yaml_cfg, "avg_speed_kmh",
                                                  dflt.avg_speed_kmh)?,
            range_safety_margin: config_utils::yaml_f64(yaml_cfg, "range_safety_margin",
                                                        dflt.range_safety_margin)?,
            recharge_threshold: config_utils::yaml_f64(yaml_cfg, "recharge_threshold",
                                                       dflt.recharge_threshold)?,
            critical_range_threshold: config_utils::yaml_f64(yaml_cfg, "critical_range_threshold",
                                                             dflt.critical_range_threshold)?,
            escalation_fraction: config_utils::yaml_f64(yaml_cfg, "escalation_fraction",
                                                        dflt.escalation_fraction)?,
            planner_max_iterations: config_utils::yaml_u32(
                yaml_cfg, "planner_max_iterations", dflt.planner_max_iterations as u32)? as usize,
            max_edges_per_tick: config_utils::yaml_u32(
                yaml_cfg, "max_edges_per_tick", dflt.max_edges_per_tick as u32)? as usize,
            electric_recovery_km_per_min: config_utils::yaml_f64(
                yaml_cfg, "electric_recovery_km_per_min", dflt.electric_recovery_km_per_min)?,
            combustion_recovery_km_per_min: config_utils::yaml_f64(
                yaml_cfg, "combustion_recovery_km_per_min",
                dflt.combustion_recovery_km_per_min)?,
            penalties: PlannerPenalties {
                electric_only: config_utils::yaml_f64(yaml_cfg, "electric_only_penalty",
                                                      dpen.electric_only)?,
                prefers_electric: config_utils::yaml_f64(yaml_cfg, "prefers_electric_penalty",
                                                         dpen.prefers_electric)?,
                zone: config_utils::yaml_f64(yaml_cfg, "zone_penalty", dpen.zone)?,
                center_balance_fraction: config_utils::yaml_f64(
                    yaml_cfg, "center_balance_fraction", dpen.center_balance_fraction)?,
                no_vehicle: config_utils::yaml_f64(yaml_cfg, "no_vehicle_penalty",
                                                   dpen.no_vehicle)?,
                unserved_request: config_utils::yaml_f64(yaml_cfg, "unserved_request_penalty",
                                                         dpen.unserved_request)?,
                fallback_cost_per_km: config_utils::yaml_f64(yaml_cfg, "fallback_cost_per_km",
                                                             dpen.fallback_cost_per_km)?,
            },
            random_request_probability: config_utils::yaml_f64(
                yaml_cfg, "random_request_probability", dflt.random_request_probability)?,
            premium_probability: config_utils::yaml_f64(yaml_cfg, "premium_probability",
                                                        dflt.premium_probability)?,
            large_party_probability: config_utils::yaml_f64(yaml_cfg, "large_party_probability",
                                                            dflt.large_party_probability)?,
            normal_max_wait_min: config_utils::yaml_f64(yaml_cfg, "normal_max_wait_min",
                                                        dflt.normal_max_wait_min)?,
            premium_max_wait_min: config_utils::yaml_f64(yaml_cfg, "premium_max_wait_min",
                                                         dflt.premium_max_wait_min)?,
            fare_base: config_utils::yaml_f64(yaml_cfg, "fare_base", dflt.fare_base)?,
            fare_per_km: config_utils::yaml_f64(yaml_cfg, "fare_per_km", dflt.fare_per_km)?,
            premium_fare_multiplier: config_utils::yaml_f64(yaml_cfg, "premium_fare_multiplier",
                                                            dflt.premium_fare_multiplier)?,
            fleet,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects values the engine can't run with.  `Simulation::new` calls this too, since every
    /// field is public.
    pub(crate) fn validate(&self) -> Result<(), FleetError> {
        for (name, value) in &[("recharge_threshold", self.recharge_threshold),
                               ("critical_range_threshold", self.critical_range_threshold),
                               ("escalation_fraction", self.escalation_fraction),
                               ("random_request_probability", self.random_request_probability),
                               ("premium_probability", self.premium_probability),
                               ("large_party_probability", self.large_party_probability)] {
            if !(0.0..=1.0).contains(value) {
                return Err(FleetError::InvalidConfig(
                    format!("{} must be between 0 and 1, got {}", name, value)));
            }
        }
        for (name, value) in &[("avg_speed_kmh", self.avg_speed_kmh),
                               ("range_safety_margin", self.range_safety_margin),
                               ("electric_recovery_km_per_min", self.electric_recovery_km_per_min),
                               ("combustion_recovery_km_per_min",
                                self.combustion_recovery_km_per_min)] {
            if !(*value > 0.0) {
                return Err(FleetError::InvalidConfig(
                    format!("{} must be positive, got {}", name, value)));
            }
        }
        for (name, value) in &[("planner_max_iterations", self.planner_max_iterations),
                               ("max_edges_per_tick", self.max_edges_per_tick)] {
            if *value < 1 {
                return Err(FleetError::InvalidConfig(
                    format!("{} must be at least 1, got {}", name, value)));
            }
        }
        if self.critical_range_threshold > self.recharge_threshold {
            log::warn!("critical range threshold {} is above the recharge threshold {}",
                       self.critical_range_threshold, self.recharge_threshold);
        }
        Ok(())
    }
}

fn parse_fleet_entry(entry: &Yaml) -> Result<FleetEntry, FleetError> {
    let category = match entry["category"].as_str() {
        Some(name) => name.parse::<VehicleCategory>()?,
        None => return Err(FleetError::InvalidConfig(String::from("fleet entry needs a category"))),
    };
    let propulsion = match entry["propulsion"].as_str() {
        Some(name) => name.parse::<Propulsion>()?,
        None => return Err(FleetError::InvalidConfig(
            String::from("fleet entry needs a propulsion"))),
    };
    Ok(FleetEntry {
        kind: VehicleKind::new(category, propulsion),
        node: entry["node"].as_str().map(String::from),
    })
}

impl SimConfig for FleetSimConfig {
    fn get_avg_speed_kmh(&self) -> f64 {
        self.avg_speed_kmh
    }

    fn get_range_safety_margin(&self) -> f64 {
        self.range_safety_margin
    }

    fn get_critical_range_threshold(&self) -> f64 {
        self.critical_range_threshold
    }

    fn get_planner_max_iterations(&self) -> usize {
        self.planner_max_iterations
    }

    fn get_electric_recovery_rate(&self) -> f64 {
        self.electric_recovery_km_per_min
    }

    fn get_combustion_recovery_rate(&self) -> f64 {
        self.combustion_recovery_km_per_min
    }

    fn get_penalties(&self) -> &PlannerPenalties {
        &self.penalties
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use yaml_rust::YamlLoader;

    fn parse(text: &str) -> Result<FleetSimConfig, FleetError> {
        let docs = YamlLoader::load_from_str(text).unwrap();
        FleetSimConfig::from_yaml(&docs[0], Path::new("/envs/city"))
    }

    #[test]
    fn test_defaults() {
        let cfg = parse("seed: 7").unwrap();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.strategy, SearchStrategy::AStar);
        assert_eq!(cfg.fleet.len(), 6);
        assert_eq!(cfg.penalties, PlannerPenalties::default());
        assert_eq!(cfg.dist_to_drive_time(10.), 15.);
    }

    #[test]
    fn test_full_config() {
        let cfg = parse(r#"
graph_path: city.json
request_schedule_path: /abs/requests.csv
strategy: greedy
route_metric: distance
zone_penalty: 50
recharge_threshold: 0.25
fleet:
  - {category: standard, propulsion: electric, node: A}
  - {category: xl, propulsion: combustion}
"#).unwrap();
        assert_eq!(cfg.graph, GraphSource::File(PathBuf::from("/envs/city/city.json")));
        assert_eq!(cfg.request_schedule_path, Some(PathBuf::from("/abs/requests.csv")));
        assert_eq!(cfg.strategy, SearchStrategy::Greedy);
        assert_eq!(cfg.route_metric, CostMetric::Distance);
        assert_eq!(cfg.penalties.zone, 50.);
        assert_eq!(cfg.recharge_threshold, 0.25);
        assert_eq!(cfg.fleet.len(), 2);
        assert_eq!(cfg.fleet[0].node, Some(String::from("A")));
        assert_eq!(cfg.fleet[1].kind.capacity(), 6);
    }

    #[test]
    fn test_grid_config() {
        let cfg = parse("grid: {width: 3, height: 2, spacing_km: 1}").unwrap();
        assert_eq!(cfg.graph, GraphSource::Grid {width: 3, height: 2, spacing_km: 1.0,
                                                 num_stations: 4});
    }

    #[test]
    fn test_bad_config() {
        assert!(matches!(parse("strategy: teleport"), Err(FleetError::UnknownStrategy(_))));
        assert!(matches!(parse("recharge_threshold: 3"), Err(FleetError::InvalidConfig(_))));
        assert!(matches!(parse("fleet: [{category: standard}]"),
                         Err(FleetError::InvalidConfig(_))));
        assert!(matches!(parse("avg_speed_kmh: 0"), Err(FleetError::InvalidConfig(_))));
        assert!(matches!(parse("max_edges_per_tick: 0"), Err(FleetError::InvalidConfig(_))));
        assert!(matches!(parse("planner_max_iterations: 0"),
                         Err(FleetError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_struct() {
        let mut cfg = FleetSimConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.random_request_probability = 1.5;
        assert!(matches!(cfg.validate(), Err(FleetError::InvalidConfig(_))));
        cfg.random_request_probability = f64::NAN;
        assert!(matches!(cfg.validate(), Err(FleetError::InvalidConfig(_))));
    }
}
