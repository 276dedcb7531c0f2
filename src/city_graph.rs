// this file defines the road network of the simulated city.  It's a wrapper around a petgraph
// DiGraphMap whose nodes are dense usize indices; string ids are only used at the edges of the
// API and in the json files.
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::path::Path;
use std::str::FromStr;

use itertools::iproduct;
use petgraph::algo::has_path_connecting;
use petgraph::algo::kosaraju_scc;
use petgraph::graphmap::DiGraphMap;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::geometry::Point2d;
use super::vehicle::Propulsion;
use super::FleetError;


/// Speed used to derive an edge's base travel time when none is given.
pub const DEFAULT_SPEED_KMH: f64 = 40.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Intersection,
    ChargingStation,
    FuelStation,
    // serves both electric and combustion vehicles
    Mixed,
}

impl NodeCategory {
    pub fn is_station(&self) -> bool {
        return *self != NodeCategory::Intersection;
    }

    pub fn serves(&self, propulsion: Propulsion) -> bool {
        match (self, propulsion) {
            (NodeCategory::Mixed, _) => true,
            (NodeCategory::ChargingStation, Propulsion::Electric) => true,
            (NodeCategory::FuelStation, Propulsion::Combustion) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Center,
    Periphery,
}

impl Default for Zone {
    fn default() -> Self {
        Zone::Periphery
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostMetric {
    Distance,
    Time,
}

impl FromStr for CostMetric {
    type Err = FleetError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_lowercase().as_str() {
            "distance" => Ok(CostMetric::Distance),
            "time" => Ok(CostMetric::Time),
            _ => Err(FleetError::InvalidConfig(format!("unknown route metric {}", name))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CityNode {
    pub id: String,
    pub pos: Point2d,
    pub name: String,
    pub category: NodeCategory,
    pub charging_capacity: u32,
    pub zone: Zone,
}

impl CityNode {
    pub fn new(id: &str, pos: Point2d, category: NodeCategory) -> CityNode {
        CityNode {
            id: String::from(id),
            pos,
            name: String::from(id),
            category,
            charging_capacity: 0,
            zone: Zone::default(),
        }
    }

    pub fn with_zone(mut self, zone: Zone) -> CityNode {
        self.zone = zone;
        self
    }

    pub fn with_charging_capacity(mut self, capacity: u32) -> CityNode {
        self.charging_capacity = capacity;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoadSegment {
    pub distance_km: f64,
    pub base_time_min: f64,
    congestion: f64,
}

impl RoadSegment {
    pub fn new(distance_km: f64, base_time_min: Option<f64>) -> RoadSegment {
        let base_time_min = match base_time_min {
            Some(bt) => bt,
            None => distance_km / DEFAULT_SPEED_KMH * 60.0,
        };
        RoadSegment {distance_km, base_time_min, congestion: 1.0}
    }

    pub fn get_congestion(&self) -> f64 {
        self.congestion
    }

    pub fn travel_time_min(&self) -> f64 {
        self.base_time_min * self.congestion
    }

    pub fn cost(&self, metric: CostMetric) -> f64 {
        match metric {
            CostMetric::Distance => self.distance_km,
            CostMetric::Time => self.travel_time_min(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GraphStats {
    pub num_nodes: usize,
    pub num_edges: usize,
    pub directed: bool,
    pub nodes_by_category: BTreeMap<NodeCategory, usize>,
    pub mean_out_degree: f64,
    pub mean_congestion: f64,
    pub num_components: usize,
}

#[derive(Clone, Debug)]
pub struct CityGraph {
    directed: bool,
    nodes: Vec<CityNode>,
    node_idxs_by_id: HashMap<String, usize>,
    network: DiGraphMap<usize, RoadSegment>,
}

impl CityGraph {
    pub fn new(directed: bool) -> CityGraph {
        CityGraph {
            directed,
            nodes: vec![],
            node_idxs_by_id: HashMap::new(),
            network: DiGraphMap::new(),
        }
    }

    /// Adds a node, or replaces the attributes of the node with the same id.  Returns its index.
    pub fn add_node(&mut self, node: CityNode) -> usize {
        if let Some(&idx) = self.node_idxs_by_id.get(&node.id) {
            self.nodes[idx] = node;
            return idx;
        }
        let idx = self.nodes.len();
        log::debug!("inserting {}, {}", node.id, idx);
        self.node_idxs_by_id.insert(node.id.clone(), idx);
        self.nodes.push(node);
        self.network.add_node(idx);
        return idx;
    }

    /// Adds a road between two existing nodes.  A missing distance defaults to the euclidean
    /// distance between the nodes.  On an undirected graph the reverse direction is added too.
    pub fn add_edge(&mut self, origin: &str, destination: &str, distance_km: Option<f64>,
                    base_time_min: Option<f64>) -> Result<(), FleetError> {
        let orig_idx = self.resolve(origin)?;
        let dest_idx = self.resolve(destination)?;
        let distance_km = match distance_km {
            Some(dd) => dd,
            None => self.euclidean(orig_idx, dest_idx),
        };
        let segment = RoadSegment::new(distance_km, base_time_min);
        self.network.add_edge(orig_idx, dest_idx, segment.clone());
        if !self.directed {
            self.network.add_edge(dest_idx, orig_idx, segment);
        }
        Ok(())
    }

    /// Sets the congestion factor on a road.  Both directions change on an undirected graph.
    pub fn update_congestion(&mut self, origin: &str, destination: &str, factor: f64)
                             -> Result<(), FleetError> {
        if !(factor >= 1.0) {
            return Err(FleetError::InvalidCongestion(factor));
        }
        let orig_idx = self.resolve(origin)?;
        let dest_idx = self.resolve(destination)?;
        let mut pairs = vec![(orig_idx, dest_idx)];
        if !self.directed {
            pairs.push((dest_idx, orig_idx));
        }
        for (from_idx, to_idx) in pairs {
            match self.network.edge_weight_mut(from_idx, to_idx) {
                Some(segment) => segment.congestion = factor,
                None => return Err(FleetError::InvalidPath(
                    format!("no road from {} to {}", origin, destination))),
            }
        }
        log::debug!("congestion on {} -> {} set to {}", origin, destination, factor);
        Ok(())
    }

    pub fn resolve(&self, id: &str) -> Result<usize, FleetError> {
        match self.node_idxs_by_id.get(id) {
            Some(idx) => Ok(*idx),
            None => Err(FleetError::UnknownNode(String::from(id))),
        }
    }

    pub fn get_node_idx_by_id(&self, id: &str) -> Option<usize> {
        self.node_idxs_by_id.get(id).cloned()
    }

    pub fn get_node_id_by_idx(&self, idx: usize) -> Option<&str> {
        self.nodes.get(idx).map(|node| node.id.as_str())
    }

    pub fn get_node(&self, idx: usize) -> Option<&CityNode> {
        self.nodes.get(idx)
    }

    pub fn get_nodes(&self) -> &Vec<CityNode> {
        &self.nodes
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_idxs_by_id.contains_key(id)
    }

    pub fn contains_idx(&self, idx: usize) -> bool {
        idx < self.nodes.len()
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn get_num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// The number of directed edge records; an undirected road counts twice.
    pub fn get_num_edges(&self) -> usize {
        self.network.edge_count()
    }

    pub fn neighbors(&self, idx: usize) -> impl Iterator<Item = (usize, &RoadSegment)> + '_ {
        self.network.edges(idx).map(|(_, to_idx, segment)| (to_idx, segment))
    }

    pub fn segment(&self, from_idx: usize, to_idx: usize) -> Option<&RoadSegment> {
        self.network.edge_weight(from_idx, to_idx)
    }

    /// Straight-line distance between two nodes; infinite if either is missing.
    pub fn euclidean(&self, from_idx: usize, to_idx: usize) -> f64 {
        match (self.nodes.get(from_idx), self.nodes.get(to_idx)) {
            (Some(aa), Some(bb)) => aa.pos.euclidean_distance(&bb.pos),
            _ => f64::INFINITY,
        }
    }

    pub fn validate_path(&self, path: &[usize]) -> bool {
        if path.is_empty() || !path.iter().all(|idx| self.contains_idx(*idx)) {
            return false;
        }
        path.windows(2).all(|pair| self.network.contains_edge(pair[0], pair[1]))
    }

    pub fn path_cost(&self, path: &[usize], metric: CostMetric) -> Result<f64, FleetError> {
        if path.is_empty() {
            return Err(FleetError::InvalidPath(String::from("empty path")));
        }
        let mut total = 0.0;
        for pair in path.windows(2) {
            match self.segment(pair[0], pair[1]) {
                Some(segment) => total += segment.cost(metric),
                None => return Err(FleetError::InvalidPath(
                    format!("no road from {} to {}", self.describe(pair[0]),
                            self.describe(pair[1])))),
            }
        }
        Ok(total)
    }

    pub fn has_path(&self, from_idx: usize, to_idx: usize) -> bool {
        if !self.contains_idx(from_idx) || !self.contains_idx(to_idx) {
            return false;
        }
        has_path_connecting(&self.network, from_idx, to_idx, None)
    }

    /// Strongly connected components, largest first.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut comps = kosaraju_scc(&self.network);
        comps.sort_by(|c1, c2| c2.len().cmp(&c1.len()));
        if comps.len() > 1 {
            log::warn!("there are {} connected components", comps.len());
        }
        comps
    }

    pub fn nodes_by_category(&self, category: NodeCategory) -> Vec<usize> {
        (0..self.nodes.len()).filter(|idx| self.nodes[*idx].category == category).collect()
    }

    pub fn nodes_in_zone(&self, zone: Zone) -> Vec<usize> {
        (0..self.nodes.len()).filter(|idx| self.nodes[*idx].zone == zone).collect()
    }

    /// All station nodes able to serve vehicles of the given propulsion.
    pub fn station_nodes(&self, propulsion: Propulsion) -> Vec<usize> {
        (0..self.nodes.len()).filter(|idx| self.nodes[*idx].category.serves(propulsion))
                             .collect()
    }

    pub fn stats(&self) -> GraphStats {
        let mut nodes_by_category = BTreeMap::new();
        for node in &self.nodes {
            *nodes_by_category.entry(node.category).or_insert(0) += 1;
        }
        let num_edges = self.get_num_edges();
        let mean_out_degree = if self.nodes.is_empty() {
            0.0
        } else {
            num_edges as f64 / self.nodes.len() as f64
        };
        let mean_congestion = if num_edges == 0 {
            1.0
        } else {
            self.network.all_edges().map(|(_, _, ss)| ss.congestion).sum::<f64>() /
                num_edges as f64
        };
        GraphStats {
            num_nodes: self.nodes.len(),
            num_edges,
            directed: self.directed,
            nodes_by_category,
            mean_out_degree,
            mean_congestion,
            num_components: kosaraju_scc(&self.network).len(),
        }
    }

    fn describe(&self, idx: usize) -> String {
        match self.get_node_id_by_idx(idx) {
            Some(id) => String::from(id),
            None => format!("#{}", idx),
        }
    }

    pub fn from_json_str(contents: &str) -> Result<CityGraph, FleetError> {
        let file: GraphFile = serde_json::from_str(contents)?;
        return CityGraph::from_graph_file(file);
    }

    pub fn load(path: &Path) -> Result<CityGraph, FleetError> {
        let reader = BufReader::new(File::open(path)?);
        let file: GraphFile = serde_json::from_reader(reader)?;
        let graph = CityGraph::from_graph_file(file)?;
        log::info!("loaded city graph from {}: {} nodes, {} edges", path.display(),
                   graph.get_num_nodes(), graph.get_num_edges());
        Ok(graph)
    }

    fn from_graph_file(file: GraphFile) -> Result<CityGraph, FleetError> {
        let mut graph = CityGraph::new(file.directed);
        for (id, record) in file.nodes {
            let node = CityNode {
                name: if record.name.is_empty() { id.clone() } else { record.name },
                id,
                pos: Point2d::from_array(record.coords),
                category: record.category,
                charging_capacity: record.charging_capacity,
                zone: record.zone,
            };
            graph.add_node(node);
        }

        // undirected files may list a road in one or both directions
        let mut seen_roads = HashSet::new();
        for edge in file.edges {
            if !graph.directed {
                let key = if edge.origin <= edge.destination {
                    (edge.origin.clone(), edge.destination.clone())
                } else {
                    (edge.destination.clone(), edge.origin.clone())
                };
                if !seen_roads.insert(key) {
                    continue;
                }
            }
            graph.add_edge(&edge.origin, &edge.destination, edge.distance, edge.base_time)?;
            if edge.congestion != 1.0 {
                graph.update_congestion(&edge.origin, &edge.destination, edge.congestion)?;
            }
        }
        Ok(graph)
    }

    fn to_graph_file(&self) -> GraphFile {
        let mut nodes = BTreeMap::new();
        for node in &self.nodes {
            nodes.insert(node.id.clone(), NodeRecord {
                category: node.category,
                coords: node.pos.as_array(),
                name: node.name.clone(),
                charging_capacity: node.charging_capacity,
                zone: node.zone,
            });
        }
        let edges = self.network.all_edges().map(|(from_idx, to_idx, segment)| EdgeRecord {
            origin: self.nodes[from_idx].id.clone(),
            destination: self.nodes[to_idx].id.clone(),
            distance: Some(segment.distance_km),
            base_time: Some(segment.base_time_min),
            congestion: segment.congestion,
        }).collect();
        GraphFile {directed: self.directed, nodes, edges}
    }

    pub fn to_json_string(&self) -> Result<String, FleetError> {
        Ok(serde_json::to_string_pretty(&self.to_graph_file())?)
    }

    /// Writes every directed edge record, so undirected roads appear once per direction.
    pub fn save(&self, path: &Path) -> Result<(), FleetError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.to_graph_file())?;
        Ok(())
    }

    /// Builds an undirected `width` x `height` grid city with `spacing_km` between neighbouring
    /// intersections.  The middle of the grid is the center zone, and a few randomly chosen
    /// intersections become stations.
    pub fn grid<R: Rng>(width: usize, height: usize, spacing_km: f64, num_stations: usize,
                        rng: &mut R) -> Result<CityGraph, FleetError> {
        let mut graph = CityGraph::new(false);
        let grid_id = |xx: usize, yy: usize| format!("N{}_{}", xx, yy);
        let in_center = |ii: usize, size: usize| 4 * ii >= size && 4 * ii < 3 * size;
        for (yy, xx) in iproduct!(0..height, 0..width) {
            let zone = if in_center(xx, width) && in_center(yy, height) {
                Zone::Center
            } else {
                Zone::Periphery
            };
            let pos = Point2d::new(xx as f64 * spacing_km, yy as f64 * spacing_km);
            graph.add_node(CityNode::new(&grid_id(xx, yy), pos, NodeCategory::Intersection)
                           .with_zone(zone));
        }

        for (yy, xx) in iproduct!(0..height, 0..width) {
            let here = grid_id(xx, yy);
            let mut targets = vec![];
            if xx + 1 < width {
                targets.push(grid_id(xx + 1, yy));
            }
            if yy + 1 < height {
                targets.push(grid_id(xx, yy + 1));
            }
            for there in targets {
                graph.add_edge(&here, &there, None, None)?;
                let congestion = rng.gen_range(1.0..1.5);
                graph.update_congestion(&here, &there, congestion)?;
            }
        }

        // alternate charging and fuel stations, with the last one serving both
        let all_idxs: Vec<usize> = (0..graph.nodes.len()).collect();
        let station_idxs: Vec<usize> = all_idxs.choose_multiple(rng, num_stations).cloned()
                                               .collect();
        for (ii, idx) in station_idxs.iter().enumerate() {
            let category = if ii + 1 == num_stations && num_stations > 2 {
                NodeCategory::Mixed
            } else if ii % 2 == 0 {
                NodeCategory::ChargingStation
            } else {
                NodeCategory::FuelStation
            };
            let node = &mut graph.nodes[*idx];
            node.category = category;
            node.charging_capacity = 2;
        }
        Ok(graph)
    }
}


#[derive(Serialize, Deserialize)]
struct GraphFile {
    directed: bool,
    nodes: BTreeMap<String, NodeRecord>,
    edges: Vec<EdgeRecord>,
}

#[derive(Serialize, Deserialize)]
struct NodeRecord {
    category: NodeCategory,
    coords: [f64; 2],
    #[serde(default)]
    name: String,
    #[serde(default)]
    charging_capacity: u32,
    #[serde(default)]
    zone: Zone,
}

fn default_congestion() -> f64 {
    1.0
}

#[derive(Serialize, Deserialize)]
struct EdgeRecord {
    origin: String,
    destination: String,
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    base_time: Option<f64>,
    #[serde(default = "default_congestion")]
    congestion: f64,
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::super::test_utils::square_city;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_isaac::Isaac64Rng;

    #[test]
    fn test_add_edge_defaults() {
        let mut graph = CityGraph::new(false);
        graph.add_node(CityNode::new("A", Point2d::new(0., 0.), NodeCategory::Intersection));
        graph.add_node(CityNode::new("B", Point2d::new(3., 4.), NodeCategory::Intersection));
        graph.add_edge("A", "B", None, None).unwrap();
        assert_eq!(graph.get_num_edges(), 2);

        let segment = graph.segment(0, 1).unwrap();
        assert_relative_eq!(segment.distance_km, 5.0);
        // 5 km at 40 km/h
        assert_relative_eq!(segment.base_time_min, 7.5);
        assert_eq!(graph.segment(1, 0), Some(segment));

        match graph.add_edge("A", "Z", None, None) {
            Err(FleetError::UnknownNode(id)) => assert_eq!(id, "Z"),
            other => panic!("expected unknown node, got {:?}", other),
        }
    }

    #[test]
    fn test_directed_edges() {
        let mut graph = CityGraph::new(true);
        graph.add_node(CityNode::new("A", Point2d::new(0., 0.), NodeCategory::Intersection));
        graph.add_node(CityNode::new("B", Point2d::new(1., 0.), NodeCategory::Intersection));
        graph.add_edge("A", "B", Some(2.0), Some(3.0)).unwrap();
        assert_eq!(graph.get_num_edges(), 1);
        assert!(graph.has_path(0, 1));
        assert!(!graph.has_path(1, 0));
        assert_eq!(graph.components().len(), 2);
    }

    #[test]
    fn test_congestion_mirrored() {
        let mut graph = square_city();
        let aa = graph.resolve("A").unwrap();
        let bb = graph.resolve("B").unwrap();
        graph.update_congestion("A", "B", 2.0).unwrap();
        assert_relative_eq!(graph.segment(aa, bb).unwrap().travel_time_min(), 3.0);
        assert_relative_eq!(graph.segment(bb, aa).unwrap().travel_time_min(), 3.0);
        assert_relative_eq!(graph.segment(aa, bb).unwrap().distance_km, 1.0);

        assert!(matches!(graph.update_congestion("A", "B", 0.5),
                         Err(FleetError::InvalidCongestion(_))));
        assert!(matches!(graph.update_congestion("A", "C", 1.5),
                         Err(FleetError::InvalidPath(_))));
    }

    #[test]
    fn test_path_cost() {
        let graph = square_city();
        let path: Vec<usize> = ["A", "B", "C"].iter().map(|id| graph.resolve(id).unwrap())
                                               .collect();
        assert!(graph.validate_path(&path));
        assert_relative_eq!(graph.path_cost(&path, CostMetric::Distance).unwrap(), 2.0);
        assert_relative_eq!(graph.path_cost(&path, CostMetric::Time).unwrap(), 3.0);
        assert_relative_eq!(graph.path_cost(&path[..1], CostMetric::Time).unwrap(), 0.0);

        let bad_path = vec![path[0], path[2]];
        assert!(!graph.validate_path(&bad_path));
        assert!(graph.path_cost(&bad_path, CostMetric::Distance).is_err());
        assert!(graph.path_cost(&[], CostMetric::Distance).is_err());
    }

    #[test]
    fn test_queries() {
        let graph = square_city();
        let dd = graph.resolve("D").unwrap();
        assert_eq!(graph.station_nodes(Propulsion::Electric), vec![dd]);
        assert!(graph.station_nodes(Propulsion::Combustion).is_empty());
        assert_eq!(graph.nodes_by_category(NodeCategory::ChargingStation), vec![dd]);
        assert_eq!(graph.nodes_in_zone(Zone::Center).len(), 1);
        assert_relative_eq!(graph.euclidean(0, 2), 2f64.sqrt());
        assert!(graph.euclidean(0, 99).is_infinite());

        let stats = graph.stats();
        assert_eq!(stats.num_nodes, 4);
        assert_eq!(stats.num_edges, 8);
        assert_eq!(stats.num_components, 1);
        assert_relative_eq!(stats.mean_out_degree, 2.0);
    }

    #[test]
    fn test_json_round_trip() -> Result<(), FleetError> {
        let mut graph = square_city();
        graph.update_congestion("C", "D", 1.75)?;
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("city.json");
        graph.save(&path)?;

        let loaded = CityGraph::load(&path)?;
        assert_eq!(loaded.get_num_nodes(), graph.get_num_nodes());
        assert_eq!(loaded.get_num_edges(), graph.get_num_edges());
        assert_eq!(loaded.is_directed(), graph.is_directed());
        for node in graph.get_nodes() {
            let other = loaded.get_node(loaded.resolve(&node.id)?).unwrap();
            assert_eq!(other, node);
        }
        for from_idx in 0..graph.get_num_nodes() {
            for (to_idx, segment) in graph.neighbors(from_idx) {
                let lfrom = loaded.resolve(graph.get_node_id_by_idx(from_idx).unwrap())?;
                let lto = loaded.resolve(graph.get_node_id_by_idx(to_idx).unwrap())?;
                assert_eq!(loaded.segment(lfrom, lto), Some(segment));
            }
        }

        // saving the reloaded graph gives the same file
        assert_eq!(loaded.to_json_string()?, graph.to_json_string()?);
        Ok(())
    }

    #[test]
    fn test_load_rejects_unknown_nodes() {
        let contents = r#"{
            "directed": false,
            "nodes": {"A": {"category": "intersection", "coords": [0.0, 0.0]}},
            "edges": [{"origin": "A", "destination": "Q"}]
        }"#;
        match CityGraph::from_json_str(contents) {
            Err(FleetError::UnknownNode(id)) => assert_eq!(id, "Q"),
            other => panic!("expected unknown node, got {:?}", other.map(|gg| gg.stats())),
        }
    }

    #[test]
    fn test_grid_city() {
        let mut rng = Isaac64Rng::seed_from_u64(100);
        let graph = CityGraph::grid(4, 3, 0.5, 3, &mut rng).unwrap();
        assert_eq!(graph.get_num_nodes(), 12);
        // 3 * 3 horizontal + 4 * 2 vertical roads, two directions each
        assert_eq!(graph.get_num_edges(), 2 * (9 + 8));
        assert_eq!(graph.components().len(), 1);
        let num_stations = graph.get_nodes().iter().filter(|nn| nn.category.is_station())
                                .count();
        assert_eq!(num_stations, 3);
        assert_eq!(graph.nodes_by_category(NodeCategory::Mixed).len(), 1);
        assert!(!graph.nodes_in_zone(Zone::Center).is_empty());
        for from_idx in 0..graph.get_num_nodes() {
            for (to_idx, segment) in graph.neighbors(from_idx) {
                assert!(segment.get_congestion() >= 1.0);
                assert_eq!(graph.segment(to_idx, from_idx).unwrap().get_congestion(),
                           segment.get_congestion());
            }
        }

        let single = CityGraph::grid(1, 1, 0.5, 0, &mut rng).unwrap();
        assert_eq!(single.get_num_nodes(), 1);
        assert_eq!(single.get_num_edges(), 0);
    }
}
