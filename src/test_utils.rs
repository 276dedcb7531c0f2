use super::city_graph::{CityGraph, CityNode, NodeCategory, Zone};
use super::geometry::Point2d;


fn intersection(id: &str, xx: f64, yy: f64) -> CityNode {
    CityNode::new(id, Point2d::new(xx, yy), NodeCategory::Intersection)
}

/// A 1 km square, A-B-C-D-A, undirected.  A is downtown and D is a one-slot charging station.
///
/// D ---- C
/// |      |
/// A ---- B
pub fn square_city() -> CityGraph {
    let mut graph = CityGraph::new(false);
    graph.add_node(intersection("A", 0., 0.).with_zone(Zone::Center));
    graph.add_node(intersection("B", 1., 0.));
    graph.add_node(intersection("C", 1., 1.));
    graph.add_node(CityNode::new("D", Point2d::new(0., 1.), NodeCategory::ChargingStation)
                   .with_charging_capacity(1));
    for (from_id, to_id) in &[("A", "B"), ("B", "C"), ("C", "D"), ("D", "A")] {
        graph.add_edge(from_id, to_id, None, None).unwrap();
    }
    graph
}

/// Four nodes where the straight-line estimates are misleading: the direct road S-G is long,
/// the road through X winds, and the cheapest route goes through Y.
pub fn detour_city() -> CityGraph {
    let mut graph = CityGraph::new(false);
    graph.add_node(intersection("S", 0., 0.));
    graph.add_node(intersection("X", 5., 1.));
    graph.add_node(intersection("Y", 0., 5.));
    graph.add_node(intersection("G", 10., 0.));
    graph.add_edge("S", "X", Some(20.), None).unwrap();
    graph.add_edge("X", "G", Some(20.), None).unwrap();
    graph.add_edge("S", "Y", Some(5.), None).unwrap();
    graph.add_edge("Y", "G", Some(11.5), None).unwrap();
    graph.add_edge("S", "G", Some(30.), None).unwrap();
    graph
}

/// S can only reach G by first stepping away from it, through W.
pub fn dead_end_city() -> CityGraph {
    let mut graph = CityGraph::new(false);
    graph.add_node(intersection("S", 0., 0.));
    graph.add_node(intersection("W", -1., 0.));
    graph.add_node(intersection("G", 5., 0.));
    graph.add_edge("S", "W", None, None).unwrap();
    graph.add_edge("W", "G", None, None).unwrap();
    graph
}
