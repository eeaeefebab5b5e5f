//! Network-flow formulation of the matching problem.
//!
//! Nodes are couriers (demand 0), routes (demand −1), and one supply node
//! (demand +|routes|). Arcs are the prospects (cost = −benefit) plus
//! zero-cost arcs from supply to every courier and every route; the latter
//! act as slack, so a route that attracts no courier drains straight from
//! supply and the network is always feasible. Solved as a continuous
//! relaxation; the assignment structure lands the optimum on integral flows,
//! which the caller rounds at [`super::problem::SOLUTION_VALUE`].

use super::flow::MinCostFlow;
use super::problem::MatchingProblem;

#[derive(Debug, Clone, Copy)]
pub struct GraphArc {
    pub from: usize,
    pub to: usize,
    pub cost: f64,
}

/// Explicit sparse graph: per-node demands plus arcs, prospect arcs first.
#[derive(Debug, Clone)]
pub struct Graph {
    pub node_demands: Vec<i64>,
    pub arcs: Vec<GraphArc>,
    pub num_prospect_arcs: usize,
}

/// Node layout: couriers, then routes, then the supply node.
pub fn build(problem: &MatchingProblem) -> Graph {
    let supply = problem.num_couriers + problem.num_routes;

    let mut node_demands = Vec::with_capacity(supply + 1);
    node_demands.extend(std::iter::repeat(0).take(problem.num_couriers));
    node_demands.extend(std::iter::repeat(-1).take(problem.num_routes));
    node_demands.push(problem.num_routes as i64);

    let mut arcs = Vec::with_capacity(problem.prospects.len() + supply);
    for (prospect, benefit) in problem.prospects.iter().zip(&problem.costs) {
        arcs.push(GraphArc {
            from: prospect.courier_ix,
            to: problem.num_couriers + prospect.route_ix,
            cost: -benefit,
        });
    }
    for courier_ix in 0..problem.num_couriers {
        arcs.push(GraphArc {
            from: supply,
            to: courier_ix,
            cost: 0.0,
        });
    }
    for route_ix in 0..problem.num_routes {
        arcs.push(GraphArc {
            from: supply,
            to: problem.num_couriers + route_ix,
            cost: 0.0,
        });
    }

    Graph {
        node_demands,
        arcs,
        num_prospect_arcs: problem.prospects.len(),
    }
}

/// Solves the flow formulation and returns one value per prospect variable,
/// or `None` when the solve failed.
pub fn solve(problem: &MatchingProblem) -> Option<Vec<f64>> {
    if problem.num_routes == 0 {
        return Some(vec![0.0; problem.prospects.len()]);
    }

    let graph = build(problem);
    let supply = problem.num_couriers + problem.num_routes;
    // One virtual sink realizes the route demands as unit-capacity arcs.
    let sink = supply + 1;

    let mut network = MinCostFlow::new(sink + 1);
    let mut prospect_arcs = Vec::with_capacity(graph.num_prospect_arcs);
    for (ix, arc) in graph.arcs.iter().enumerate() {
        let id = network.add_arc(arc.from, arc.to, 1.0, arc.cost);
        if ix < graph.num_prospect_arcs {
            prospect_arcs.push(id);
        }
    }
    for route_ix in 0..problem.num_routes {
        network.add_arc(problem.num_couriers + route_ix, sink, 1.0, 0.0);
    }

    network.send(supply, sink, problem.num_routes as f64)?;

    Some(
        prospect_arcs
            .iter()
            .map(|&arc| network.flow(arc))
            .collect(),
    )
}
