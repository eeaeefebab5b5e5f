//! Minimum-cost flow by successive shortest paths.
//!
//! Small networks (tens of couriers and routes per pass), so Bellman-Ford
//! path finding per augmentation is plenty; arc costs may be negative
//! (benefits enter as negated costs) and the prospect graph is acyclic, which
//! keeps the residual network free of negative cycles along shortest-path
//! augmentations.

const EPS: f64 = 1e-9;

#[derive(Debug, Clone)]
struct Edge {
    to: usize,
    /// Remaining residual capacity.
    capacity: f64,
    cost: f64,
}

/// Edge-list network with implicitly paired residual edges (`id ^ 1`).
#[derive(Debug, Default)]
pub struct MinCostFlow {
    edges: Vec<Edge>,
    adjacency: Vec<Vec<usize>>,
}

impl MinCostFlow {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            edges: Vec::new(),
            adjacency: vec![Vec::new(); num_nodes],
        }
    }

    /// Adds a directed arc and returns its id, stable across solving.
    pub fn add_arc(&mut self, from: usize, to: usize, capacity: f64, cost: f64) -> usize {
        let id = self.edges.len();
        self.edges.push(Edge { to, capacity, cost });
        self.edges.push(Edge {
            to: from,
            capacity: 0.0,
            cost: -cost,
        });
        self.adjacency[from].push(id);
        self.adjacency[to].push(id + 1);
        id
    }

    /// Flow pushed through a forward arc so far.
    pub fn flow(&self, arc: usize) -> f64 {
        self.edges[arc ^ 1].capacity
    }

    /// Pushes `required` units from `source` to `sink` at minimum total cost.
    /// Returns the total cost, or `None` when the network cannot carry the
    /// required amount.
    pub fn send(&mut self, source: usize, sink: usize, required: f64) -> Option<f64> {
        let mut remaining = required;
        let mut total_cost = 0.0;

        while remaining > EPS {
            let Some((path, bottleneck)) = self.shortest_augmenting_path(source, sink) else {
                return None;
            };
            let amount = bottleneck.min(remaining);
            for edge_id in path {
                self.edges[edge_id].capacity -= amount;
                self.edges[edge_id ^ 1].capacity += amount;
                total_cost += self.edges[edge_id].cost * amount;
            }
            remaining -= amount;
        }

        Some(total_cost)
    }

    /// Bellman-Ford over residual edges; returns the edge ids of the
    /// cheapest source→sink path and its bottleneck capacity.
    fn shortest_augmenting_path(&self, source: usize, sink: usize) -> Option<(Vec<usize>, f64)> {
        let num_nodes = self.adjacency.len();
        let mut dist = vec![f64::INFINITY; num_nodes];
        let mut parent_edge: Vec<Option<usize>> = vec![None; num_nodes];
        dist[source] = 0.0;

        for _ in 0..num_nodes.saturating_sub(1) {
            let mut relaxed = false;
            for from in 0..num_nodes {
                if dist[from].is_infinite() {
                    continue;
                }
                for &edge_id in &self.adjacency[from] {
                    let edge = &self.edges[edge_id];
                    if edge.capacity <= EPS {
                        continue;
                    }
                    let candidate = dist[from] + edge.cost;
                    if candidate + EPS < dist[edge.to] {
                        dist[edge.to] = candidate;
                        parent_edge[edge.to] = Some(edge_id);
                        relaxed = true;
                    }
                }
            }
            if !relaxed {
                break;
            }
        }

        if dist[sink].is_infinite() {
            return None;
        }

        let mut path = Vec::new();
        let mut bottleneck = f64::INFINITY;
        let mut node = sink;
        while node != source {
            let edge_id = parent_edge[node]?;
            bottleneck = bottleneck.min(self.edges[edge_id].capacity);
            path.push(edge_id);
            node = self.edge_tail(edge_id);
        }
        path.reverse();
        Some((path, bottleneck))
    }

    fn edge_tail(&self, edge_id: usize) -> usize {
        self.edges[edge_id ^ 1].to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_flow_along_the_cheaper_arc() {
        // source → {a, b} → sink, one unit, a cheaper than b.
        let mut network = MinCostFlow::new(4);
        let to_a = network.add_arc(0, 1, 1.0, 0.0);
        let to_b = network.add_arc(0, 2, 1.0, 0.0);
        let a_out = network.add_arc(1, 3, 1.0, 1.0);
        let b_out = network.add_arc(2, 3, 1.0, 5.0);

        let cost = network.send(0, 3, 1.0).expect("feasible");
        assert_eq!(cost, 1.0);
        assert_eq!(network.flow(to_a), 1.0);
        assert_eq!(network.flow(a_out), 1.0);
        assert_eq!(network.flow(to_b), 0.0);
        assert_eq!(network.flow(b_out), 0.0);
    }

    #[test]
    fn negative_costs_attract_flow() {
        let mut network = MinCostFlow::new(4);
        network.add_arc(0, 1, 1.0, 0.0);
        network.add_arc(0, 2, 1.0, 0.0);
        let good = network.add_arc(1, 3, 1.0, -4.0);
        let slack = network.add_arc(2, 3, 1.0, 0.0);

        let cost = network.send(0, 3, 2.0).expect("feasible");
        assert_eq!(cost, -4.0);
        assert_eq!(network.flow(good), 1.0);
        assert_eq!(network.flow(slack), 1.0);
    }

    #[test]
    fn infeasible_demand_returns_none() {
        let mut network = MinCostFlow::new(2);
        network.add_arc(0, 1, 1.0, 0.0);
        assert!(network.send(0, 1, 2.0).is_none());
    }

    #[test]
    fn reroutes_through_residual_edges_for_global_optimum() {
        // Two units: the greedy first path must be partially undone.
        //   0 → 1 (cap 1, cost 0), 0 → 2 (cap 1, cost 10)
        //   1 → 3 (cap 1, cost 0), 1 → 4 (cap 1, cost 1)
        //   2 → 3 (cap 1, cost 0)
        //   3 → 5, 4 → 5 (cap 1, cost 0)
        let mut network = MinCostFlow::new(6);
        network.add_arc(0, 1, 1.0, 0.0);
        network.add_arc(0, 2, 1.0, 10.0);
        network.add_arc(1, 3, 1.0, 0.0);
        network.add_arc(1, 4, 1.0, 1.0);
        network.add_arc(2, 3, 1.0, 0.0);
        network.add_arc(3, 5, 1.0, 0.0);
        network.add_arc(4, 5, 1.0, 0.0);

        let cost = network.send(0, 5, 2.0).expect("feasible");
        assert_eq!(cost, 11.0);
    }
}
