//! Integer-program formulation of the matching problem.
//!
//! One boolean variable per prospect plus one slack variable per route;
//! constraints are "at most one assignment per courier" and "exactly one of
//! {assigned couriers, slack} per route"; the objective maximizes total
//! benefit. That constraint matrix is an assignment polytope, so the model
//! solves exactly as a rectangular maximum-weight assignment
//! (Kuhn-Munkres) with one zero-benefit slack column per route.

use pathfinding::kuhn_munkres::{kuhn_munkres, Weights};

use super::problem::MatchingProblem;

/// Scale factor converting f64 benefits to i64 weights for the assignment
/// algorithm.
const SCALE: f64 = 1_000_000.0;

/// Weight for non-prospect pairs. Worse than any feasible benefit but small
/// enough that negating and summing cannot overflow i64.
const INFEASIBLE: i64 = -1_000_000_000_000_i64;

/// A decision variable of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    /// x(courier, route) — boolean, 1 when the prospect is selected.
    Prospect(usize),
    /// s(route) — boolean, 1 when the route stays unassigned.
    Slack { route_ix: usize },
}

/// The explicit model: variables with objective coefficients. Constraints
/// are structural (per-courier ≤ 1, per-route + slack = 1) and enforced by
/// the assignment solve.
#[derive(Debug, Clone)]
pub struct MipModel {
    pub variables: Vec<Variable>,
    pub objective: Vec<f64>,
}

pub fn build(problem: &MatchingProblem) -> MipModel {
    let mut variables = Vec::with_capacity(problem.prospects.len() + problem.num_routes);
    let mut objective = Vec::with_capacity(variables.capacity());
    for (ix, benefit) in problem.costs.iter().enumerate() {
        variables.push(Variable::Prospect(ix));
        objective.push(*benefit);
    }
    for route_ix in 0..problem.num_routes {
        variables.push(Variable::Slack { route_ix });
        objective.push(0.0);
    }
    MipModel {
        variables,
        objective,
    }
}

struct I64Weights(Vec<Vec<i64>>);

impl Weights<i64> for I64Weights {
    fn rows(&self) -> usize {
        self.0.len()
    }

    fn columns(&self) -> usize {
        self.0.first().map_or(0, |row| row.len())
    }

    fn at(&self, row: usize, col: usize) -> i64 {
        self.0[row][col]
    }

    fn neg(&self) -> Self {
        I64Weights(
            self.0
                .iter()
                .map(|row| row.iter().map(|&w| w.saturating_neg()).collect())
                .collect(),
        )
    }
}

fn benefit_to_weight(benefit: f64) -> i64 {
    let weight = benefit * SCALE;
    if weight >= i64::MAX as f64 {
        i64::MAX
    } else if weight <= INFEASIBLE as f64 {
        INFEASIBLE + 1
    } else {
        weight as i64
    }
}

/// Solves the integer program and returns one value per prospect variable,
/// or `None` when the solve failed.
pub fn solve(problem: &MatchingProblem) -> Option<Vec<f64>> {
    if problem.num_routes == 0 {
        return Some(vec![0.0; problem.prospects.len()]);
    }

    let model = build(problem);
    let num_columns = problem.num_couriers + problem.num_routes;

    // Rows are routes, columns are couriers then per-route slack.
    let mut matrix = vec![vec![INFEASIBLE; num_columns]; problem.num_routes];
    for (variable, benefit) in model.variables.iter().zip(&model.objective) {
        match variable {
            Variable::Prospect(ix) => {
                let prospect = &problem.prospects[*ix];
                matrix[prospect.route_ix][prospect.courier_ix] = benefit_to_weight(*benefit);
            }
            Variable::Slack { route_ix } => {
                matrix[*route_ix][problem.num_couriers + route_ix] = 0;
            }
        }
    }

    let weights = I64Weights(matrix);
    let (_total, assignments) = kuhn_munkres(&weights);

    let mut solution = vec![0.0; problem.prospects.len()];
    for (route_ix, &col) in assignments.iter().enumerate() {
        if col >= problem.num_couriers || weights.at(route_ix, col) <= INFEASIBLE {
            continue;
        }
        if let Some(ix) = problem
            .prospects
            .iter()
            .position(|p| p.route_ix == route_ix && p.courier_ix == col)
        {
            solution[ix] = 1.0;
        }
    }
    Some(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::problem::Prospect;

    #[test]
    fn model_carries_one_slack_per_route() {
        let problem = MatchingProblem::new(
            2,
            2,
            vec![Prospect {
                courier_ix: 0,
                route_ix: 1,
            }],
            vec![2.5],
        );
        let model = build(&problem);
        assert_eq!(model.variables.len(), 3);
        assert_eq!(
            model
                .variables
                .iter()
                .filter(|v| matches!(v, Variable::Slack { .. }))
                .count(),
            2
        );
        assert_eq!(model.objective, vec![2.5, 0.0, 0.0]);
    }

    #[test]
    fn each_courier_gets_at_most_one_route() {
        // One courier feasible for both routes; one route must take slack.
        let problem = MatchingProblem::new(
            1,
            2,
            vec![
                Prospect {
                    courier_ix: 0,
                    route_ix: 0,
                },
                Prospect {
                    courier_ix: 0,
                    route_ix: 1,
                },
            ],
            vec![5.0, 1.0],
        );

        let solution = solve(&problem).expect("solvable");
        assert_eq!(solution, vec![1.0, 0.0]);
    }

    #[test]
    fn agrees_with_the_flow_formulation() {
        let problem = MatchingProblem::new(
            2,
            2,
            vec![
                Prospect {
                    courier_ix: 0,
                    route_ix: 0,
                },
                Prospect {
                    courier_ix: 0,
                    route_ix: 1,
                },
                Prospect {
                    courier_ix: 1,
                    route_ix: 0,
                },
                Prospect {
                    courier_ix: 1,
                    route_ix: 1,
                },
            ],
            vec![1.0, 3.0, 2.0, 1.0],
        );

        let mip = solve(&problem).expect("mip solvable");
        let flow = crate::optimization::graph::solve(&problem).expect("flow solvable");
        let mip_selected: Vec<_> = problem.selected_prospects(&mip);
        let flow_selected: Vec<_> = problem.selected_prospects(&flow);
        assert_eq!(mip_selected, flow_selected);
    }

    #[test]
    fn negative_benefit_prospects_lose_to_slack() {
        let problem = MatchingProblem::new(
            1,
            1,
            vec![Prospect {
                courier_ix: 0,
                route_ix: 0,
            }],
            vec![-2.0],
        );

        let solution = solve(&problem).expect("solvable");
        assert_eq!(solution, vec![0.0]);
    }
}
