//! Exact assignment solvers for the matching optimizer: a min-cost-flow
//! relaxation and an explicit integer program, both over the same
//! [`problem::MatchingProblem`] shape.

pub mod flow;
pub mod graph;
pub mod mip;
pub mod problem;

pub use problem::{MatchingProblem, Prospect, SOLUTION_VALUE};

use crate::scenario::params::AssignmentFormulation;

/// Solves with the configured formulation. `None` signals an infeasible or
/// failed solve; callers emit zero notifications for the pass.
pub fn solve(problem: &MatchingProblem, formulation: AssignmentFormulation) -> Option<Vec<f64>> {
    match formulation {
        AssignmentFormulation::Flow => graph::solve(problem),
        AssignmentFormulation::Mip => mip::solve(problem),
    }
}
