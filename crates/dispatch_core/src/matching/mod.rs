pub mod bundling;
pub mod greedy;
pub mod myopic;
pub mod policy;
pub mod types;

pub use greedy::GreedyMatchingPolicy;
pub use myopic::MyopicMatchingPolicy;
pub use policy::{build_matching_policy, MatchingPolicy, MatchingPolicyResource};
pub use types::{CourierSnapshot, OrderSnapshot};
