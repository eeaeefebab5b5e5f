//! The matching-policy seam: the dispatch pass hands snapshots to whichever
//! policy was resolved at configuration time.

use bevy_ecs::prelude::Resource;

use crate::model::Notification;
use crate::routing::RouteProviderResource;
use crate::scenario::params::{DispatchConfig, MatchingPolicyKind};

use super::types::{CourierSnapshot, OrderSnapshot};

pub trait MatchingPolicy: Send + Sync {
    /// One dispatch pass: matchable orders × eligible couriers →
    /// notifications.
    fn execute(
        &self,
        orders: &[OrderSnapshot],
        couriers: &[CourierSnapshot],
        routing: &RouteProviderResource,
        config: &DispatchConfig,
        now: u64,
    ) -> Vec<Notification>;
}

/// Resource wrapper for the matching policy trait object.
#[derive(Resource)]
pub struct MatchingPolicyResource(pub Box<dyn MatchingPolicy>);

impl std::ops::Deref for MatchingPolicyResource {
    type Target = dyn MatchingPolicy;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

pub fn build_matching_policy(kind: MatchingPolicyKind) -> Box<dyn MatchingPolicy> {
    match kind {
        MatchingPolicyKind::Greedy => Box::new(super::greedy::GreedyMatchingPolicy),
        MatchingPolicyKind::Myopic => Box::new(super::myopic::MyopicMatchingPolicy),
    }
}
