//! Buffering-interval policy: when the dispatcher flushes placed orders into
//! the matchable pool and runs a dispatch pass.

use bevy_ecs::prelude::Resource;

pub trait BufferingPolicy: Send + Sync {
    fn should_flush(&self, now: u64) -> bool;
}

/// Flush on a fixed rolling horizon.
pub struct RollingHorizonBufferingPolicy {
    pub interval_secs: u64,
}

impl BufferingPolicy for RollingHorizonBufferingPolicy {
    fn should_flush(&self, now: u64) -> bool {
        self.interval_secs > 0 && now % self.interval_secs == 0
    }
}

#[derive(Resource)]
pub struct BufferingPolicyResource(pub Box<dyn BufferingPolicy>);
