pub mod clock;
pub mod dispatcher;
pub mod ecs;
pub mod matching;
pub mod model;
pub mod optimization;
pub mod policies;
pub mod routing;
pub mod runner;
pub mod scenario;
pub mod spatial;
pub mod systems;
pub mod telemetry;
pub mod telemetry_export;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
