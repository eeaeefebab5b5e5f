pub mod build;
pub mod params;

pub use build::build_world;
pub use params::{
    AcceptancePolicyKind, AssignmentFormulation, CancellationPolicyKind, CourierConfig,
    DispatchConfig, MatchingPolicyKind, MovementEvaluationPolicyKind, PayRates, PendingCourier,
    PendingCouriers, PendingOrder, PendingOrders, PrepositioningPolicyKind, ScenarioParams,
    ServiceTimeConfig, SimulationEndTime, SimulationSeed,
};
