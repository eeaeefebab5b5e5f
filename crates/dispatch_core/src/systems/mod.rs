pub mod cancellation;
pub mod dispatcher_tick;
pub mod log_off;
pub mod movement;
pub mod notification;
pub mod relocation;
pub mod route_execution;
pub mod spawner;
