//! Session lifecycle: the controller state machine and the two monitors
//! it orchestrates (idle countdown, close-vs-reload detection).

pub mod controller;
pub mod idle;
pub mod lifecycle;
pub mod record;

pub use controller::SessionController;
pub use idle::{ActivityKind, IdleMonitor};
pub use lifecycle::{LifecycleDetector, NavigationKind};
pub use record::SessionRecord;
