pub mod machine;
pub mod service;
pub mod sweeper;

pub use machine::{evaluate_deadline, transition, LifecycleEvent, LifecycleMachine, LifecycleTransition};
pub use service::{
    CloseOutcome, LifecycleDefaults, LifecycleService, NewItem, NewQuotation,
    DEFAULT_REMINDER_PERCENT,
};
pub use sweeper::{DeadlineSweeper, SweepReport};
