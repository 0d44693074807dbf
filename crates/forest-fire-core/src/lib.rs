pub mod agent;
pub mod automata;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod grid;
pub mod metrics;
pub mod neighborhood;
pub mod operator;
pub mod rng;
pub mod scheduler;
pub mod space;

pub use coordinator::{FreezeCoordinator, RepeatCaCoordinator};
pub use grid::{Cell, Grid, Position};
pub use metrics::{run_experiment, RunSummary, StepMetrics};
pub use operator::{Anomaly, Capabilities, Operator, OperatorError, Transition};
pub use space::{Action, ActionSpace, Context, ContextSpace, GridSpace};
