pub mod processor;
pub mod simulation;

pub use processor::{process_work_item, ProcessOutcome, WorkerState};
pub use simulation::{FixedPolicy, ProcessingPolicy, SimulatedPolicy};
