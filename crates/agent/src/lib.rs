mod error;
mod runner;

pub use error::ChatError;
pub use runner::{autosave_due, ChatRunner, ChatSettings, TurnOutcome};
