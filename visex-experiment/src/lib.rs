pub mod config;
pub mod error;
pub mod output;
pub mod placement;
pub mod schedule;
pub mod session;
pub mod state;
pub mod stimuli;

pub use config::ExperimentConfig;
pub use error::{ExperimentError, Result};
pub use output::CsvLogger;
pub use schedule::PlannedTrial;
pub use session::SessionInfo;
pub use state::{ExperimentEvent, ExperimentStateMachine, SessionSummary};
pub use stimuli::StimulusSet;
