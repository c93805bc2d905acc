pub mod block;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use block::BlockConfig;
pub use phase::{Phase, SessionPhase};
pub use stimulus::{ImageStimulus, Placement, Stimulus, StimulusKind};
pub use trial::{ResponseKey, TrialRecord, TrialState};
