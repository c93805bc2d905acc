use std::path::PathBuf;

/// Defines stimuli and their identity for render caching
pub trait Stimulus: Clone + Send + Sync + std::fmt::Debug {
    fn cache_id(&self) -> usize;
    fn is_target(&self) -> bool;
}

/// Which folder an image was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StimulusKind {
    Target,
    Distractor,
}

/// One image file from the stimulus catalogue. The `cache_id` is stable for
/// the session and keys the renderer's decoded-pixmap cache.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageStimulus {
    pub cache_id: usize,
    pub kind: StimulusKind,
    pub path: PathBuf,
}

impl Stimulus for ImageStimulus {
    fn cache_id(&self) -> usize {
        self.cache_id
    }

    fn is_target(&self) -> bool {
        self.kind == StimulusKind::Target
    }
}

/// A stimulus assigned a position in the search array, relative to the
/// fixation point in fixation units.
#[derive(Debug, Clone)]
pub struct Placement<S: Stimulus> {
    pub stimulus: S,
    pub position: (f32, f32),
}
