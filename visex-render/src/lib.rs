pub mod render;

pub use render::{DebriefStats, Screen, SearchRenderer};
