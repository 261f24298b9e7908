//! DirectSpeakers rendering pipeline (spec.md §4.12, §4.16).

pub mod panner;
pub mod renderer;

pub use panner::DirectSpeakersPanner;
pub use renderer::DirectSpeakersRenderer;
