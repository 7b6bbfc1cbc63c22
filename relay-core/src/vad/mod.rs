//! Voice activity detection: a probability-returning activity model plus the
//! segmenter that turns a probability stream into bounded-duration
//! utterances.

pub mod activity;
pub mod segmenter;

pub use activity::{ActivityModel, EnergyActivityModel};
pub use segmenter::{VadConfig, VadSegmenter};
