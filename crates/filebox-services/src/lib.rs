//! External services used by filebox request handlers.

pub mod vision;

pub use vision::{ImageAnalysis, VisionClient};
