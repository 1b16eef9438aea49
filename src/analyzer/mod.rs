mod detector;
mod region;
mod worker;
#[cfg(test)]
mod tests;

pub use detector::{FrameDiffDetector, MotionDetector};
pub use region::MotionRegion;
pub use worker::{MotionAnalysisMetrics, MotionAnalyzer};
