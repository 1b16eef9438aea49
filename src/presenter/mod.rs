mod overlay;
mod sink;
mod worker;
#[cfg(test)]
mod tests;

pub use overlay::RegionOverlay;
#[cfg(all(feature = "gstreamer", target_os = "linux"))]
pub use sink::GstWindowSink;
pub use sink::{DirectorySink, LogSink, RenderSink};
pub use worker::Presenter;
