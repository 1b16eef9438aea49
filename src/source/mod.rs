mod decoder;
mod extract;
#[cfg(all(feature = "gstreamer", target_os = "linux"))]
mod gst;
#[cfg(test)]
mod tests;

pub use decoder::{DecodeSession, FrameDecoder, ImageSequenceDecoder};
pub use extract::FrameSource;
#[cfg(all(feature = "gstreamer", target_os = "linux"))]
pub use gst::GstFileDecoder;
