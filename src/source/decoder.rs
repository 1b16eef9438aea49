use crate::error::SourceError;
use crate::frame::FrameData;

use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, trace};

/// Decode collaborator: turns a source identifier into a frame sequence
pub trait FrameDecoder: Send + Sync {
    fn open(&self, source_id: &str) -> Result<Box<dyn DecodeSession>, SourceError>;
}

/// A lazy, finite, non-restartable sequence of frames.
///
/// `Ok(None)` means the sequence is exhausted; calling again keeps
/// returning `Ok(None)`.
pub trait DecodeSession: Send {
    fn next_frame(&mut self) -> Result<Option<FrameData>, SourceError>;
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Decoder reading a directory of still images in file name order
#[derive(Debug, Clone, Default)]
pub struct ImageSequenceDecoder;

impl ImageSequenceDecoder {
    pub fn new() -> Self {
        Self
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }
}

impl FrameDecoder for ImageSequenceDecoder {
    fn open(&self, source_id: &str) -> Result<Box<dyn DecodeSession>, SourceError> {
        let dir = Path::new(source_id);
        let open_error = |details: String| SourceError::Open {
            source_id: source_id.to_string(),
            details,
        };

        if !dir.is_dir() {
            return Err(open_error("not a readable directory".to_string()));
        }

        let entries = std::fs::read_dir(dir).map_err(|e| open_error(e.to_string()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| open_error(e.to_string()))?.path();
            if path.is_file() && Self::is_image(&path) {
                files.push(path);
            }
        }
        files.sort();

        info!(
            "Opened image sequence {} ({} file(s))",
            dir.display(),
            files.len()
        );

        Ok(Box::new(ImageSequenceSession {
            files: files.into_iter(),
            produced: 0,
        }))
    }
}

struct ImageSequenceSession {
    files: std::vec::IntoIter<PathBuf>,
    produced: u64,
}

impl DecodeSession for ImageSequenceSession {
    fn next_frame(&mut self) -> Result<Option<FrameData>, SourceError> {
        let Some(path) = self.files.next() else {
            debug!("Image sequence exhausted after {} frame(s)", self.produced);
            return Ok(None);
        };

        let image = image::open(&path)
            .map_err(|e| SourceError::Read {
                details: format!("{}: {}", path.display(), e),
            })?
            .to_rgb8();

        self.produced += 1;
        trace!("Decoded {} as frame {}", path.display(), self.produced);

        Ok(Some(FrameData::from_rgb_image(
            self.produced,
            SystemTime::now(),
            image,
        )))
    }
}
