//! Frame source replaying encoded images

use super::FrameSource;
use crate::error::VisionError;
use bytes::Bytes;
use std::path::Path;
use tracing::info;

const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Cycles through a fixed set of encoded frames.
///
/// Stands in for a camera when running without capture hardware.
pub struct ReplaySource {
    frames: Vec<Bytes>,
    next: usize,
    access_granted: bool,
}

impl ReplaySource {
    /// Replay in-memory frames
    pub fn from_frames(frames: Vec<Bytes>) -> Self {
        Self {
            frames,
            next: 0,
            access_granted: true,
        }
    }

    /// Replay every JPEG/PNG file in a directory, in file name order
    pub fn from_dir(dir: &Path) -> Result<Self, VisionError> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| VisionError::Camera(format!("Failed to read {}: {}", dir.display(), e)))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(VisionError::Camera(format!(
                "No JPEG or PNG frames found in {}",
                dir.display()
            )));
        }

        let frames = paths
            .iter()
            .map(|path| std::fs::read(path).map(Bytes::from))
            .collect::<Result<Vec<_>, _>>()?;

        info!("Replaying {} frames from {:?}", frames.len(), dir);
        Ok(Self::from_frames(frames))
    }

    /// Behave as if the user refused camera access
    pub fn deny_access(mut self) -> Self {
        self.access_granted = false;
        self
    }
}

impl FrameSource for ReplaySource {
    fn request_access(&mut self) -> bool {
        self.access_granted
    }

    fn open(&mut self) -> Result<(), VisionError> {
        if self.frames.is_empty() {
            return Err(VisionError::Camera("No frames to replay".to_string()));
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Bytes, VisionError> {
        if self.frames.is_empty() {
            return Err(VisionError::Camera("No frames to replay".to_string()));
        }
        let frame = self.frames[self.next % self.frames.len()].clone();
        self.next = (self.next + 1) % self.frames.len();
        Ok(frame)
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_cycles_frames() {
        let mut source = ReplaySource::from_frames(vec![
            Bytes::from_static(b"a"),
            Bytes::from_static(b"b"),
        ]);
        assert!(source.open().is_ok());
        assert_eq!(&source.read_frame().unwrap()[..], b"a");
        assert_eq!(&source.read_frame().unwrap()[..], b"b");
        assert_eq!(&source.read_frame().unwrap()[..], b"a");
    }

    #[test]
    fn test_empty_replay_fails() {
        let mut source = ReplaySource::from_frames(Vec::new());
        assert!(source.open().is_err());
        assert!(source.read_frame().is_err());
    }

    #[test]
    fn test_from_dir_filters_and_sorts() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.JPG"), b"second").unwrap();
        std::fs::write(dir.path().join("a.png"), b"first").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip").unwrap();

        let mut source = ReplaySource::from_dir(dir.path()).unwrap();
        assert_eq!(&source.read_frame().unwrap()[..], b"first");
        assert_eq!(&source.read_frame().unwrap()[..], b"second");
        assert_eq!(&source.read_frame().unwrap()[..], b"first");
    }

    #[test]
    fn test_from_dir_without_frames() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(ReplaySource::from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_deny_access() {
        let mut source = ReplaySource::from_frames(vec![Bytes::from_static(b"a")]).deny_access();
        assert!(!source.request_access());
    }
}
