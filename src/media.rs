use std::path::PathBuf;

use image::RgbImage;

/// Camera contract shared by both perception modes. Only one mode holds it at a time.
pub trait MediaSource {
    /// Start the stream. Calling it while already acquired is a no-op.
    fn acquire(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Stop every track. Safe to call repeatedly.
    fn release(&mut self);

    fn is_acquired(&self) -> bool;

    /// True once the stream is producing decodable frames.
    fn frame_ready(&self) -> bool;

    /// Copy of the current frame at native resolution.
    fn snapshot(&mut self) -> Result<RgbImage, Box<dyn std::error::Error + Send + Sync>>;
}

/// Reads the latest frame from a file that an external capture process keeps
/// overwriting, e.g. `ffmpeg -f v4l2 -i /dev/video0 -update 1 frame.jpg`.
pub struct FrameFileSource {
    path: PathBuf,
    acquired: bool,
}

impl FrameFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            acquired: false,
        }
    }
}

impl MediaSource for FrameFileSource {
    fn acquire(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.acquired {
            return Ok(());
        }
        let dir = self
            .path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        if !dir.is_dir() {
            return Err(format!("Camera feed directory {} does not exist", dir.display()).into());
        }
        self.acquired = true;
        log::info!("Camera acquired: {}", self.path.display());
        Ok(())
    }

    fn release(&mut self) {
        if self.acquired {
            self.acquired = false;
            log::info!("Camera released");
        }
    }

    fn is_acquired(&self) -> bool {
        self.acquired
    }

    fn frame_ready(&self) -> bool {
        self.acquired && self.path.is_file()
    }

    fn snapshot(&mut self) -> Result<RgbImage, Box<dyn std::error::Error + Send + Sync>> {
        if !self.acquired {
            return Err("Camera not acquired".into());
        }
        let frame = image::open(&self.path)
            .map_err(|e| format!("Decoding frame {}: {e}", self.path.display()))?;
        Ok(frame.to_rgb8())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_file_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let mut source = FrameFileSource::new(path.clone());

        assert!(!source.frame_ready());
        assert!(source.snapshot().is_err());

        source.acquire().unwrap();
        source.acquire().unwrap();
        assert!(source.is_acquired());
        assert!(!source.frame_ready());

        RgbImage::from_pixel(16, 9, image::Rgb([1, 2, 3])).save(&path).unwrap();
        assert!(source.frame_ready());
        assert_eq!(source.snapshot().unwrap().dimensions(), (16, 9));

        source.release();
        source.release();
        assert!(!source.frame_ready());
    }

    #[test]
    fn test_missing_feed_directory_denies_access() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FrameFileSource::new(dir.path().join("nope").join("frame.jpg"));
        assert!(source.acquire().is_err());
        assert!(!source.is_acquired());
    }

    #[test]
    fn test_corrupt_frame_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.jpg");
        std::fs::write(&path, b"not a jpeg").unwrap();
        let mut source = FrameFileSource::new(path);
        source.acquire().unwrap();
        assert!(source.frame_ready());
        assert!(source.snapshot().is_err());
    }
}
