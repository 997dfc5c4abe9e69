//! File-backed camera.
//!
//! Serves the JPEG files of a directory in name order, one per capture,
//! wrapping around at the end. Like the real driver it has a single buffer:
//! a second capture while a frame is lent out fails.

use std::fs;
use std::path::{Path, PathBuf};

use jpegcam_core::{CameraConfig, CameraDriver};
use tracing::{debug, info, warn};

/// `ESP_ERR_NOT_FOUND`, reported when the directory holds no usable frames.
pub const ERR_NOT_FOUND: i32 = 0x105;
/// `ESP_FAIL`, reported when the directory cannot be read.
pub const ERR_FAIL: i32 = -1;

const SOI: [u8; 2] = [0xFF, 0xD8];

#[derive(Debug)]
pub struct FileCamera {
    dir: PathBuf,
    frames: Vec<Vec<u8>>,
    next: usize,
    held: bool,
}

impl FileCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            frames: Vec::new(),
            next: 0,
            held: false,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

fn is_jpeg_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
}

fn load_frames(dir: &Path) -> std::io::Result<Vec<Vec<u8>>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_jpeg_path(path))
        .collect();
    paths.sort();

    let mut frames = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = fs::read(&path)?;
        if !bytes.starts_with(&SOI) {
            warn!(path = %path.display(), "Skipping file without JPEG start marker");
            continue;
        }
        debug!(path = %path.display(), len = bytes.len(), "Loaded frame");
        frames.push(bytes);
    }
    Ok(frames)
}

impl CameraDriver for FileCamera {
    type Handle = usize;

    fn init(&mut self, config: &CameraConfig) -> Result<(), i32> {
        let frames = load_frames(&self.dir).map_err(|e| {
            warn!(dir = %self.dir.display(), "Cannot read frame directory: {}", e);
            ERR_FAIL
        })?;
        if frames.is_empty() {
            return Err(ERR_NOT_FOUND);
        }

        let (width, height) = config.frame_size.dimensions();
        info!(
            "File camera ready: {} frames from {} (nominal {}x{})",
            frames.len(),
            self.dir.display(),
            width,
            height
        );
        self.frames = frames;
        self.next = 0;
        self.held = false;
        Ok(())
    }

    fn capture(&mut self) -> Option<usize> {
        if self.held || self.frames.is_empty() {
            return None;
        }
        let index = self.next;
        self.next = (self.next + 1) % self.frames.len();
        self.held = true;
        Some(index)
    }

    fn data<'a>(&'a self, handle: &'a usize) -> &'a [u8] {
        self.frames.get(*handle).map(Vec::as_slice).unwrap_or_default()
    }

    fn release(&mut self, _handle: usize) {
        self.held = false;
    }
}
