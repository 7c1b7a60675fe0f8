//! App-private media storage
//! Owns the `photos/` and `audio/` directories (created on demand) and the
//! timestamp-based file naming used by capture operations.

use base64::Engine;
use chrono::Local;
use std::path::{Path, PathBuf};

use crate::error::CaptureError;

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Platform data directory, falling back to the temp dir on headless
    /// systems.
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("storycap")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_dir(&self, name: &str) -> Result<PathBuf, CaptureError> {
        let dir = self.root.join(name);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// `photos/IMG_<yyyyMMdd_HHmmss>.jpg`
    pub fn photo_path(&self) -> Result<PathBuf, CaptureError> {
        let dir = self.ensure_dir("photos")?;
        let name = format!("IMG_{}.jpg", Local::now().format("%Y%m%d_%H%M%S"));
        Ok(dir.join(name))
    }

    /// `photos/<yyyy-MM-dd-HH-mm-ss-SSS>.jpg` — millisecond resolution keeps
    /// rapid consecutive captures from colliding.
    pub fn pipeline_photo_path(&self) -> Result<PathBuf, CaptureError> {
        let dir = self.ensure_dir("photos")?;
        let name = format!("{}.jpg", Local::now().format("%Y-%m-%d-%H-%M-%S-%3f"));
        Ok(dir.join(name))
    }

    /// `audio/AUDIO_<yyyyMMdd_HHmmss>.aac`
    pub fn audio_path(&self) -> Result<PathBuf, CaptureError> {
        let dir = self.ensure_dir("audio")?;
        let name = format!("AUDIO_{}.aac", Local::now().format("%Y%m%d_%H%M%S"));
        Ok(dir.join(name))
    }

    /// Downscaled base64 PNG of a saved photo, for story-page thumbnails.
    pub fn photo_thumbnail(&self, path: &Path, max_width: u32) -> Result<String, CaptureError> {
        let img = image::open(path).map_err(|e| CaptureError::Io(e.to_string()))?;

        let img = if img.width() > max_width {
            let scale = max_width as f32 / img.width() as f32;
            let height = (img.height() as f32 * scale) as u32;
            img.resize(max_width, height, image::imageops::FilterType::Triangle)
        } else {
            img
        };

        let mut png_data = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut png_data),
            image::ImageFormat::Png,
        )
        .map_err(|e| CaptureError::Io(e.to_string()))?;

        Ok(base64::engine::general_purpose::STANDARD.encode(&png_data))
    }
}

impl Default for MediaStore {
    fn default() -> Self {
        Self::new(Self::default_root())
    }
}
