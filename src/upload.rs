// src/upload.rs

use crate::error::UploadError;
use crate::types::VideoFormat;
use std::io::Write;
use std::path::Path;
use tempfile::{Builder, TempPath};
use tracing::info;

/// Resolve the container format from an uploaded file name.
pub fn format_from_filename(filename: &str) -> Result<VideoFormat, UploadError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| UploadError::MissingExtension {
            filename: filename.to_string(),
        })?;

    VideoFormat::from_extension(extension).ok_or_else(|| UploadError::UnsupportedFormat {
        extension: extension.to_ascii_lowercase(),
    })
}

/// An uploaded video persisted to a temporary file for one run.
/// The file is deleted when this value is dropped.
#[derive(Debug)]
pub struct UploadedVideo {
    path: TempPath,
    format: VideoFormat,
    size_bytes: u64,
}

impl UploadedVideo {
    /// Validate the declared format, then write `bytes` to `temp_dir`.
    /// Nothing touches the disk for an unsupported file.
    pub fn persist(filename: &str, bytes: &[u8], temp_dir: &Path) -> Result<Self, UploadError> {
        let format = format_from_filename(filename)?;

        std::fs::create_dir_all(temp_dir)?;
        let mut file = Builder::new()
            .prefix("upload-")
            .suffix(&format!(".{}", format.extension()))
            .tempfile_in(temp_dir)?;
        file.write_all(bytes)?;
        file.flush()?;

        let path = file.into_temp_path();
        info!(
            "📼 Stored upload '{}' ({} bytes) at {}",
            filename,
            bytes.len(),
            path.display()
        );

        Ok(Self {
            path,
            format,
            size_bytes: bytes.len() as u64,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> VideoFormat {
        self.format
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// Reserved location of the rendered `.mp4`. Deleted on drop unless kept
/// alive by whoever serves the download.
#[derive(Debug)]
pub struct OutputVideo {
    path: TempPath,
}

impl OutputVideo {
    pub fn create(temp_dir: &Path) -> Result<Self, UploadError> {
        std::fs::create_dir_all(temp_dir)?;
        let path = Builder::new()
            .prefix("detected-")
            .suffix(".mp4")
            .tempfile_in(temp_dir)?
            .into_temp_path();
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_filename() {
        assert_eq!(format_from_filename("match.mp4").unwrap(), VideoFormat::Mp4);
        assert_eq!(format_from_filename("CLIP.MOV").unwrap(), VideoFormat::Mov);
        assert_eq!(format_from_filename("a.b.avi").unwrap(), VideoFormat::Avi);
    }

    #[test]
    fn test_rejects_unsupported_extension() {
        let err = format_from_filename("notes.txt").unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedFormat { ref extension } if extension == "txt"));

        let err = format_from_filename("video").unwrap_err();
        assert!(matches!(err, UploadError::MissingExtension { .. }));
    }

    #[test]
    fn test_unsupported_upload_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let err = UploadedVideo::persist("notes.txt", b"hello", dir.path()).unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedFormat { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_persist_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let upload = UploadedVideo::persist("game.MOV", b"not really a video", dir.path()).unwrap();

        let path = upload.path().to_path_buf();
        assert_eq!(path.extension().unwrap(), "mov");
        assert_eq!(std::fs::read(&path).unwrap(), b"not really a video");
        assert_eq!(upload.size_bytes(), 18);
        assert_eq!(upload.format(), VideoFormat::Mov);

        drop(upload);
        assert!(!path.exists());
    }

    #[test]
    fn test_output_path_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputVideo::create(dir.path()).unwrap();
        let path = output.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "mp4");
        drop(output);
        assert!(!path.exists());
    }
}
