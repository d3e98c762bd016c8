//! # Photos
//!
//! Writes pictures received during a flight to disk when the console exits.

use crate::error::Result;
use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tello_core::Photo;

/// File name prefix for the pictures of one session.
pub fn session_prefix<Tz: TimeZone>(started: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!("tello_pic_{}", started.format("%Y%m%dT%H%M%S"))
}

/// Write each photo as `<prefix>_<n>.jpg` under `dir`, creating it if needed.
///
/// Returns the written paths in order.
pub fn save_photos(dir: &Path, prefix: &str, photos: &[Photo]) -> Result<Vec<PathBuf>> {
    if photos.is_empty() {
        return Ok(Vec::new());
    }
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(photos.len());
    for (n, photo) in photos.iter().enumerate() {
        let path = dir.join(format!("{}_{}.jpg", prefix, n + 1));
        std::fs::write(&path, &photo.data)?;
        tracing::info!("saved picture {} ({} bytes)", path.display(), photo.data.len());
        written.push(path);
    }
    Ok(written)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn photo(file_id: u16, data: &[u8]) -> Photo {
        Photo {
            file_id,
            file_type: 1,
            data: data.to_vec(),
        }
    }

    #[test]
    fn prefix_carries_start_time() {
        let started = Utc.with_ymd_and_hms(2026, 10, 18, 9, 5, 3).unwrap();
        assert_eq!(session_prefix(&started), "tello_pic_20261018T090503");
    }

    #[test]
    fn writes_numbered_files() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("pictures");

        let paths = save_photos(&dir, "tello_pic_x", &[photo(1, &[0xff, 0xd8]), photo(2, &[1, 2, 3])]).unwrap();

        assert_eq!(paths, vec![dir.join("tello_pic_x_1.jpg"), dir.join("tello_pic_x_2.jpg")]);
        assert_eq!(std::fs::read(&paths[0]).unwrap(), vec![0xff, 0xd8]);
        assert_eq!(std::fs::read(&paths[1]).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn nothing_to_save_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("unused");

        assert!(save_photos(&dir, "p", &[]).unwrap().is_empty());
        assert!(!dir.exists());
    }
}
