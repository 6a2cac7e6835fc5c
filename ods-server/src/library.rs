//! Media library
//!
//! Catalog of demo clips and stills found under the media directory.
//! Entries are keyed by file stem; the browser fetches the bytes through
//! its own media pipeline, so the library only tracks ids and paths.

use anyhow::Result;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::info;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Image,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaEntry {
    pub id: String,
    pub media_type: MediaType,
    #[serde(skip)]
    pub path: PathBuf,
}

/// What the media listing route returns
#[derive(Debug, Clone, Serialize)]
pub struct MediaSummary {
    pub videos: Vec<String>,
    pub images: Vec<String>,
    pub video_count: usize,
    pub image_count: usize,
}

#[derive(Debug, Default)]
pub struct MediaLibrary {
    videos: Vec<MediaEntry>,
    images: Vec<MediaEntry>,
}

impl MediaLibrary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a library from known entries (tests, seeded demos)
    pub fn from_entries(videos: Vec<MediaEntry>, images: Vec<MediaEntry>) -> Self {
        Self { videos, images }
    }

    /// Scan one directory, non-recursive, for media files
    pub fn scan(root: &Path) -> Result<Self> {
        let mut library = Self::empty();
        for entry in std::fs::read_dir(root)? {
            let path = entry?.path();
            let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let extension = extension.to_ascii_lowercase();
            if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
                library.videos.push(MediaEntry {
                    id: stem.to_string(),
                    media_type: MediaType::Video,
                    path,
                });
            } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
                library.images.push(MediaEntry {
                    id: stem.to_string(),
                    media_type: MediaType::Image,
                    path,
                });
            }
        }
        library.videos.sort_by(|a, b| a.id.cmp(&b.id));
        library.images.sort_by(|a, b| a.id.cmp(&b.id));
        info!(
            videos = library.videos.len(),
            images = library.images.len(),
            root = %root.display(),
            "scanned media directory"
        );
        Ok(library)
    }

    pub fn summary(&self) -> MediaSummary {
        MediaSummary {
            videos: self.videos.iter().map(|e| e.id.clone()).collect(),
            images: self.images.iter().map(|e| e.id.clone()).collect(),
            video_count: self.videos.len(),
            image_count: self.images.len(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&MediaEntry> {
        self.videos
            .iter()
            .chain(self.images.iter())
            .find(|e| e.id == id)
    }

    pub fn get_video(&self, id: &str) -> Option<&MediaEntry> {
        self.videos.iter().find(|e| e.id == id)
    }

    pub fn get_image(&self, id: &str) -> Option<&MediaEntry> {
        self.images.iter().find(|e| e.id == id)
    }

    /// Pick a video for the "surprise me" button
    pub fn random_video(&self) -> Option<&MediaEntry> {
        if self.videos.is_empty() {
            return None;
        }
        let mut hasher = DefaultHasher::new();
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos()
            .hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.videos.len();
        self.videos.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: &str) -> MediaEntry {
        MediaEntry {
            id: id.to_string(),
            media_type: MediaType::Video,
            path: PathBuf::from(format!("/media/{id}.mp4")),
        }
    }

    fn image(id: &str) -> MediaEntry {
        MediaEntry {
            id: id.to_string(),
            media_type: MediaType::Image,
            path: PathBuf::from(format!("/media/{id}.jpg")),
        }
    }

    #[test]
    fn test_summary_counts() {
        let library =
            MediaLibrary::from_entries(vec![video("clip-a"), video("clip-b")], vec![image("still-a")]);
        let summary = library.summary();
        assert_eq!(summary.video_count, 2);
        assert_eq!(summary.image_count, 1);
        assert_eq!(summary.videos, vec!["clip-a", "clip-b"]);
    }

    #[test]
    fn test_get_checks_both_kinds() {
        let library = MediaLibrary::from_entries(vec![video("clip-a")], vec![image("still-a")]);
        assert_eq!(library.get("clip-a").unwrap().media_type, MediaType::Video);
        assert_eq!(library.get("still-a").unwrap().media_type, MediaType::Image);
        assert!(library.get("nope").is_none());
        assert!(library.get_video("still-a").is_none());
        assert!(library.get_image("clip-a").is_none());
    }

    #[test]
    fn test_random_video_empty_library() {
        assert!(MediaLibrary::empty().random_video().is_none());
    }

    #[test]
    fn test_random_video_returns_a_video() {
        let library = MediaLibrary::from_entries(vec![video("clip-a"), video("clip-b")], vec![]);
        let picked = library.random_video().unwrap();
        assert_eq!(picked.media_type, MediaType::Video);
    }

    #[test]
    fn test_scan_filters_by_extension() {
        let dir = std::env::temp_dir().join("ods-library-scan-test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("clip-a.mp4"), b"x").unwrap();
        std::fs::write(dir.join("still-a.JPG"), b"x").unwrap();
        std::fs::write(dir.join("notes.txt"), b"x").unwrap();

        let library = MediaLibrary::scan(&dir).unwrap();
        assert_eq!(library.summary().video_count, 1);
        assert_eq!(library.summary().image_count, 1);
        assert!(library.get("notes").is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
