//! Staged and stored filter images on local disk.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::types::{ChatId, ImageRef};

pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Pick a fresh file name for an image authored in `chat`.
    pub fn allocate(&self, chat: ChatId) -> (ImageRef, PathBuf) {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let name = format!("{}_{}_{}.jpg", chat, timestamp, &suffix[..8]);
        let path = self.dir.join(&name);
        (name, path)
    }

    pub fn path_of(&self, image: &str) -> PathBuf {
        self.dir.join(image)
    }

    /// Remove a staged image. A file that is already gone is fine.
    pub async fn discard(&self, image: &str) {
        let path = self.path_of(image);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "discarded staged image"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "failed to remove staged image: {}", e),
        }
    }
}
