//! Photo files on the local filesystem

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tourdesk_core::error::AppError;
use tourdesk_core::traits::PhotoStorage;
use tracing::debug;

/// Resolves stored photo URLs against a root directory
#[derive(Debug, Clone)]
pub struct LocalPhotoStore {
    root: PathBuf,
}

impl LocalPhotoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a stored url such as `/uploads/x/cover.jpg` or `x/cover.jpg` into
    /// the root. Anything that would climb out of the root is refused.
    pub fn resolve(&self, photo_url: &str) -> Result<PathBuf, AppError> {
        let root_name = self.root.file_name();
        let mut path = self.root.clone();
        let mut first = true;

        for component in Path::new(photo_url.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => {
                    // Urls often repeat the root directory name
                    if first && Some(part) == root_name {
                        first = false;
                        continue;
                    }
                    first = false;
                    path.push(part);
                }
                Component::CurDir => {}
                _ => {
                    return Err(AppError::InvalidInput(format!(
                        "photo path escapes storage root: {}",
                        photo_url
                    )))
                }
            }
        }

        if path == self.root {
            return Err(AppError::InvalidInput(format!("empty photo path: {}", photo_url)));
        }
        Ok(path)
    }
}

#[async_trait]
impl PhotoStorage for LocalPhotoStore {
    async fn remove(&self, photo_url: &str) -> Result<(), AppError> {
        let path = self.resolve(photo_url)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed photo {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_strips_root_prefix() {
        let store = LocalPhotoStore::new("uploads");
        assert_eq!(
            store.resolve("/uploads/walk/cover.jpg").unwrap(),
            PathBuf::from("uploads/walk/cover.jpg")
        );
        assert_eq!(
            store.resolve("walk/cover.jpg").unwrap(),
            PathBuf::from("uploads/walk/cover.jpg")
        );
    }

    #[test]
    fn test_resolve_refuses_traversal() {
        let store = LocalPhotoStore::new("uploads");
        assert!(store.resolve("../etc/passwd").is_err());
        assert!(store.resolve("/uploads/").is_err());
    }

    #[tokio::test]
    async fn test_remove_missing_file_is_ok() {
        let dir = std::env::temp_dir().join("tourdesk-photo-test");
        tokio::fs::create_dir_all(dir.join("walk")).await.unwrap();
        tokio::fs::write(dir.join("walk/cover.jpg"), b"jpg").await.unwrap();

        let store = LocalPhotoStore::new(&dir);
        store.remove("walk/cover.jpg").await.unwrap();
        assert!(!dir.join("walk/cover.jpg").exists());
        store.remove("walk/cover.jpg").await.unwrap();
    }
}
