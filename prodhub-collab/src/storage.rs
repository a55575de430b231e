use std::path::{Path, PathBuf};

use tokio::fs;

use crate::util::random_string;

/// Stores uploaded files on disk. Every upload gets a fresh random prefix,
/// so files with the same name never collide.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: &str) -> Self {
        Self {
            root: PathBuf::from(root),
        }
    }

    /// Writes a payload and returns the path it can be retrieved from,
    /// relative to the store's root
    pub async fn store(&self, name: &str, data: &[u8]) -> std::io::Result<String> {
        // Only the final component of the supplied name is trusted
        let name = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload");

        let prefix = random_string(16);
        let dir = self.root.join(&prefix);

        fs::create_dir_all(&dir).await?;
        fs::write(dir.join(name), data).await?;

        Ok(format!("{}/{}", prefix, name))
    }

    /// The absolute location of a previously stored file
    pub fn resolve(&self, url: &str) -> PathBuf {
        self.root.join(url)
    }

    /// Removes a previously stored file along with its prefix directory
    pub async fn remove(&self, url: &str) -> std::io::Result<()> {
        let path = self.resolve(url);

        fs::remove_file(&path).await?;

        // The prefix directory only ever holds this one file
        if let Some(dir) = path.parent() {
            fs::remove_dir(dir).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> FileStore {
        let dir = std::env::temp_dir().join(format!("prodhub-store-{}", random_string(8)));
        FileStore::new(dir.to_str().expect("valid temp path"))
    }

    #[tokio::test]
    async fn stored_files_round_trip() {
        let store = temp_store();

        let url = store.store("mix.flp", b"payload").await.expect("stores");
        let read = fs::read(store.resolve(&url)).await.expect("reads back");

        assert_eq!(read, b"payload");
        assert!(url.ends_with("/mix.flp"));
    }

    #[tokio::test]
    async fn path_components_in_names_are_stripped() {
        let store = temp_store();

        let url = store
            .store("../../etc/passwd", b"payload")
            .await
            .expect("stores");

        assert!(url.ends_with("/passwd"));
        assert!(!url.contains(".."));
    }

    #[tokio::test]
    async fn removed_files_are_gone_along_with_their_prefix() {
        let store = temp_store();

        let url = store.store("mix.flp", b"payload").await.expect("stores");
        store.remove(&url).await.expect("removes");

        let path = store.resolve(&url);
        assert!(!path.exists());
        assert!(!path.parent().expect("has a prefix").exists());
    }
}
