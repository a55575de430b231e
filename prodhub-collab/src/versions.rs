use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;

use crate::{Database, DatabaseError, FileStore, NewActivity, NewVersion, PrimaryKey, VersionData};

/// Facilitates the version history of repositories:
/// appending uploads and listing them in order.
pub struct VersionManager<Db> {
    db: Arc<Db>,
    files: Arc<FileStore>,
}

#[derive(Debug, Error)]
pub enum VersionError {
    /// The uploaded file had no content
    #[error("File payload is empty")]
    EmptyPayload,
    #[error("Failed to store file: {0}")]
    Storage(#[from] std::io::Error),
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// An uploaded file payload, before it's stored
#[derive(Debug)]
pub struct NewVersionFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl<Db> VersionManager<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>, files: &Arc<FileStore>) -> Self {
        Self {
            db: db.clone(),
            files: files.clone(),
        }
    }

    /// Stores an uploaded file and appends it to a repository's history,
    /// numbered one past the latest existing version.
    pub async fn add_version(
        &self,
        repo_id: PrimaryKey,
        file: NewVersionFile,
        changes: String,
    ) -> Result<VersionData, VersionError> {
        // Ensure the repository resolves before anything is written
        let _ = self.db.repo_by_id(repo_id).await?;

        if file.data.is_empty() {
            return Err(VersionError::EmptyPayload);
        }

        let url = self.files.store(&file.name, &file.data).await?;

        // Read-then-insert: concurrent uploads against the same repository
        // race on this number. The unique (repo, version) index turns the
        // loser into a conflict instead of corrupting the history.
        let next = self.db.latest_version_number(repo_id).await? + 1;

        let inserted = self
            .db
            .create_version(NewVersion {
                repo_id,
                name: file.name,
                version: next,
                url: url.clone(),
                changes,
            })
            .await;

        let version = match inserted {
            Ok(version) => version,
            Err(e) => {
                // The payload is already on disk at this point and must not
                // be left behind when the row is rejected
                if let Err(removal) = self.files.remove(&url).await {
                    warn!("Failed to remove rejected upload {}: {}", url, removal);
                }

                return Err(e.into());
            }
        };

        self.db
            .create_activity(NewActivity {
                repo_id,
                description: format!("Uploaded version {}", next),
            })
            .await?;

        info!("Version {} added to repository {}", next, repo_id);

        Ok(version)
    }

    /// The version history of a repository, ascending by version number.
    /// A repository without versions yields an empty list, an unknown one
    /// is an error.
    pub async fn list_versions(
        &self,
        repo_id: PrimaryKey,
    ) -> Result<Vec<VersionData>, VersionError> {
        // Ensure repo exists
        let _ = self.db.repo_by_id(repo_id).await?;

        Ok(self.db.versions_by_repo(repo_id).await?)
    }
}
