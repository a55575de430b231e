use async_trait::async_trait;
use thiserror::Error;

mod data;
pub use data::*;

mod pg;
pub use pg::*;

#[cfg(any(test, feature = "test-utils"))]
mod memory;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(e) => match e {
                DatabaseError::NotFound { .. } => Ok(()),
                e => Err(e),
            },
        }
    }
}

/// Represents a type that can fetch and store prodhub data
#[async_trait]
pub trait Database: Send + Sync + 'static {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData>;
    async fn user_by_email(&self, email: &str) -> Result<UserData>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;
    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData>;

    async fn repo_by_id(&self, repo_id: PrimaryKey) -> Result<RepoData>;
    async fn list_public_repos(&self) -> Result<Vec<RepoData>>;
    /// Repositories the user owns or collaborates on
    async fn repos_by_user(&self, user_id: PrimaryKey) -> Result<Vec<RepoData>>;
    async fn create_repo(&self, new_repo: NewRepo) -> Result<RepoData>;
    async fn update_repo(&self, updated_repo: UpdatedRepo) -> Result<RepoData>;
    async fn delete_repo(&self, repo_id: PrimaryKey) -> Result<()>;
    async fn create_collaborator(&self, new_collaborator: NewCollaborator) -> Result<()>;
    async fn delete_collaborator(&self, repo_id: PrimaryKey, user_id: PrimaryKey) -> Result<()>;
    async fn create_activity(&self, new_activity: NewActivity) -> Result<ActivityData>;

    /// The highest version number recorded for a repository, 0 if none exist
    async fn latest_version_number(&self, repo_id: PrimaryKey) -> Result<i32>;
    async fn create_version(&self, new_version: NewVersion) -> Result<VersionData>;
    async fn versions_by_repo(&self, repo_id: PrimaryKey) -> Result<Vec<VersionData>>;

    async fn create_like(&self, user_id: PrimaryKey, repo_id: PrimaryKey) -> Result<()>;
    async fn delete_like(&self, user_id: PrimaryKey, repo_id: PrimaryKey) -> Result<()>;
    async fn repos_liked_by_user(&self, user_id: PrimaryKey) -> Result<Vec<RepoData>>;
}

#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    /// Already hashed by the caller
    pub password: String,
}

#[derive(Debug)]
pub struct UpdatedUser {
    pub id: PrimaryKey,
    pub email: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug)]
pub struct NewRepo {
    pub name: String,
    /// The owner of the new repository
    pub owner_id: PrimaryKey,
    pub bpm: i32,
    pub scale: String,
    pub genre: String,
}

#[derive(Debug, Default)]
pub struct UpdatedRepo {
    pub id: PrimaryKey,
    pub name: Option<String>,
    pub bpm: Option<i32>,
    pub scale: Option<String>,
    pub genre: Option<String>,
    pub public: Option<bool>,
}

#[derive(Debug)]
pub struct NewCollaborator {
    pub repo_id: PrimaryKey,
    pub user_id: PrimaryKey,
}

#[derive(Debug)]
pub struct NewActivity {
    pub repo_id: PrimaryKey,
    pub description: String,
}

#[derive(Debug)]
pub struct NewVersion {
    pub repo_id: PrimaryKey,
    pub name: String,
    pub version: i32,
    pub url: String,
    pub changes: String,
}
