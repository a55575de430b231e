use chrono::{DateTime, Utc};

/// The type used for primary keys in the database.
pub type PrimaryKey = i32;

/// A prodhub account
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserData {
    pub id: PrimaryKey,
    /// Unique per account, enforced by the store
    pub email: String,
    pub username: String,
    /// The argon2 hash, never the plaintext
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The musical description block embedded in a repository
#[derive(Debug, Clone)]
pub struct DescriptionData {
    pub bpm: i32,
    pub scale: String,
    pub genre: String,
}

/// A music production project repository
#[derive(Debug, Clone)]
pub struct RepoData {
    pub id: PrimaryKey,
    pub name: String,
    pub owner: UserData,
    pub description: DescriptionData,
    /// Users granted collaboration without ownership. Never contains duplicates.
    pub collaborators: Vec<UserData>,
    /// Version history, ascending by version number
    pub versions: Vec<VersionData>,
    /// Activity feed, ascending by date
    pub activity: Vec<ActivityData>,
    /// Private repositories are only visible to the owner and collaborators
    pub public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RepoData {
    /// Whether the given user owns this repository
    pub fn is_owner(&self, user_id: PrimaryKey) -> bool {
        self.owner.id == user_id
    }

    /// Whether the given user may read this repository and its version history
    pub fn can_access(&self, user_id: PrimaryKey) -> bool {
        self.public || self.is_owner(user_id) || self.collaborators.iter().any(|c| c.id == user_id)
    }
}

/// One uploaded snapshot of a repository's working file
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VersionData {
    pub id: PrimaryKey,
    /// No referential integrity on purpose: deleting a repository leaves
    /// its version rows orphaned rather than cascading.
    pub repo_id: PrimaryKey,
    /// The display name of the uploaded file
    pub name: String,
    /// Monotonically increasing, scoped to the owning repository
    pub version: i32,
    /// Where the payload was stored
    pub url: String,
    /// The change note supplied with the upload
    pub changes: String,
    pub created_at: DateTime<Utc>,
}

/// An entry in a repository's activity feed
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityData {
    pub id: PrimaryKey,
    pub repo_id: PrimaryKey,
    pub date: DateTime<Utc>,
    pub description: String,
}
