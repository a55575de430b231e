use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, Error as SqlxError, PgPool};

use crate::{
    ActivityData, Database, DatabaseError, DatabaseResult, DescriptionData, IntoDatabaseError,
    NewActivity, NewCollaborator, NewRepo, NewUser, NewVersion, PrimaryKey, RepoData, Result,
    UpdatedRepo, UpdatedUser, UserData, VersionData,
};

/// Queries that take longer than this to get a connection are failed
/// instead of waiting forever.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// A postgres database implementation for prodhub.
/// Repositories and version metadata live in the same store,
/// so repository references are plain integer keys.
pub struct PgDatabase {
    pool: PgPool,
}

/// The raw repos table row, before the owner, collaborators,
/// versions and activity are joined in
#[derive(Debug, sqlx::FromRow)]
struct RepoRow {
    id: PrimaryKey,
    name: String,
    owner_id: PrimaryKey,
    bpm: i32,
    scale: String,
    genre: String,
    public: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PgDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }

    async fn collaborators(&self, repo_id: PrimaryKey) -> Result<Vec<UserData>> {
        sqlx::query_as::<_, UserData>(
            "
            SELECT
                users.id,
                users.email,
                users.username,
                users.password,
                users.created_at,
                users.updated_at
            FROM repo_collaborators
                INNER JOIN users ON repo_collaborators.user_id = users.id
            WHERE repo_id = $1
            ORDER BY repo_collaborators.id",
        )
        .bind(repo_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn activity(&self, repo_id: PrimaryKey) -> Result<Vec<ActivityData>> {
        sqlx::query_as::<_, ActivityData>(
            "SELECT * FROM repo_activity WHERE repo_id = $1 ORDER BY id",
        )
        .bind(repo_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    /// Joins the owner, collaborators, versions, and activity into a repo row
    async fn hydrate(&self, row: RepoRow) -> Result<RepoData> {
        let owner = self.user_by_id(row.owner_id).await?;
        let collaborators = self.collaborators(row.id).await?;
        let versions = self.versions_by_repo(row.id).await?;
        let activity = self.activity(row.id).await?;

        Ok(RepoData {
            id: row.id,
            name: row.name,
            owner,
            description: DescriptionData {
                bpm: row.bpm,
                scale: row.scale,
                genre: row.genre,
            },
            collaborators,
            versions,
            activity,
            public: row.public,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn hydrate_all(&self, rows: Vec<RepoRow>) -> Result<Vec<RepoData>> {
        let mut repos = Vec::with_capacity(rows.len());

        for row in rows {
            repos.push(self.hydrate(row).await?);
        }

        Ok(repos)
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        sqlx::query_as::<_, UserData>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "id"))
    }

    async fn user_by_email(&self, email: &str) -> Result<UserData> {
        sqlx::query_as::<_, UserData>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "email"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_email(&new_user.email)
            .await
            .conflict_or_ok("user", "email", &new_user.email)?;

        sqlx::query_as::<_, UserData>(
            "INSERT INTO users (email, username, password) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&new_user.email)
        .bind(&new_user.username)
        .bind(&new_user.password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData> {
        let user = self.user_by_id(updated_user.id).await?;

        // An email change must not collide with another account
        if let Some(email) = &updated_user.email {
            match self.user_by_email(email).await {
                Ok(existing) if existing.id != user.id => {
                    return Err(DatabaseError::Conflict {
                        resource: "user",
                        field: "email",
                        value: email.clone(),
                    })
                }
                Ok(_) | Err(DatabaseError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        sqlx::query("UPDATE users SET email = $1, username = $2, updated_at = now() WHERE id = $3")
            .bind(updated_user.email.unwrap_or(user.email))
            .bind(updated_user.username.unwrap_or(user.username))
            .bind(updated_user.id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.user_by_id(updated_user.id).await
    }

    async fn repo_by_id(&self, repo_id: PrimaryKey) -> Result<RepoData> {
        let row = sqlx::query_as::<_, RepoRow>("SELECT * FROM repos WHERE id = $1")
            .bind(repo_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("repo", "id"))?;

        self.hydrate(row).await
    }

    async fn list_public_repos(&self) -> Result<Vec<RepoData>> {
        let rows =
            sqlx::query_as::<_, RepoRow>("SELECT * FROM repos WHERE public = true ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.hydrate_all(rows).await
    }

    async fn repos_by_user(&self, user_id: PrimaryKey) -> Result<Vec<RepoData>> {
        let rows = sqlx::query_as::<_, RepoRow>(
            "
            SELECT * FROM repos
            WHERE owner_id = $1
                OR id IN (SELECT repo_id FROM repo_collaborators WHERE user_id = $1)
            ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.hydrate_all(rows).await
    }

    async fn create_repo(&self, new_repo: NewRepo) -> Result<RepoData> {
        // Ensure the owner resolves to an existing user
        let owner = self.user_by_id(new_repo.owner_id).await?;

        let row = sqlx::query_as::<_, RepoRow>(
            "
            INSERT INTO repos (name, owner_id, bpm, scale, genre)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *",
        )
        .bind(&new_repo.name)
        .bind(owner.id)
        .bind(new_repo.bpm)
        .bind(&new_repo.scale)
        .bind(&new_repo.genre)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.hydrate(row).await
    }

    async fn update_repo(&self, updated_repo: UpdatedRepo) -> Result<RepoData> {
        let repo = self.repo_by_id(updated_repo.id).await?;

        sqlx::query(
            "UPDATE repos SET
                name = $1,
                bpm = $2,
                scale = $3,
                genre = $4,
                public = $5,
                updated_at = now()
            WHERE id = $6",
        )
        .bind(updated_repo.name.unwrap_or(repo.name))
        .bind(updated_repo.bpm.unwrap_or(repo.description.bpm))
        .bind(updated_repo.scale.unwrap_or(repo.description.scale))
        .bind(updated_repo.genre.unwrap_or(repo.description.genre))
        .bind(updated_repo.public.unwrap_or(repo.public))
        .bind(updated_repo.id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.repo_by_id(updated_repo.id).await
    }

    async fn delete_repo(&self, repo_id: PrimaryKey) -> Result<()> {
        // Ensure repo exists
        let _ = self.repo_by_id(repo_id).await?;

        sqlx::query("DELETE FROM repos WHERE id = $1")
            .bind(repo_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn create_collaborator(&self, new_collaborator: NewCollaborator) -> Result<()> {
        // Both sides of the relation must exist
        let _ = self.repo_by_id(new_collaborator.repo_id).await?;
        let _ = self.user_by_id(new_collaborator.user_id).await?;

        // Ensure the user isn't a collaborator on this repo already
        sqlx::query("SELECT id FROM repo_collaborators WHERE repo_id = $1 AND user_id = $2")
            .bind(new_collaborator.repo_id)
            .bind(new_collaborator.user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("", ""))
            .map(|_| ())
            .conflict_or_ok(
                "collaborator",
                "repo:user",
                format!(
                    "{}:{}",
                    new_collaborator.repo_id, new_collaborator.user_id
                )
                .as_str(),
            )?;

        sqlx::query("INSERT INTO repo_collaborators (repo_id, user_id) VALUES ($1, $2)")
            .bind(new_collaborator.repo_id)
            .bind(new_collaborator.user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn delete_collaborator(&self, repo_id: PrimaryKey, user_id: PrimaryKey) -> Result<()> {
        sqlx::query("SELECT id FROM repo_collaborators WHERE repo_id = $1 AND user_id = $2")
            .bind(repo_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("collaborator", "repo_id:user_id"))?;

        sqlx::query("DELETE FROM repo_collaborators WHERE repo_id = $1 AND user_id = $2")
            .bind(repo_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn create_activity(&self, new_activity: NewActivity) -> Result<ActivityData> {
        sqlx::query_as::<_, ActivityData>(
            "INSERT INTO repo_activity (repo_id, description) VALUES ($1, $2) RETURNING *",
        )
        .bind(new_activity.repo_id)
        .bind(&new_activity.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn latest_version_number(&self, repo_id: PrimaryKey) -> Result<i32> {
        sqlx::query_scalar::<_, i32>(
            "SELECT COALESCE(MAX(version), 0) FROM versions WHERE repo_id = $1",
        )
        .bind(repo_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn create_version(&self, new_version: NewVersion) -> Result<VersionData> {
        sqlx::query_as::<_, VersionData>(
            "
            INSERT INTO versions (repo_id, name, version, url, changes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *",
        )
        .bind(new_version.repo_id)
        .bind(&new_version.name)
        .bind(new_version.version)
        .bind(&new_version.url)
        .bind(&new_version.changes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn versions_by_repo(&self, repo_id: PrimaryKey) -> Result<Vec<VersionData>> {
        sqlx::query_as::<_, VersionData>(
            "SELECT * FROM versions WHERE repo_id = $1 ORDER BY version ASC",
        )
        .bind(repo_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn create_like(&self, user_id: PrimaryKey, repo_id: PrimaryKey) -> Result<()> {
        let _ = self.user_by_id(user_id).await?;
        let _ = self.repo_by_id(repo_id).await?;

        sqlx::query("SELECT id FROM repo_likes WHERE user_id = $1 AND repo_id = $2")
            .bind(user_id)
            .bind(repo_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("", ""))
            .map(|_| ())
            .conflict_or_ok(
                "like",
                "user:repo",
                format!("{}:{}", user_id, repo_id).as_str(),
            )?;

        sqlx::query("INSERT INTO repo_likes (user_id, repo_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(repo_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn delete_like(&self, user_id: PrimaryKey, repo_id: PrimaryKey) -> Result<()> {
        sqlx::query("SELECT id FROM repo_likes WHERE user_id = $1 AND repo_id = $2")
            .bind(user_id)
            .bind(repo_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("like", "user_id:repo_id"))?;

        sqlx::query("DELETE FROM repo_likes WHERE user_id = $1 AND repo_id = $2")
            .bind(user_id)
            .bind(repo_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn repos_liked_by_user(&self, user_id: PrimaryKey) -> Result<Vec<RepoData>> {
        let rows = sqlx::query_as::<_, RepoRow>(
            "
            SELECT repos.* FROM repos
                INNER JOIN repo_likes ON repo_likes.repo_id = repos.id
            WHERE repo_likes.user_id = $1
            ORDER BY repo_likes.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.hydrate_all(rows).await
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
