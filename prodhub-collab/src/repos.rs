use std::sync::Arc;

use log::info;

use crate::{
    Database, DatabaseError, NewActivity, NewCollaborator, NewRepo, PrimaryKey, RepoData,
    UpdatedRepo,
};

/// Facilitates repository management: creation, metadata updates,
/// collaborators, and the activity feed.
pub struct RepoManager<Db> {
    db: Arc<Db>,
}

impl<Db> RepoManager<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>) -> Self {
        Self { db: db.clone() }
    }

    /// Creates a new repository, private by default, owned by an existing user
    pub async fn create_repo(&self, new_repo: NewRepo) -> Result<RepoData, DatabaseError> {
        let repo = self.db.create_repo(new_repo).await?;

        self.db
            .create_activity(NewActivity {
                repo_id: repo.id,
                description: "Repository created".to_string(),
            })
            .await?;

        info!("Repository '{}' created by user {}", repo.name, repo.owner.id);

        self.db.repo_by_id(repo.id).await
    }

    /// Returns a repository with its collaborators, versions, and activity
    pub async fn repo_by_id(&self, repo_id: PrimaryKey) -> Result<RepoData, DatabaseError> {
        self.db.repo_by_id(repo_id).await
    }

    /// Merges the provided fields into a repository and bumps its update timestamp
    pub async fn update_repo(&self, updated_repo: UpdatedRepo) -> Result<RepoData, DatabaseError> {
        let repo = self.db.update_repo(updated_repo).await?;

        self.db
            .create_activity(NewActivity {
                repo_id: repo.id,
                description: "Repository details updated".to_string(),
            })
            .await?;

        self.db.repo_by_id(repo.id).await
    }

    /// Deletes a repository. Version records are left behind and
    /// become unreachable, nothing purges them.
    pub async fn delete_repo(&self, repo_id: PrimaryKey) -> Result<(), DatabaseError> {
        self.db.delete_repo(repo_id).await?;

        info!("Repository {} deleted", repo_id);
        Ok(())
    }

    /// All public repositories
    pub async fn list_public(&self) -> Result<Vec<RepoData>, DatabaseError> {
        self.db.list_public_repos().await
    }

    /// Repositories a user owns or collaborates on
    pub async fn repos_by_user(&self, user_id: PrimaryKey) -> Result<Vec<RepoData>, DatabaseError> {
        self.db.repos_by_user(user_id).await
    }

    /// Grants a user collaboration on a repository
    pub async fn add_collaborator(
        &self,
        repo_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<RepoData, DatabaseError> {
        let user = self.db.user_by_id(user_id).await?;

        self.db
            .create_collaborator(NewCollaborator { repo_id, user_id })
            .await?;

        self.db
            .create_activity(NewActivity {
                repo_id,
                description: format!("Collaborator {} added", user.username),
            })
            .await?;

        self.db.repo_by_id(repo_id).await
    }

    /// Revokes a user's collaboration on a repository
    pub async fn remove_collaborator(
        &self,
        repo_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<(), DatabaseError> {
        self.db.delete_collaborator(repo_id, user_id).await
    }

    /// Appends a free-form entry to a repository's activity feed
    pub async fn add_activity(
        &self,
        repo_id: PrimaryKey,
        description: String,
    ) -> Result<crate::ActivityData, DatabaseError> {
        // Ensure repo exists
        let _ = self.db.repo_by_id(repo_id).await?;

        self.db
            .create_activity(NewActivity {
                repo_id,
                description,
            })
            .await
    }

    /// Marks a repository as liked by a user
    pub async fn like_repo(
        &self,
        user_id: PrimaryKey,
        repo_id: PrimaryKey,
    ) -> Result<(), DatabaseError> {
        self.db.create_like(user_id, repo_id).await
    }

    /// Removes a user's like from a repository
    pub async fn unlike_repo(
        &self,
        user_id: PrimaryKey,
        repo_id: PrimaryKey,
    ) -> Result<(), DatabaseError> {
        self.db.delete_like(user_id, repo_id).await
    }

    /// All repositories a user has liked
    pub async fn liked_repos(&self, user_id: PrimaryKey) -> Result<Vec<RepoData>, DatabaseError> {
        self.db.repos_liked_by_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{MemoryDatabase, NewUser, UserData};

    async fn setup() -> (RepoManager<MemoryDatabase>, Arc<MemoryDatabase>) {
        let db = Arc::new(MemoryDatabase::new());
        (RepoManager::new(&db), db)
    }

    async fn user(db: &Arc<MemoryDatabase>, email: &str, username: &str) -> UserData {
        db.create_user(NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password: "hash".to_string(),
        })
        .await
        .expect("creates user")
    }

    fn track_one(owner_id: PrimaryKey) -> NewRepo {
        NewRepo {
            name: "Track1".to_string(),
            owner_id,
            bpm: 120,
            scale: "Cmin".to_string(),
            genre: "house".to_string(),
        }
    }

    #[tokio::test]
    async fn created_repos_echo_input_and_default_to_private() {
        let (repos, db) = setup().await;
        let owner = user(&db, "a@x.com", "alice").await;

        let repo = repos.create_repo(track_one(owner.id)).await.expect("creates");

        assert_eq!(repo.name, "Track1");
        assert_eq!(repo.description.bpm, 120);
        assert_eq!(repo.description.scale, "Cmin");
        assert_eq!(repo.description.genre, "house");
        assert_eq!(repo.owner.id, owner.id);
        assert!(!repo.public);
        assert!(repo.collaborators.is_empty());
        assert_eq!(repo.activity.len(), 1);
        assert_eq!(repo.activity[0].description, "Repository created");
    }

    #[tokio::test]
    async fn creating_a_repo_for_an_unknown_owner_fails() {
        let (repos, _db) = setup().await;

        let result = repos.create_repo(track_one(999)).await;

        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn updates_merge_fields_and_advance_the_timestamp() {
        let (repos, db) = setup().await;
        let owner = user(&db, "a@x.com", "alice").await;
        let repo = repos.create_repo(track_one(owner.id)).await.expect("creates");

        tokio::time::sleep(Duration::from_millis(5)).await;

        let updated = repos
            .update_repo(UpdatedRepo {
                id: repo.id,
                name: Some("X".to_string()),
                ..Default::default()
            })
            .await
            .expect("updates");

        assert_eq!(updated.name, "X");
        assert_eq!(updated.description.bpm, 120);
        assert_eq!(updated.description.scale, "Cmin");
        assert!(!updated.public);
        assert!(updated.updated_at > repo.updated_at);
        assert_eq!(updated.created_at, repo.created_at);
    }

    #[tokio::test]
    async fn public_listing_is_ordered_by_id() {
        let (repos, db) = setup().await;
        let owner = user(&db, "a@x.com", "alice").await;

        let mut expected = vec![];

        for name in ["Track1", "Track2", "Track3"] {
            let repo = repos
                .create_repo(NewRepo {
                    name: name.to_string(),
                    ..track_one(owner.id)
                })
                .await
                .expect("creates");

            repos
                .update_repo(UpdatedRepo {
                    id: repo.id,
                    public: Some(true),
                    ..Default::default()
                })
                .await
                .expect("publishes");

            expected.push(repo.id);
        }

        let listed: Vec<_> = repos
            .list_public()
            .await
            .expect("lists")
            .iter()
            .map(|r| r.id)
            .collect();

        assert_eq!(listed, expected);
    }

    #[tokio::test]
    async fn deleted_repos_are_not_found() {
        let (repos, db) = setup().await;
        let owner = user(&db, "a@x.com", "alice").await;
        let repo = repos.create_repo(track_one(owner.id)).await.expect("creates");

        repos.delete_repo(repo.id).await.expect("deletes");

        assert!(matches!(
            repos.repo_by_id(repo.id).await,
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn adding_the_same_collaborator_twice_is_a_conflict() {
        let (repos, db) = setup().await;
        let owner = user(&db, "a@x.com", "alice").await;
        let bob = user(&db, "b@x.com", "bob").await;
        let repo = repos.create_repo(track_one(owner.id)).await.expect("creates");

        let repo = repos
            .add_collaborator(repo.id, bob.id)
            .await
            .expect("adds collaborator");

        assert_eq!(repo.collaborators.len(), 1);
        assert_eq!(repo.collaborators[0].id, bob.id);

        let result = repos.add_collaborator(repo.id, bob.id).await;
        assert!(matches!(result, Err(DatabaseError::Conflict { .. })));
    }

    #[tokio::test]
    async fn private_repos_are_only_readable_by_owner_and_collaborators() {
        let (repos, db) = setup().await;
        let owner = user(&db, "a@x.com", "alice").await;
        let bob = user(&db, "b@x.com", "bob").await;
        let carol = user(&db, "c@x.com", "carol").await;

        let repo = repos.create_repo(track_one(owner.id)).await.expect("creates");
        let repo = repos
            .add_collaborator(repo.id, bob.id)
            .await
            .expect("adds collaborator");

        assert!(repo.can_access(owner.id));
        assert!(repo.can_access(bob.id));
        assert!(!repo.can_access(carol.id));

        let repo = repos
            .update_repo(UpdatedRepo {
                id: repo.id,
                public: Some(true),
                ..Default::default()
            })
            .await
            .expect("updates");

        assert!(repo.can_access(carol.id));
    }

    #[tokio::test]
    async fn repos_by_user_covers_owned_and_contributed() {
        let (repos, db) = setup().await;
        let alice = user(&db, "a@x.com", "alice").await;
        let bob = user(&db, "b@x.com", "bob").await;

        let owned = repos.create_repo(track_one(alice.id)).await.expect("creates");
        let contributed = repos.create_repo(track_one(bob.id)).await.expect("creates");
        repos
            .add_collaborator(contributed.id, alice.id)
            .await
            .expect("adds collaborator");

        let listed = repos.repos_by_user(alice.id).await.expect("lists");
        let ids: Vec<_> = listed.iter().map(|r| r.id).collect();

        assert_eq!(ids, vec![owned.id, contributed.id]);
    }

    #[tokio::test]
    async fn likes_are_unique_per_user_and_repo() {
        let (repos, db) = setup().await;
        let alice = user(&db, "a@x.com", "alice").await;
        let bob = user(&db, "b@x.com", "bob").await;
        let repo = repos.create_repo(track_one(alice.id)).await.expect("creates");

        repos.like_repo(bob.id, repo.id).await.expect("likes");

        assert!(matches!(
            repos.like_repo(bob.id, repo.id).await,
            Err(DatabaseError::Conflict { .. })
        ));

        let liked = repos.liked_repos(bob.id).await.expect("lists likes");
        assert_eq!(liked.len(), 1);
        assert_eq!(liked[0].id, repo.id);

        repos.unlike_repo(bob.id, repo.id).await.expect("unlikes");

        assert!(matches!(
            repos.unlike_repo(bob.id, repo.id).await,
            Err(DatabaseError::NotFound { .. })
        ));
    }
}
