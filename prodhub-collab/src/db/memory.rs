//! An in-memory [Database] used by the service tests,
//! mirroring the semantics of the postgres implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{
    ActivityData, Database, DatabaseError, DatabaseResult, DescriptionData, NewActivity,
    NewCollaborator, NewRepo, NewUser, NewVersion, PrimaryKey, RepoData, Result, UpdatedRepo,
    UpdatedUser, UserData, VersionData,
};

#[derive(Debug, Clone)]
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

#[derive(Default)]
struct State {
    next_id: PrimaryKey,
    users: Vec<UserData>,
    repos: Vec<RepoRow>,
    collaborators: Vec<(PrimaryKey, PrimaryKey)>,
    versions: Vec<VersionData>,
    activity: Vec<ActivityData>,
    likes: Vec<(PrimaryKey, PrimaryKey)>,
}

impl State {
    fn next_id(&mut self) -> PrimaryKey {
        self.next_id += 1;
        self.next_id
    }

    fn user(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })
    }

    fn repo_row(&self, repo_id: PrimaryKey) -> Result<RepoRow> {
        self.repos
            .iter()
            .find(|r| r.id == repo_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "repo",
                identifier: "id",
            })
    }

    fn hydrate(&self, row: RepoRow) -> Result<RepoData> {
        let owner = self.user(row.owner_id)?;

        let collaborators: Vec<_> = self
            .collaborators
            .iter()
            .filter(|(repo_id, _)| *repo_id == row.id)
            .map(|(_, user_id)| self.user(*user_id))
            .collect::<Result<_>>()?;

        let mut versions: Vec<_> = self
            .versions
            .iter()
            .filter(|v| v.repo_id == row.id)
            .cloned()
            .collect();

        versions.sort_by_key(|v| v.version);

        let activity: Vec<_> = self
            .activity
            .iter()
            .filter(|a| a.repo_id == row.id)
            .cloned()
            .collect();

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
}

#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<State>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.state.lock().user(user_id)
    }

    async fn user_by_email(&self, email: &str) -> Result<UserData> {
        self.state
            .lock()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "email",
            })
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_email(&new_user.email)
            .await
            .conflict_or_ok("user", "email", &new_user.email)?;

        let mut state = self.state.lock();
        let now = Utc::now();

        let user = UserData {
            id: state.next_id(),
            email: new_user.email,
            username: new_user.username,
            password: new_user.password,
            created_at: now,
            updated_at: now,
        };

        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData> {
        if let Some(email) = &updated_user.email {
            match self.user_by_email(email).await {
                Ok(existing) if existing.id != updated_user.id => {
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

        let mut state = self.state.lock();
        state.user(updated_user.id)?;

        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == updated_user.id)
            .expect("user exists");

        if let Some(email) = updated_user.email {
            user.email = email;
        }
        if let Some(username) = updated_user.username {
            user.username = username;
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    async fn repo_by_id(&self, repo_id: PrimaryKey) -> Result<RepoData> {
        let state = self.state.lock();
        let row = state.repo_row(repo_id)?;
        state.hydrate(row)
    }

    async fn list_public_repos(&self) -> Result<Vec<RepoData>> {
        let state = self.state.lock();
        state
            .repos
            .iter()
            .filter(|r| r.public)
            .map(|r| state.hydrate(r.clone()))
            .collect()
    }

    async fn repos_by_user(&self, user_id: PrimaryKey) -> Result<Vec<RepoData>> {
        let state = self.state.lock();
        state
            .repos
            .iter()
            .filter(|r| {
                r.owner_id == user_id
                    || state
                        .collaborators
                        .iter()
                        .any(|(repo_id, collab_id)| *repo_id == r.id && *collab_id == user_id)
            })
            .map(|r| state.hydrate(r.clone()))
            .collect()
    }

    async fn create_repo(&self, new_repo: NewRepo) -> Result<RepoData> {
        let mut state = self.state.lock();
        state.user(new_repo.owner_id)?;

        let now = Utc::now();
        let row = RepoRow {
            id: state.next_id(),
            name: new_repo.name,
            owner_id: new_repo.owner_id,
            bpm: new_repo.bpm,
            scale: new_repo.scale,
            genre: new_repo.genre,
            public: false,
            created_at: now,
            updated_at: now,
        };

        state.repos.push(row.clone());
        state.hydrate(row)
    }

    async fn update_repo(&self, updated_repo: UpdatedRepo) -> Result<RepoData> {
        let mut state = self.state.lock();
        state.repo_row(updated_repo.id)?;

        let row = state
            .repos
            .iter_mut()
            .find(|r| r.id == updated_repo.id)
            .expect("repo exists");

        if let Some(name) = updated_repo.name {
            row.name = name;
        }
        if let Some(bpm) = updated_repo.bpm {
            row.bpm = bpm;
        }
        if let Some(scale) = updated_repo.scale {
            row.scale = scale;
        }
        if let Some(genre) = updated_repo.genre {
            row.genre = genre;
        }
        if let Some(public) = updated_repo.public {
            row.public = public;
        }
        row.updated_at = Utc::now();

        let row = row.clone();
        state.hydrate(row)
    }

    async fn delete_repo(&self, repo_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        state.repo_row(repo_id)?;

        state.repos.retain(|r| r.id != repo_id);
        // Cascades mirror the schema: version rows stay behind
        state.collaborators.retain(|(id, _)| *id != repo_id);
        state.activity.retain(|a| a.repo_id != repo_id);

        Ok(())
    }

    async fn create_collaborator(&self, new_collaborator: NewCollaborator) -> Result<()> {
        let mut state = self.state.lock();
        state.repo_row(new_collaborator.repo_id)?;
        state.user(new_collaborator.user_id)?;

        let pair = (new_collaborator.repo_id, new_collaborator.user_id);

        if state.collaborators.contains(&pair) {
            return Err(DatabaseError::Conflict {
                resource: "collaborator",
                field: "repo:user",
                value: format!("{}:{}", pair.0, pair.1),
            });
        }

        state.collaborators.push(pair);
        Ok(())
    }

    async fn delete_collaborator(&self, repo_id: PrimaryKey, user_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        let pair = (repo_id, user_id);

        if !state.collaborators.contains(&pair) {
            return Err(DatabaseError::NotFound {
                resource: "collaborator",
                identifier: "repo_id:user_id",
            });
        }

        state.collaborators.retain(|p| *p != pair);
        Ok(())
    }

    async fn create_activity(&self, new_activity: NewActivity) -> Result<ActivityData> {
        let mut state = self.state.lock();

        let activity = ActivityData {
            id: state.next_id(),
            repo_id: new_activity.repo_id,
            date: Utc::now(),
            description: new_activity.description,
        };

        state.activity.push(activity.clone());
        Ok(activity)
    }

    async fn latest_version_number(&self, repo_id: PrimaryKey) -> Result<i32> {
        let state = self.state.lock();
        Ok(state
            .versions
            .iter()
            .filter(|v| v.repo_id == repo_id)
            .map(|v| v.version)
            .max()
            .unwrap_or(0))
    }

    async fn create_version(&self, new_version: NewVersion) -> Result<VersionData> {
        let mut state = self.state.lock();

        let version = VersionData {
            id: state.next_id(),
            repo_id: new_version.repo_id,
            name: new_version.name,
            version: new_version.version,
            url: new_version.url,
            changes: new_version.changes,
            created_at: Utc::now(),
        };

        state.versions.push(version.clone());
        Ok(version)
    }

    async fn versions_by_repo(&self, repo_id: PrimaryKey) -> Result<Vec<VersionData>> {
        let state = self.state.lock();

        let mut versions: Vec<_> = state
            .versions
            .iter()
            .filter(|v| v.repo_id == repo_id)
            .cloned()
            .collect();

        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }

    async fn create_like(&self, user_id: PrimaryKey, repo_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        state.user(user_id)?;
        state.repo_row(repo_id)?;

        let pair = (user_id, repo_id);

        if state.likes.contains(&pair) {
            return Err(DatabaseError::Conflict {
                resource: "like",
                field: "user:repo",
                value: format!("{}:{}", user_id, repo_id),
            });
        }

        state.likes.push(pair);
        Ok(())
    }

    async fn delete_like(&self, user_id: PrimaryKey, repo_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        let pair = (user_id, repo_id);

        if !state.likes.contains(&pair) {
            return Err(DatabaseError::NotFound {
                resource: "like",
                identifier: "user_id:repo_id",
            });
        }

        state.likes.retain(|p| *p != pair);
        Ok(())
    }

    async fn repos_liked_by_user(&self, user_id: PrimaryKey) -> Result<Vec<RepoData>> {
        let state = self.state.lock();
        state
            .likes
            .iter()
            .filter(|(liker, _)| *liker == user_id)
            .map(|(_, repo_id)| {
                let row = state.repo_row(*repo_id)?;
                state.hydrate(row)
            })
            .collect()
    }
}
