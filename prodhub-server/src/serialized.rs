//! All schemas that are exposed from endpoints are defined here
//! along with the conversions from collab data

use chrono::{DateTime, Utc};
use prodhub_collab::{
    ActivityData, DescriptionData, LoginData, RepoData, UserData, VersionData,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct User {
    id: i32,
    email: String,
    username: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResult {
    token: String,
    user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Description {
    bpm: i32,
    scale: String,
    genre: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Repository {
    id: i32,
    name: String,
    owner: User,
    description: Description,
    collaborators: Vec<User>,
    versions: Vec<Version>,
    activity: Vec<Activity>,
    /// Branch support is not implemented yet, this is always empty
    #[schema(value_type = Vec<Object>)]
    branches: Vec<serde_json::Value>,
    public: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Version {
    id: i32,
    repo_id: i32,
    name: String,
    version: i32,
    url: String,
    changes: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Activity {
    date: DateTime<Utc>,
    description: String,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl ToSerialized<LoginResult> for LoginData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<Description> for DescriptionData {
    fn to_serialized(&self) -> Description {
        Description {
            bpm: self.bpm,
            scale: self.scale.clone(),
            genre: self.genre.clone(),
        }
    }
}

impl ToSerialized<Repository> for RepoData {
    fn to_serialized(&self) -> Repository {
        Repository {
            id: self.id,
            name: self.name.clone(),
            owner: self.owner.to_serialized(),
            description: self.description.to_serialized(),
            collaborators: self.collaborators.to_serialized(),
            versions: self.versions.to_serialized(),
            activity: self.activity.to_serialized(),
            branches: vec![],
            public: self.public,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl ToSerialized<Version> for VersionData {
    fn to_serialized(&self) -> Version {
        Version {
            id: self.id,
            repo_id: self.repo_id,
            name: self.name.clone(),
            version: self.version,
            url: self.url.clone(),
            changes: self.changes.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Activity> for ActivityData {
    fn to_serialized(&self) -> Activity {
        Activity {
            date: self.date,
            description: self.description.clone(),
        }
    }
}
