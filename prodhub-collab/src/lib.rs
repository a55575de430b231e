mod auth;
mod config;
mod db;
mod repos;
mod storage;
mod util;
mod versions;

use std::sync::Arc;

pub use auth::*;
pub use config::*;
pub use db::*;
pub use repos::*;
pub use storage::*;
pub use versions::*;

/// The prodhub collab system, facilitating repository management,
/// version history, and authentication.
pub struct Collab<Db> {
    pub auth: Auth<Db>,
    pub repos: RepoManager<Db>,
    pub versions: VersionManager<Db>,
}

impl<Db> Collab<Db>
where
    Db: Database,
{
    pub fn new(database: Db, files: FileStore, config: &Config) -> Self {
        let database = Arc::new(database);
        let files = Arc::new(files);

        Self {
            auth: Auth::new(&database, &config.jwt_secret, config.token_expiry_seconds),
            repos: RepoManager::new(&database),
            versions: VersionManager::new(&database, &files),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::random_string;

    fn test_config() -> Config {
        Config {
            database_url: String::new(),
            port: 0,
            jwt_secret: "test-secret".to_string(),
            token_expiry_seconds: 3600,
            storage_dir: std::env::temp_dir()
                .join(format!("prodhub-test-{}", random_string(8)))
                .to_string_lossy()
                .into_owned(),
        }
    }

    #[tokio::test]
    async fn a_producer_can_go_from_signup_to_a_version_history() {
        let config = test_config();
        let collab = Collab::new(MemoryDatabase::new(), FileStore::new(&config.storage_dir), &config);

        let user = collab
            .auth
            .sign_up(NewPlainUser {
                email: "a@x.com".to_string(),
                username: "alice".to_string(),
                password: "hunter42".to_string(),
            })
            .await
            .expect("signs up");

        let login = collab
            .auth
            .login(Credentials {
                email: "a@x.com".to_string(),
                password: "hunter42".to_string(),
            })
            .await
            .expect("logs in");

        let session = collab.auth.session(&login.token).await.expect("resolves");
        assert_eq!(session.id, user.id);

        let repo = collab
            .repos
            .create_repo(NewRepo {
                name: "Track1".to_string(),
                owner_id: user.id,
                bpm: 120,
                scale: "Cmin".to_string(),
                genre: "house".to_string(),
            })
            .await
            .expect("creates repo");

        assert_eq!(repo.description.bpm, 120);

        for expected in 1..=2 {
            let version = collab
                .versions
                .add_version(
                    repo.id,
                    NewVersionFile {
                        name: "mix.flp".to_string(),
                        data: b"flp bytes".to_vec(),
                    },
                    format!("take {}", expected),
                )
                .await
                .expect("adds version");

            assert_eq!(version.version, expected);
        }

        let history = collab.versions.list_versions(repo.id).await.expect("lists");
        let numbers: Vec<_> = history.iter().map(|v| v.version).collect();

        assert_eq!(numbers, vec![1, 2]);
    }
}
