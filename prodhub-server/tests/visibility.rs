//! Access policy coverage for the listing endpoints: private
//! repositories must stay hidden from callers outside the repository,
//! matching what the detail endpoints enforce.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use prodhub_collab::{
    Collab, Config, Credentials, FileStore, MemoryDatabase, NewPlainUser, NewRepo, UpdatedRepo,
};
use prodhub_server::create_app;
use serde_json::Value;
use tower::ServiceExt;

struct Member {
    id: i32,
    token: String,
}

async fn member(collab: &Collab<MemoryDatabase>, email: &str, username: &str) -> Member {
    let user = collab
        .auth
        .sign_up(NewPlainUser {
            email: email.to_string(),
            username: username.to_string(),
            password: "hunter42".to_string(),
        })
        .await
        .expect("signs up");

    let login = collab
        .auth
        .login(Credentials {
            email: email.to_string(),
            password: "hunter42".to_string(),
        })
        .await
        .expect("logs in");

    Member {
        id: user.id,
        token: login.token,
    }
}

/// An app over an in-memory store, an owner with one private
/// repository, and an unrelated authenticated outsider
async fn setup() -> (Router, Arc<Collab<MemoryDatabase>>, Member, Member, i32) {
    let config = Config {
        database_url: String::new(),
        port: 0,
        jwt_secret: "test-secret".to_string(),
        token_expiry_seconds: 3600,
        storage_dir: std::env::temp_dir()
            .join("prodhub-http-tests")
            .to_string_lossy()
            .into_owned(),
    };

    let collab = Arc::new(Collab::new(
        MemoryDatabase::new(),
        FileStore::new(&config.storage_dir),
        &config,
    ));

    let owner = member(&collab, "a@x.com", "alice").await;
    let outsider = member(&collab, "b@x.com", "bob").await;

    let repo = collab
        .repos
        .create_repo(NewRepo {
            name: "Track1".to_string(),
            owner_id: owner.id,
            bpm: 120,
            scale: "Cmin".to_string(),
            genre: "house".to_string(),
        })
        .await
        .expect("creates repo");

    assert!(!repo.public);

    (create_app(collab.clone()), collab, owner, outsider, repo.id)
}

async fn get_json(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .expect("builds request"),
        )
        .await
        .expect("routes request");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("reads body");

    (status, serde_json::from_slice(&bytes).expect("parses json"))
}

fn listed_ids(body: &Value) -> Vec<i64> {
    body.as_array()
        .expect("is an array")
        .iter()
        .map(|r| r["id"].as_i64().expect("has an id"))
        .collect()
}

#[tokio::test]
async fn listing_by_user_hides_private_repos_from_outsiders() {
    let (app, _, owner, outsider, repo_id) = setup().await;
    let uri = format!("/repo?user={}", owner.id);

    let (status, body) = get_json(&app, &uri, &outsider.token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(listed_ids(&body).is_empty());

    // The owner still sees their own private repository
    let (status, body) = get_json(&app, &uri, &owner.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed_ids(&body), vec![repo_id as i64]);
}

#[tokio::test]
async fn listing_by_user_keeps_public_and_shared_repos_visible() {
    let (app, collab, owner, outsider, repo_id) = setup().await;
    let uri = format!("/repo?user={}", owner.id);

    collab
        .repos
        .update_repo(UpdatedRepo {
            id: repo_id,
            public: Some(true),
            ..Default::default()
        })
        .await
        .expect("publishes");

    let (status, body) = get_json(&app, &uri, &outsider.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed_ids(&body), vec![repo_id as i64]);

    // Collaborators see the repository even while it is private
    collab
        .repos
        .update_repo(UpdatedRepo {
            id: repo_id,
            public: Some(false),
            ..Default::default()
        })
        .await
        .expect("unpublishes");
    collab
        .repos
        .add_collaborator(repo_id, outsider.id)
        .await
        .expect("adds collaborator");

    let (status, body) = get_json(&app, &uri, &outsider.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed_ids(&body), vec![repo_id as i64]);
}

#[tokio::test]
async fn profile_repo_listing_hides_private_repos_from_outsiders() {
    let (app, _, owner, outsider, repo_id) = setup().await;
    let uri = format!("/user/{}/repos", owner.id);

    let (status, body) = get_json(&app, &uri, &outsider.token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(listed_ids(&body).is_empty());

    let (status, body) = get_json(&app, &uri, &owner.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed_ids(&body), vec![repo_id as i64]);
}

#[tokio::test]
async fn liked_listing_hides_private_repos_from_outsiders() {
    let (app, collab, owner, outsider, repo_id) = setup().await;
    let uri = format!("/user/{}/likes", owner.id);

    collab
        .repos
        .like_repo(owner.id, repo_id)
        .await
        .expect("likes");

    let (status, body) = get_json(&app, &uri, &outsider.token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(listed_ids(&body).is_empty());

    let (status, body) = get_json(&app, &uri, &owner.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed_ids(&body), vec![repo_id as i64]);
}

#[tokio::test]
async fn detail_and_listing_agree_on_private_access() {
    let (app, _, _, outsider, repo_id) = setup().await;

    let (status, _) = get_json(&app, &format!("/repo/{}", repo_id), &outsider.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get_json(&app, &format!("/repo/history/{}", repo_id), &outsider.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
