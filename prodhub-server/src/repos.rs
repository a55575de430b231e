use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json,
};
use prodhub_collab::{Database, NewRepo, NewVersionFile, UpdatedRepo};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{ActivitySchema, CollaboratorSchema, NewRepoSchema, UpdateRepoSchema, ValidatedJson},
    serialized::{Activity, Repository, ToSerialized, Version},
    Router,
};

/// FLP project files can get large, so uploads are allowed
/// well past the default body limit.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Restricts the listing to repositories this user owns or contributes to
    user: Option<i32>,
}

#[utoipa::path(
    post,
    path = "/repo/create",
    tag = "repo",
    request_body = NewRepoSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = Repository)
    )
)]
async fn create_repo<Db: Database>(
    session: Session,
    State(context): State<ServerContext<Db>>,
    ValidatedJson(body): ValidatedJson<NewRepoSchema>,
) -> ServerResult<(StatusCode, Json<Repository>)> {
    let repo = context
        .collab
        .repos
        .create_repo(NewRepo {
            name: body.name,
            owner_id: session.user().id,
            bpm: body.bpm,
            scale: body.scale,
            genre: body.genre,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(repo.to_serialized())))
}

#[utoipa::path(
    get,
    path = "/repo/",
    tag = "repo",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Repository>)
    )
)]
async fn list_repos<Db: Database>(
    session: Session,
    State(context): State<ServerContext<Db>>,
    Query(query): Query<ListQuery>,
) -> ServerResult<Json<Vec<Repository>>> {
    let repos = match query.user {
        Some(user_id) => context.collab.repos.repos_by_user(user_id).await?,
        None => context.collab.repos.list_public().await?,
    };

    // Private repositories never leave the listing unless the caller
    // could also fetch them directly
    let viewer = session.user().id;
    let repos: Vec<_> = repos.into_iter().filter(|r| r.can_access(viewer)).collect();

    Ok(Json(repos.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/repo/{id}",
    tag = "repo",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Repository),
        (status = 403, description = "Repository is private"),
        (status = 404, description = "Repository does not exist")
    )
)]
async fn get_repo<Db: Database>(
    session: Session,
    State(context): State<ServerContext<Db>>,
    Path(repo_id): Path<i32>,
) -> ServerResult<Json<Repository>> {
    let repo = context.collab.repos.repo_by_id(repo_id).await?;

    if !repo.can_access(session.user().id) {
        return Err(ServerError::Forbidden("Access denied"));
    }

    Ok(Json(repo.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/repo/{id}",
    tag = "repo",
    request_body = UpdateRepoSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Repository),
        (status = 403, description = "Caller does not own the repository")
    )
)]
async fn update_repo<Db: Database>(
    session: Session,
    State(context): State<ServerContext<Db>>,
    Path(repo_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<UpdateRepoSchema>,
) -> ServerResult<Json<Repository>> {
    let repo = context.collab.repos.repo_by_id(repo_id).await?;

    if !repo.is_owner(session.user().id) {
        return Err(ServerError::Forbidden(
            "Only the owner can update this repository",
        ));
    }

    let repo = context
        .collab
        .repos
        .update_repo(UpdatedRepo {
            id: repo_id,
            name: body.name,
            bpm: body.bpm,
            scale: body.scale,
            genre: body.genre,
            public: body.public,
        })
        .await?;

    Ok(Json(repo.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/repo/{id}",
    tag = "repo",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Repository was deleted"),
        (status = 403, description = "Caller does not own the repository")
    )
)]
async fn delete_repo<Db: Database>(
    session: Session,
    State(context): State<ServerContext<Db>>,
    Path(repo_id): Path<i32>,
) -> ServerResult<Json<Value>> {
    let repo = context.collab.repos.repo_by_id(repo_id).await?;

    if !repo.is_owner(session.user().id) {
        return Err(ServerError::Forbidden(
            "Only the owner can delete this repository",
        ));
    }

    context.collab.repos.delete_repo(repo_id).await?;

    Ok(Json(json!({ "message": "Repository deleted successfully" })))
}

#[utoipa::path(
    post,
    path = "/repo/upload/{id}",
    tag = "repo",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = Version),
        (status = 400, description = "No file in the payload"),
        (status = 403, description = "Caller is not a member of the repository")
    )
)]
async fn upload_version<Db: Database>(
    session: Session,
    State(context): State<ServerContext<Db>>,
    Path(repo_id): Path<i32>,
    mut multipart: Multipart,
) -> ServerResult<(StatusCode, Json<Version>)> {
    let repo = context.collab.repos.repo_by_id(repo_id).await?;
    let user = session.user();

    // Uploading requires membership, not just read access
    if !repo.is_owner(user.id) && !repo.collaborators.iter().any(|c| c.id == user.id) {
        return Err(ServerError::Forbidden(
            "Only the owner and collaborators can upload versions",
        ));
    }

    let mut file: Option<NewVersionFile> = None;
    let mut changes = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::Validation(e.to_string()))?
    {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::Validation(e.to_string()))?;

                file = Some(NewVersionFile {
                    name,
                    data: data.to_vec(),
                });
            }
            Some("changes") => {
                changes = field
                    .text()
                    .await
                    .map_err(|e| ServerError::Validation(e.to_string()))?;
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| ServerError::Validation("File not found".to_string()))?;

    let version = context
        .collab
        .versions
        .add_version(repo_id, file, changes)
        .await?;

    Ok((StatusCode::CREATED, Json(version.to_serialized())))
}

#[utoipa::path(
    get,
    path = "/repo/history/{id}",
    tag = "repo",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Version>),
        (status = 403, description = "Repository is private"),
        (status = 404, description = "Repository does not exist")
    )
)]
async fn history<Db: Database>(
    session: Session,
    State(context): State<ServerContext<Db>>,
    Path(repo_id): Path<i32>,
) -> ServerResult<Json<Vec<Version>>> {
    let repo = context.collab.repos.repo_by_id(repo_id).await?;

    if !repo.can_access(session.user().id) {
        return Err(ServerError::Forbidden("Access denied"));
    }

    let versions = context.collab.versions.list_versions(repo_id).await?;

    Ok(Json(versions.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/repo/{id}/activity",
    tag = "repo",
    request_body = ActivitySchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = Activity)
    )
)]
async fn add_activity<Db: Database>(
    session: Session,
    State(context): State<ServerContext<Db>>,
    Path(repo_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<ActivitySchema>,
) -> ServerResult<(StatusCode, Json<Activity>)> {
    let repo = context.collab.repos.repo_by_id(repo_id).await?;

    if !repo.can_access(session.user().id) {
        return Err(ServerError::Forbidden("Access denied"));
    }

    let activity = context
        .collab
        .repos
        .add_activity(repo_id, body.description)
        .await?;

    Ok((StatusCode::CREATED, Json(activity.to_serialized())))
}

#[utoipa::path(
    post,
    path = "/repo/{id}/collaborators",
    tag = "repo",
    request_body = CollaboratorSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = Repository),
        (status = 403, description = "Caller does not own the repository"),
        (status = 409, description = "User is already a collaborator")
    )
)]
async fn add_collaborator<Db: Database>(
    session: Session,
    State(context): State<ServerContext<Db>>,
    Path(repo_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<CollaboratorSchema>,
) -> ServerResult<(StatusCode, Json<Repository>)> {
    let repo = context.collab.repos.repo_by_id(repo_id).await?;

    if !repo.is_owner(session.user().id) {
        return Err(ServerError::Forbidden(
            "Only the owner can manage collaborators",
        ));
    }

    let repo = context
        .collab
        .repos
        .add_collaborator(repo_id, body.user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(repo.to_serialized())))
}

#[utoipa::path(
    delete,
    path = "/repo/{id}/collaborators/{user_id}",
    tag = "repo",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Collaborator was removed"),
        (status = 403, description = "Caller does not own the repository")
    )
)]
async fn remove_collaborator<Db: Database>(
    session: Session,
    State(context): State<ServerContext<Db>>,
    Path((repo_id, user_id)): Path<(i32, i32)>,
) -> ServerResult<Json<Value>> {
    let repo = context.collab.repos.repo_by_id(repo_id).await?;

    if !repo.is_owner(session.user().id) {
        return Err(ServerError::Forbidden(
            "Only the owner can manage collaborators",
        ));
    }

    context
        .collab
        .repos
        .remove_collaborator(repo_id, user_id)
        .await?;

    Ok(Json(json!({ "message": "Collaborator removed successfully" })))
}

pub fn router<Db: Database>() -> Router<Db> {
    Router::new()
        .route("/", get(list_repos::<Db>))
        .route("/create", post(create_repo::<Db>))
        .route(
            "/:id",
            get(get_repo::<Db>)
                .put(update_repo::<Db>)
                .delete(delete_repo::<Db>),
        )
        .route(
            "/upload/:id",
            post(upload_version::<Db>).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/history/:id", get(history::<Db>))
        .route("/:id/activity", post(add_activity::<Db>))
        .route("/:id/collaborators", post(add_collaborator::<Db>))
        .route(
            "/:id/collaborators/:user_id",
            delete(remove_collaborator::<Db>),
        )
}
