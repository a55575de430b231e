use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json,
};
use prodhub_collab::{Database, NewPlainUser, UpdatedUser};
use serde_json::{json, Value};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{SignupSchema, UpdateUserSchema, ValidatedJson},
    serialized::{Repository, ToSerialized, User},
    Router,
};

#[utoipa::path(
    post,
    path = "/user/signup",
    tag = "user",
    request_body = SignupSchema,
    responses(
        (status = 201, body = User),
        (status = 409, description = "Email is already registered")
    )
)]
async fn signup<Db: Database>(
    State(context): State<ServerContext<Db>>,
    ValidatedJson(body): ValidatedJson<SignupSchema>,
) -> ServerResult<(StatusCode, Json<User>)> {
    let user = context
        .collab
        .auth
        .sign_up(NewPlainUser {
            email: body.email,
            username: body.username,
            password: body.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user.to_serialized())))
}

#[utoipa::path(
    get,
    path = "/user/{id}",
    tag = "user",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User),
        (status = 404, description = "User does not exist")
    )
)]
async fn get_user<Db: Database>(
    _session: Session,
    State(context): State<ServerContext<Db>>,
    Path(user_id): Path<i32>,
) -> ServerResult<Json<User>> {
    let user = context.collab.auth.user_by_id(user_id).await?;

    Ok(Json(user.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/user/{id}",
    tag = "user",
    request_body = UpdateUserSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User),
        (status = 403, description = "Caller is not this user")
    )
)]
async fn update_user<Db: Database>(
    session: Session,
    State(context): State<ServerContext<Db>>,
    Path(user_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<UpdateUserSchema>,
) -> ServerResult<Json<User>> {
    if session.user().id != user_id {
        return Err(ServerError::Forbidden(
            "Only the account holder can update this profile",
        ));
    }

    let user = context
        .collab
        .auth
        .update_user(UpdatedUser {
            id: user_id,
            email: body.email,
            username: body.username,
        })
        .await?;

    Ok(Json(user.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/user/{id}/repos",
    tag = "user",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Repository>),
        (status = 404, description = "User does not exist")
    )
)]
async fn user_repos<Db: Database>(
    session: Session,
    State(context): State<ServerContext<Db>>,
    Path(user_id): Path<i32>,
) -> ServerResult<Json<Vec<Repository>>> {
    // Resolve the user first so an unknown id is a 404, not an empty list
    let user = context.collab.auth.user_by_id(user_id).await?;
    let repos = context.collab.repos.repos_by_user(user.id).await?;

    // Another user's private repositories stay hidden from the caller
    let viewer = session.user().id;
    let repos: Vec<_> = repos.into_iter().filter(|r| r.can_access(viewer)).collect();

    Ok(Json(repos.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/user/{id}/likes",
    tag = "user",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Repository>)
    )
)]
async fn liked<Db: Database>(
    session: Session,
    State(context): State<ServerContext<Db>>,
    Path(user_id): Path<i32>,
) -> ServerResult<Json<Vec<Repository>>> {
    let user = context.collab.auth.user_by_id(user_id).await?;
    let repos = context.collab.repos.liked_repos(user.id).await?;

    // A like on a private repository must not expose it
    let viewer = session.user().id;
    let repos: Vec<_> = repos.into_iter().filter(|r| r.can_access(viewer)).collect();

    Ok(Json(repos.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/user/{id}/repos/{repo_id}/like",
    tag = "user",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Repository was liked"),
        (status = 403, description = "Caller is not this user"),
        (status = 409, description = "Repository is already liked")
    )
)]
async fn like<Db: Database>(
    session: Session,
    State(context): State<ServerContext<Db>>,
    Path((user_id, repo_id)): Path<(i32, i32)>,
) -> ServerResult<Json<Value>> {
    if session.user().id != user_id {
        return Err(ServerError::Forbidden("Only the account holder can like"));
    }

    context.collab.repos.like_repo(user_id, repo_id).await?;

    Ok(Json(json!({ "message": "Repository liked" })))
}

#[utoipa::path(
    post,
    path = "/user/{id}/repos/{repo_id}/unlike",
    tag = "user",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Like was removed"),
        (status = 403, description = "Caller is not this user")
    )
)]
async fn unlike<Db: Database>(
    session: Session,
    State(context): State<ServerContext<Db>>,
    Path((user_id, repo_id)): Path<(i32, i32)>,
) -> ServerResult<Json<Value>> {
    if session.user().id != user_id {
        return Err(ServerError::Forbidden("Only the account holder can unlike"));
    }

    context.collab.repos.unlike_repo(user_id, repo_id).await?;

    Ok(Json(json!({ "message": "Like removed" })))
}

pub fn router<Db: Database>() -> Router<Db> {
    Router::new()
        .route("/signup", post(signup::<Db>))
        .route("/:id", get(get_user::<Db>).put(update_user::<Db>))
        .route("/:id/repos", get(user_repos::<Db>))
        .route("/:id/likes", get(liked::<Db>))
        .route("/:id/repos/:repo_id/like", post(like::<Db>))
        .route("/:id/repos/:repo_id/unlike", post(unlike::<Db>))
}
