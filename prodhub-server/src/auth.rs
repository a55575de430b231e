use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts},
    routing::{get, post},
    Json,
};
use prodhub_collab::{Credentials, Database, UserData};

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{LoginSchema, ValidatedJson},
    serialized::{LoginResult, ToSerialized, User},
    Router,
};

/// The authenticated identity attached to a request, resolved
/// statelessly from the bearer token
pub struct Session(UserData);

impl Session {
    /// Returns the user of the session
    pub fn user(&self) -> UserData {
        self.0.clone()
    }
}

#[async_trait]
impl<Db> FromRequestParts<ServerContext<Db>> for Session
where
    Db: Database,
{
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext<Db>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .ok_or(ServerError::Unauthorized("Missing authorization"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(ServerError::Unauthorized("Authorization must be Bearer"))?;

        let user = state
            .collab
            .auth
            .session(token)
            .await
            .map_err(|_| ServerError::Unauthorized("Invalid or expired token"))?;

        // Convenience header, must agree with the token when present
        if let Some(claimed) = parts.headers.get("x-user-id").and_then(|x| x.to_str().ok()) {
            if claimed != user.id.to_string() {
                return Err(ServerError::Unauthorized(
                    "x-user-id does not match the token",
                ));
            }
        }

        Ok(Self(user))
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginSchema,
    responses(
        (status = 200, body = LoginResult),
        (status = 401, description = "Invalid email or password")
    )
)]
async fn login<Db: Database>(
    State(context): State<ServerContext<Db>>,
    ValidatedJson(body): ValidatedJson<LoginSchema>,
) -> ServerResult<Json<LoginResult>> {
    let result = context
        .collab
        .auth
        .login(Credentials {
            email: body.email,
            password: body.password,
        })
        .await?;

    Ok(Json(result.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/auth/user",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
async fn user(session: Session) -> Json<User> {
    Json(session.user().to_serialized())
}

pub fn router<Db: Database>() -> Router<Db> {
    Router::new()
        .route("/login", post(login::<Db>))
        .route("/user", get(user))
}
