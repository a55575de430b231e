use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServerError;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SignupSchema {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 2, max = 128))]
    pub username: String,
    #[validate(length(min = 6, max = 64))]
    pub password: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginSchema {
    #[validate(length(max = 128))]
    pub email: String,
    #[validate(length(max = 64))]
    pub password: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateUserSchema {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 2, max = 128))]
    pub username: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewRepoSchema {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(range(min = 20, max = 300))]
    pub bpm: i32,
    #[validate(length(min = 1, max = 32))]
    pub scale: String,
    #[validate(length(min = 1, max = 64))]
    pub genre: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateRepoSchema {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(range(min = 20, max = 300))]
    pub bpm: Option<i32>,
    #[validate(length(min = 1, max = 32))]
    pub scale: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub genre: Option<String>,
    pub public: Option<bool>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ActivitySchema {
    #[validate(length(min = 1, max = 500))]
    pub description: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CollaboratorSchema {
    pub user_id: i32,
}

/// A Json body that has passed its schema's validation rules.
/// Malformed or out-of-range bodies never reach service logic.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| ServerError::Validation("JSON parse failed".to_string()))?;

        extracted_json
            .0
            .validate()
            .map_err(|e| ServerError::Validation(e.to_string()))?;

        Ok(Self(extracted_json.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bpm_outside_the_playable_range_fails_validation() {
        let schema: NewRepoSchema = serde_json::from_value(json!({
            "name": "Track1",
            "bpm": 19,
            "scale": "Cmin",
            "genre": "house"
        }))
        .expect("deserializes");

        assert!(schema.validate().is_err());
    }

    #[test]
    fn a_well_formed_create_body_passes() {
        let schema: NewRepoSchema = serde_json::from_value(json!({
            "name": "Track1",
            "bpm": 120,
            "scale": "Cmin",
            "genre": "house"
        }))
        .expect("deserializes");

        assert!(schema.validate().is_ok());
    }

    #[test]
    fn unknown_fields_are_rejected_before_validation() {
        let result: Result<NewRepoSchema, _> = serde_json::from_value(json!({
            "name": "Track1",
            "bpm": 120,
            "scale": "Cmin",
            "genre": "house",
            "ownerId": 1
        }));

        assert!(result.is_err());
    }

    #[test]
    fn signup_requires_a_real_email_and_password_length() {
        let bad_email: SignupSchema = serde_json::from_value(json!({
            "email": "not-an-email",
            "username": "alice",
            "password": "pw1pw1"
        }))
        .expect("deserializes");
        assert!(bad_email.validate().is_err());

        let short_password: SignupSchema = serde_json::from_value(json!({
            "email": "a@x.com",
            "username": "alice",
            "password": "pw"
        }))
        .expect("deserializes");
        assert!(short_password.validate().is_err());
    }

    #[test]
    fn partial_updates_validate_only_the_provided_fields() {
        let schema: UpdateRepoSchema = serde_json::from_value(json!({
            "public": true
        }))
        .expect("deserializes");

        assert!(schema.validate().is_ok());
    }
}
