use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::{Database, DatabaseError, NewUser, PrimaryKey, UpdatedUser, UserData};

/// Facilitates account management and stateless session tokens.
/// A token carries the user's identity and expiry in its claims,
/// so nothing is persisted between requests.
pub struct Auth<Db> {
    db: Arc<Db>,
    argon: Argon2<'static>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_expiry_seconds: u64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Email or password is incorrect. Deliberately the same error for an
    /// unknown email and a wrong password, so accounts can't be enumerated.
    #[error("Invalid email or password")]
    InvalidCredentials,
    /// The token is malformed, tampered with, or past its expiry
    #[error("Invalid or expired token")]
    InvalidToken,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
    #[error("HashError: {0}")]
    HashError(String),
    #[error("TokenError: {0}")]
    TokenError(String),
}

/// The claims carried by a session token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The id of the user this token asserts
    pub sub: String,
    /// Expiry, as a unix timestamp
    pub exp: usize,
    /// Issued at, as a unix timestamp
    pub iat: usize,
}

/// A successful login: the signed token and the user it belongs to
#[derive(Debug)]
pub struct LoginData {
    pub token: String,
    pub user: UserData,
}

#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug)]
pub struct NewPlainUser {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl<Db> Auth<Db>
where
    Db: Database,
{
    pub fn new(db: &Arc<Db>, secret: &str, token_expiry_seconds: u64) -> Self {
        Self {
            db: db.clone(),
            argon: Argon2::default(),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            token_expiry_seconds,
        }
    }

    /// Creates an account, storing a one-way hash of the password
    pub async fn sign_up(&self, new_user: NewPlainUser) -> Result<UserData, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hashed_password = self
            .argon
            .hash_password(new_user.password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string();

        self.db
            .create_user(NewUser {
                email: new_user.email,
                username: new_user.username,
                password: hashed_password,
            })
            .await
            .map_err(AuthError::Db)
    }

    /// Logs in a user, returning a freshly signed session token
    pub async fn login(&self, credentials: Credentials) -> Result<LoginData, AuthError> {
        let user = self
            .db
            .user_by_email(&credentials.email)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => AuthError::InvalidCredentials,
                err => AuthError::Db(err),
            })?;

        let stored_password = PasswordHash::parse(&user.password, Encoding::default())
            .map_err(|e| AuthError::HashError(e.to_string()))?;

        self.argon
            .verify_password(credentials.password.as_bytes(), &stored_password)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let token = self.issue_token(user.id)?;

        Ok(LoginData { token, user })
    }

    /// Signs a token asserting the given user's identity with a fixed expiry
    pub fn issue_token(&self, user_id: PrimaryKey) -> Result<String, AuthError> {
        let now = Utc::now().timestamp() as usize;

        let claims = Claims {
            sub: user_id.to_string(),
            exp: now + self.token_expiry_seconds as usize,
            iat: now,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenError(e.to_string()))
    }

    /// Validates a token's signature and expiry, returning its claims
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Resolves the user a token asserts, if the token is valid
    pub async fn session(&self, token: &str) -> Result<UserData, AuthError> {
        let claims = self.verify_token(token)?;

        let user_id: PrimaryKey = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;

        self.db.user_by_id(user_id).await.map_err(|e| match e {
            DatabaseError::NotFound { .. } => AuthError::InvalidToken,
            err => AuthError::Db(err),
        })
    }

    /// Fetches a user by id
    pub async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData, DatabaseError> {
        self.db.user_by_id(user_id).await
    }

    /// Updates a user's profile
    pub async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData, DatabaseError> {
        self.db.update_user(updated_user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryDatabase;

    fn setup() -> Auth<MemoryDatabase> {
        Auth::new(&Arc::new(MemoryDatabase::new()), "test-secret", 3600)
    }

    fn alice() -> NewPlainUser {
        NewPlainUser {
            email: "a@x.com".to_string(),
            username: "alice".to_string(),
            password: "pw1pw1".to_string(),
        }
    }

    #[tokio::test]
    async fn sign_up_stores_a_hash_and_not_the_plaintext() {
        let auth = setup();

        let user = auth.sign_up(alice()).await.expect("signs up");

        assert_ne!(user.password, "pw1pw1");
        assert!(user.password.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn sign_up_with_taken_email_is_a_conflict() {
        let auth = setup();

        auth.sign_up(alice()).await.expect("signs up");

        let second = NewPlainUser {
            username: "alice2".to_string(),
            ..alice()
        };

        let result = auth.sign_up(second).await;

        assert!(matches!(
            result,
            Err(AuthError::Db(DatabaseError::Conflict { field: "email", .. }))
        ));
    }

    #[tokio::test]
    async fn login_issues_a_token_the_session_check_accepts() {
        let auth = setup();
        let user = auth.sign_up(alice()).await.expect("signs up");

        let login = auth
            .login(Credentials {
                email: "a@x.com".to_string(),
                password: "pw1pw1".to_string(),
            })
            .await
            .expect("logs in");

        assert!(!login.token.is_empty());
        assert_eq!(login.user.id, user.id);

        let resolved = auth.session(&login.token).await.expect("session resolves");
        assert_eq!(resolved.id, user.id);
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_rejected() {
        let auth = setup();
        auth.sign_up(alice()).await.expect("signs up");

        let result = auth
            .login(Credentials {
                email: "a@x.com".to_string(),
                password: "wrong".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn login_with_unknown_email_is_rejected_identically() {
        let auth = setup();

        let result = auth
            .login(Credentials {
                email: "nobody@x.com".to_string(),
                password: "pw1pw1".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn expired_tokens_are_rejected() {
        let auth = setup();
        let user = auth.sign_up(alice()).await.expect("signs up");

        // Craft a token that expired well past the default leeway
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user.id.to_string(),
            exp: now - 600,
            iat: now - 4200,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .expect("encodes");

        assert!(matches!(
            auth.verify_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn tokens_signed_with_another_secret_are_rejected() {
        let auth = setup();
        let user = auth.sign_up(alice()).await.expect("signs up");

        let other = Auth::new(&Arc::new(MemoryDatabase::new()), "other-secret", 3600);
        let forged = other.issue_token(user.id).expect("issues");

        assert!(matches!(
            auth.session(&forged).await,
            Err(AuthError::InvalidToken)
        ));
    }
}
