use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue, QueryFilter, SqlErr, TransactionTrait, prelude::*};

use crate::{
    Claims, EngineError, ResultEngine, TokenKind, User,
    users,
    util::{new_id, normalize_required_text},
};

use super::{Engine, with_tx};

const BAD_CREDENTIALS: &str = "password or user is incorrect";

impl Engine {
    /// Registers `username` and issues its first token pair.
    pub async fn signup(&self, username: &str, password: &str) -> ResultEngine<User> {
        let username = normalize_required_text(username, "username")?;
        if password.is_empty() {
            return Err(EngineError::InvalidInput(
                "password must not be empty".to_string(),
            ));
        }
        let password_hash = self.credentials.hash_password(password).await?;

        with_tx!(self, |db_tx| {
            let existing = users::Entity::find()
                .filter(users::Column::Username.eq(username.as_str()))
                .one(&db_tx)
                .await?;
            if existing.is_some() {
                return Err(EngineError::ExistingKey(username));
            }

            let id = new_id();
            let tokens = self.credentials.generate_tokens(&id, &username)?;
            let model = users::ActiveModel {
                id: ActiveValue::Set(id),
                username: ActiveValue::Set(username.clone()),
                password_hash: ActiveValue::Set(password_hash),
                token: ActiveValue::Set(tokens.token),
                refresh_token: ActiveValue::Set(tokens.refresh_token),
                created_at: ActiveValue::Set(Utc::now()),
                updated_at: ActiveValue::Set(None),
            }
            .insert(&db_tx)
            .await
            .map_err(|err| match err.sql_err() {
                // Lost a race against a concurrent signup.
                Some(SqlErr::UniqueConstraintViolation(_)) => EngineError::ExistingKey(username),
                _ => err.into(),
            })?;
            tracing::info!(user_id = %model.id, "user signed up");
            Ok(User::from(model))
        })
    }

    /// Checks the password and rotates the token pair.
    ///
    /// An unknown user and a wrong password fail the same way.
    pub async fn login(&self, username: &str, password: &str) -> ResultEngine<User> {
        let username = normalize_required_text(username, "username")?;
        let Some(model) = users::Entity::find()
            .filter(users::Column::Username.eq(username.as_str()))
            .one(&self.database)
            .await?
        else {
            tracing::debug!(%username, "login for unknown user");
            return Err(EngineError::Unauthorized(BAD_CREDENTIALS.to_string()));
        };

        if !self
            .credentials
            .verify_password(&model.password_hash, password)
            .await?
        {
            tracing::debug!(user_id = %model.id, "login with wrong password");
            return Err(EngineError::Unauthorized(BAD_CREDENTIALS.to_string()));
        }
        self.rotate_tokens(model).await
    }

    /// Trades the current refresh token for a new pair.
    pub async fn refresh_tokens(&self, refresh_token: &str) -> ResultEngine<User> {
        let claims = self
            .credentials
            .validate_token(refresh_token, TokenKind::Refresh)?;
        let model = users::Entity::find_by_id(claims.id.as_str())
            .one(&self.database)
            .await?
            .filter(|model| model.refresh_token == refresh_token)
            .ok_or_else(|| EngineError::Unauthorized("invalid or expired token".to_string()))?;
        self.rotate_tokens(model).await
    }

    /// Claims of a valid access token.
    ///
    /// The token must also be the one currently stored for the user, so a
    /// login or refresh revokes every access token issued before it.
    pub async fn validate_token(&self, token: &str) -> ResultEngine<Claims> {
        let claims = self.credentials.validate_token(token, TokenKind::Access)?;
        users::Entity::find_by_id(claims.id.as_str())
            .one(&self.database)
            .await?
            .filter(|model| model.token == token)
            .ok_or_else(|| EngineError::Unauthorized("invalid or expired token".to_string()))?;
        Ok(claims)
    }

    async fn rotate_tokens(&self, model: users::Model) -> ResultEngine<User> {
        let tokens = self
            .credentials
            .generate_tokens(&model.id, &model.username)?;
        let mut active: users::ActiveModel = model.into();
        active.token = ActiveValue::Set(tokens.token);
        active.refresh_token = ActiveValue::Set(tokens.refresh_token);
        active.updated_at = ActiveValue::Set(Some(Utc::now()));
        let model = active.update(&self.database).await?;
        tracing::info!(user_id = %model.id, "tokens issued");
        Ok(User::from(model))
    }
}
