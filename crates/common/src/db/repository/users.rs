use super::Repository;
use crate::db::models::*;
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use uuid::Uuid;

/// Partial profile update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub preferred_language: Option<Language>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.avatar_url.is_none()
            && self.preferred_language.is_none()
    }
}

impl Repository {
    // ========================================================================
    // User Operations
    // ========================================================================

    /// Create a new user
    pub async fn create_user(
        &self,
        email: String,
        password_hash: String,
        display_name: Option<String>,
        preferred_language: Language,
    ) -> Result<User> {
        let now = Utc::now();

        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            password_hash: Set(password_hash),
            display_name: Set(display_name),
            avatar_url: Set(None),
            preferred_language: Set(preferred_language),
            is_active: Set(true),
            last_login_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        user.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find user by email
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find an active user by ID
    pub async fn find_active_user(&self, id: Uuid) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .filter(UserColumn::IsActive.eq(true))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Record a successful login
    pub async fn touch_last_login(&self, user: User) -> Result<User> {
        let now = Utc::now();
        let mut active: UserActiveModel = user.into();
        active.last_login_at = Set(Some(now.into()));
        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Apply a profile patch to an active user
    pub async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<User> {
        let user = self
            .find_active_user(id)
            .await?
            .ok_or(AppError::NotFound { resource: "User" })?;

        if patch.is_empty() {
            return Ok(user);
        }

        let mut active: UserActiveModel = user.into();
        if let Some(name) = patch.display_name {
            active.display_name = Set(Some(name));
        }
        if let Some(url) = patch.avatar_url {
            active.avatar_url = Set(Some(url));
        }
        if let Some(lang) = patch.preferred_language {
            active.preferred_language = Set(lang);
        }
        active.updated_at = Set(Utc::now().into());

        active.update(self.write_conn()).await.map_err(Into::into)
    }

    // ========================================================================
    // Refresh Token Operations
    // ========================================================================

    /// Store a hashed refresh token
    pub async fn store_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken> {
        let token = RefreshTokenActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            token_hash: Set(token_hash),
            expires_at: Set(expires_at.into()),
            revoked_at: Set(None),
            created_at: Set(Utc::now().into()),
        };

        token.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find an unrevoked, unexpired refresh token by hash
    pub async fn find_valid_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
        let now = Utc::now();
        RefreshTokenEntity::find()
            .filter(RefreshTokenColumn::TokenHash.eq(token_hash))
            .filter(RefreshTokenColumn::RevokedAt.is_null())
            .filter(RefreshTokenColumn::ExpiresAt.gt(now))
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    /// Revoke `presented` and store its replacement in one transaction
    pub async fn rotate_refresh_token(
        &self,
        presented: RefreshToken,
        new_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken> {
        let now = Utc::now();
        let user_id = presented.user_id;
        let txn = self.write_conn().begin().await?;

        let mut revoked: RefreshTokenActiveModel = presented.into();
        revoked.revoked_at = Set(Some(now.into()));
        revoked.update(&txn).await?;

        let replacement = RefreshTokenActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            token_hash: Set(new_hash),
            expires_at: Set(expires_at.into()),
            revoked_at: Set(None),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(replacement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::{mock_repo, sql_log};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            password_hash: "$argon2id$stub".into(),
            display_name: Some("Ada".into()),
            avatar_url: None,
            preferred_language: Language::En,
            is_active: true,
            last_login_at: None,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    fn token(user_id: Uuid, hash: &str) -> RefreshToken {
        let now = Utc::now();
        RefreshToken {
            id: Uuid::new_v4(),
            user_id,
            token_hash: hash.into(),
            expires_at: (now + chrono::Duration::days(7)).into(),
            revoked_at: None,
            created_at: now.into(),
        }
    }

    #[tokio::test]
    async fn test_inactive_users_filtered() {
        let repo = mock_repo(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([Vec::<User>::new()]),
        );

        assert!(repo.find_active_user(Uuid::new_v4()).await.unwrap().is_none());

        let log = sql_log(repo);
        assert!(log[0].contains(r#""users"."is_active" = "#), "{}", log[0]);
    }

    #[tokio::test]
    async fn test_empty_patch_skips_write() {
        let existing = user();
        let repo = mock_repo(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![existing.clone()]]),
        );

        let updated = repo.update_user(existing.id, UserPatch::default()).await.unwrap();
        assert_eq!(updated, existing);

        let log = sql_log(repo);
        assert_eq!(log.len(), 1);
        assert!(log[0].starts_with("SELECT"));
    }

    #[tokio::test]
    async fn test_update_missing_user_is_not_found() {
        let repo = mock_repo(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([Vec::<User>::new()]),
        );

        let patch = UserPatch {
            display_name: Some("Grace".into()),
            ..UserPatch::default()
        };
        let err = repo.update_user(Uuid::new_v4(), patch).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { resource: "User" }));
        assert!(sql_log(repo).iter().all(|sql| !sql.starts_with("UPDATE")));
    }

    #[tokio::test]
    async fn test_rotation_runs_in_one_transaction() {
        let user_id = Uuid::new_v4();
        let presented = token(user_id, "old");
        let mut revoked = presented.clone();
        revoked.revoked_at = Some(Utc::now().into());
        let replacement = token(user_id, "new");

        let repo = mock_repo(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![revoked], vec![replacement.clone()]]),
        );

        let stored = repo
            .rotate_refresh_token(presented, "new".into(), Utc::now() + chrono::Duration::days(7))
            .await
            .unwrap();
        assert_eq!(stored, replacement);

        let log = sql_log(repo);
        assert_eq!(log.first().map(String::as_str), Some("BEGIN"));
        assert!(log[1].starts_with(r#"UPDATE "refresh_tokens""#), "{}", log[1]);
        assert!(log[2].starts_with(r#"INSERT INTO "refresh_tokens""#), "{}", log[2]);
        assert_eq!(log.last().map(String::as_str), Some("COMMIT"));
    }
}
