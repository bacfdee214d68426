//! PostgreSQL user store.
//!
//! Email and phone number are unique among ACTIVE, non-deleted users
//! (partial unique indexes), so a closed account's contact details can be
//! registered again.

use crate::errors::LendingError;
use crate::models::{NewUser, Role, User, UserId, UserIdType, UserStatus};
use crate::repositories::UserStore;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

const USER_COLUMNS: &str = r#"
    id, name, email, phone_number, password, status, role_id, is_email_verified
"#;

/// Row shape of the `users` table.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    email: String,
    phone_number: String,
    password: String,
    status: UserStatus,
    role_id: i16,
    is_email_verified: bool,
}

impl TryFrom<UserRow> for User {
    type Error = LendingError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = u8::try_from(row.role_id)
            .ok()
            .and_then(|id| Role::try_from(id).ok())
            .ok_or_else(|| {
                LendingError::Database(format!("user {} has unknown role_id {}", row.id, row.role_id))
            })?;

        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            phone_number: row.phone_number,
            password_hash: row.password,
            status: row.status,
            role,
            is_email_verified: row.is_email_verified,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[async_trait]
impl UserStore for PgUserStore {
    #[instrument(skip_all, fields(role = ?user.role))]
    async fn create_user(&self, user: NewUser) -> Result<User, LendingError> {
        let query = format!(
            r#"
            INSERT INTO users (name, email, phone_number, password, status, role_id, is_email_verified, created_by)
            VALUES ($1, $2, $3, $4, 'ACTIVE', $5, FALSE, $6)
            RETURNING {USER_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.phone_number)
            .bind(&user.password_hash)
            .bind(i16::from(user.role.id()))
            .bind(user.created_by)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    LendingError::UserAlreadyExists
                } else {
                    LendingError::from(e)
                }
            })?;

        User::try_from(row)
    }

    async fn user_exists(&self, id_type: UserIdType, value: &str) -> Result<bool, LendingError> {
        let column = match id_type {
            UserIdType::Email => "email",
            UserIdType::PhoneNumber => "phone_number",
            UserIdType::Username => return Err(LendingError::InvalidUserIdType),
        };

        let query = format!(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM users
                WHERE {column} = $1 AND status = 'ACTIVE' AND deleted_at IS NULL
            )
            "#
        );

        let (exists,): (bool,) = sqlx::query_as(&query)
            .bind(value)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn get_user_by_identifier(&self, identifier: &str) -> Result<User, LendingError> {
        // Prefer the active account when a closed one shares the identifier.
        let query = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE (email = $1 OR phone_number = $1) AND deleted_at IS NULL
            ORDER BY (status = 'ACTIVE') DESC, id DESC
            LIMIT 1
            "#
        );

        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(LendingError::UserNotFound)?;

        User::try_from(row)
    }

    async fn get_users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, LendingError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE id = ANY($1) AND deleted_at IS NULL
            ORDER BY id
            "#
        );

        let rows = sqlx::query_as::<_, UserRow>(&query)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    #[instrument(skip_all, fields(user_id = user_id, closed_by = closed_by))]
    async fn close_account(
        &self,
        user_id: UserId,
        closed_by: UserId,
    ) -> Result<User, LendingError> {
        let query = format!(
            r#"
            UPDATE users
            SET status = 'CLOSED', updated_at = NOW(), updated_by = $2
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {USER_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(user_id)
            .bind(closed_by)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(LendingError::UserNotFound)?;

        User::try_from(row)
    }
}
