use crate::auth::repo_types::{NewUser, User};
use crate::auth::services::ProfileChanges;
use anyhow::Context;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, full_name, username, email, password_hash, phone_number, postal_code,
                   profile_picture, is_chef, active_address_id, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id<'e, E>(ex: E, id: Uuid) -> anyhow::Result<Option<User>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, full_name, username, email, password_hash, phone_number, postal_code,
                   profile_picture, is_chef, active_address_id, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(ex)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    /// Same as [`User::find_by_id`] but takes a row lock for the rest of the transaction.
    pub async fn lock_by_id<'e, E>(ex: E, id: Uuid) -> anyhow::Result<Option<User>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, full_name, username, email, password_hash, phone_number, postal_code,
                   profile_picture, is_chef, active_address_id, created_at
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(ex)
        .await
        .context("lock user")?;
        Ok(user)
    }

    /// True if an account other than `except` already uses this email or username.
    pub async fn identity_taken(
        db: &PgPool,
        email: Option<&str>,
        username: Option<&str>,
        except: Option<Uuid>,
    ) -> anyhow::Result<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM users
                 WHERE (email = $1 OR username = $2)
                   AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(email)
        .bind(username)
        .bind(except)
        .fetch_one(db)
        .await
        .context("check identity")?;
        Ok(taken)
    }

    /// Overwrites the fields present in `changes`.
    pub async fn update_profile(db: &PgPool, id: Uuid, changes: &ProfileChanges) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET full_name = COALESCE($2, full_name),
                   username = COALESCE($3, username),
                   email = COALESCE($4, email),
                   phone_number = COALESCE($5, phone_number),
                   profile_picture = COALESCE($6, profile_picture)
             WHERE id = $1
            RETURNING id, full_name, username, email, password_hash, phone_number, postal_code,
                      profile_picture, is_chef, active_address_id, created_at
            "#,
        )
        .bind(id)
        .bind(changes.full_name.as_deref())
        .bind(changes.username.as_deref())
        .bind(changes.email.as_deref())
        .bind(changes.phone_number.as_deref())
        .bind(changes.profile_picture.as_deref())
        .fetch_optional(db)
        .await
        .context("update profile")?;
        Ok(user)
    }

    /// Create a new user with hashed password.
    pub async fn create(db: &PgPool, new: &NewUser<'_>) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (full_name, username, email, password_hash, phone_number, postal_code)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, full_name, username, email, password_hash, phone_number, postal_code,
                      profile_picture, is_chef, active_address_id, created_at
            "#,
        )
        .bind(&new.registration.full_name)
        .bind(&new.registration.username)
        .bind(&new.registration.email)
        .bind(new.password_hash)
        .bind(new.registration.phone_number.as_deref())
        .bind(new.registration.postal_code.as_deref())
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn set_active_address<'e, E>(
        ex: E,
        user_id: Uuid,
        address_id: Option<Uuid>,
    ) -> anyhow::Result<()>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE users SET active_address_id = $2 WHERE id = $1")
            .bind(user_id)
            .bind(address_id)
            .execute(ex)
            .await
            .context("set active address")?;
        Ok(())
    }

    /// Store a new password hash. Returns false for an unknown user.
    pub async fn set_password_hash(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(db)
            .await
            .context("update password hash")?;
        Ok(res.rows_affected() == 1)
    }

    pub async fn mark_chef<'e, E>(ex: E, user_id: Uuid) -> anyhow::Result<()>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE users SET is_chef = TRUE WHERE id = $1")
            .bind(user_id)
            .execute(ex)
            .await
            .context("mark user as chef")?;
        Ok(())
    }
}
