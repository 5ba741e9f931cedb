use anyhow::Context;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use super::repo_types::Chef;

pub async fn insert<'e, E>(
    ex: E,
    user_id: Uuid,
    specialty: &str,
    postal_code: Option<&str>,
) -> anyhow::Result<Chef>
where
    E: Executor<'e, Database = Postgres>,
{
    let chef = sqlx::query_as::<_, Chef>(
        r#"
        INSERT INTO chefs (user_id, specialty, postal_code)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, specialty, postal_code, created_at
        "#,
    )
    .bind(user_id)
    .bind(specialty)
    .bind(postal_code)
    .fetch_one(ex)
    .await
    .context("insert chef")?;
    Ok(chef)
}
