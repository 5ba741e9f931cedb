use anyhow::Context;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use super::dto::NewAddress;
use super::repo_types::{Address, ADDRESS_COLUMNS};

/// Insert a new address for `user_id`.
pub async fn insert<'e, E>(ex: E, user_id: Uuid, a: &NewAddress) -> anyhow::Result<Address>
where
    E: Executor<'e, Database = Postgres>,
{
    let address = sqlx::query_as::<_, Address>(
        r#"
        INSERT INTO addresses
            (user_id, street, city, state, postal_code, country, formatted_address, latitude, longitude)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, user_id, street, city, state, postal_code, country, formatted_address, latitude, longitude
        "#,
    )
    .bind(user_id)
    .bind(&a.street)
    .bind(&a.city)
    .bind(&a.state)
    .bind(&a.postal_code)
    .bind(&a.country)
    .bind(&a.formatted_address)
    .bind(a.location.latitude)
    .bind(a.location.longitude)
    .fetch_one(ex)
    .await
    .context("insert address")?;
    Ok(address)
}

pub async fn count_live<'e, E>(ex: E, user_id: Uuid) -> anyhow::Result<i64>
where
    E: Executor<'e, Database = Postgres>,
{
    let n = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM addresses WHERE user_id = $1 AND NOT is_deleted",
    )
    .bind(user_id)
    .fetch_one(ex)
    .await
    .context("count addresses")?;
    Ok(n)
}

/// One page of the user's live addresses, newest first, plus their total.
pub async fn list_live(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<Address>, i64)> {
    let sql = format!(
        "SELECT {ADDRESS_COLUMNS} FROM addresses \
         WHERE user_id = $1 AND NOT is_deleted \
         ORDER BY created_at DESC, id LIMIT $2 OFFSET $3"
    );
    let rows = sqlx::query_as::<_, Address>(&sql)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("list addresses")?;
    let total = count_live(db, user_id).await?;
    Ok((rows, total))
}

/// The address, if it belongs to `user_id` and is not deleted.
pub async fn find_live_owned<'e, E>(ex: E, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Address>>
where
    E: Executor<'e, Database = Postgres>,
{
    let address = sqlx::query_as::<_, Address>(
        r#"
        SELECT id, user_id, street, city, state, postal_code, country, formatted_address, latitude, longitude
          FROM addresses
         WHERE id = $1 AND user_id = $2 AND NOT is_deleted
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(ex)
    .await
    .context("find address")?;
    Ok(address)
}

const UPDATE_OWNED: &str = r#"
    UPDATE addresses
       SET street = $3, city = $4, state = $5, postal_code = $6, country = $7,
           formatted_address = $8, latitude = $9, longitude = $10, updated_at = now()
     WHERE id = $1 AND user_id = $2 AND NOT is_deleted
    RETURNING id, user_id, street, city, state, postal_code, country, formatted_address, latitude, longitude
"#;

/// Replace the fields of the user's live address. `None` when no live
/// address of `user_id` has this id.
pub async fn update_owned<'e, E>(
    ex: E,
    id: Uuid,
    user_id: Uuid,
    a: &NewAddress,
) -> anyhow::Result<Option<Address>>
where
    E: Executor<'e, Database = Postgres>,
{
    let address = sqlx::query_as::<_, Address>(UPDATE_OWNED)
        .bind(id)
        .bind(user_id)
        .bind(&a.street)
        .bind(&a.city)
        .bind(&a.state)
        .bind(&a.postal_code)
        .bind(&a.country)
        .bind(&a.formatted_address)
        .bind(a.location.latitude)
        .bind(a.location.longitude)
        .fetch_optional(ex)
        .await
        .context("update address")?;
    Ok(address)
}

/// Mark the address deleted. Returns false if it was not the user's live address.
pub async fn soft_delete_owned<'e, E>(ex: E, id: Uuid, user_id: Uuid) -> anyhow::Result<bool>
where
    E: Executor<'e, Database = Postgres>,
{
    let res = sqlx::query(
        r#"
        UPDATE addresses
           SET is_deleted = TRUE, updated_at = now()
         WHERE id = $1 AND user_id = $2 AND NOT is_deleted
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(ex)
    .await
    .context("soft delete address")?;
    Ok(res.rows_affected() == 1)
}

/// Most recently created live address of the user, if any.
pub async fn latest_live<'e, E>(ex: E, user_id: Uuid) -> anyhow::Result<Option<Uuid>>
where
    E: Executor<'e, Database = Postgres>,
{
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id
          FROM addresses
         WHERE user_id = $1 AND NOT is_deleted
         ORDER BY created_at DESC, id
         LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(ex)
    .await
    .context("latest address")?;
    Ok(id)
}
