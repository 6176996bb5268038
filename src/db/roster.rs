use crate::error::AppError;
use crate::models::RosterEntry;
use sqlx::SqlitePool;

pub async fn find_by_id_or_contact(
    pool: &SqlitePool,
    id: &str,
    contact_token: &str,
) -> Result<Option<RosterEntry>, AppError> {
    let entry = sqlx::query_as::<_, RosterEntry>(
        r#"
        SELECT id, display_name, contact_token, created_at
        FROM roster_entries
        WHERE id = ? OR contact_token = ?
        LIMIT 1
        "#,
    )
    .bind(id)
    .bind(contact_token)
    .fetch_optional(pool)
    .await?;

    Ok(entry)
}

pub async fn find_by_contact(
    pool: &SqlitePool,
    contact_token: &str,
) -> Result<Option<RosterEntry>, AppError> {
    let entry = sqlx::query_as::<_, RosterEntry>(
        r#"
        SELECT id, display_name, contact_token, created_at
        FROM roster_entries
        WHERE contact_token = ?
        "#,
    )
    .bind(contact_token)
    .fetch_optional(pool)
    .await?;

    Ok(entry)
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<RosterEntry>, AppError> {
    let entry = sqlx::query_as::<_, RosterEntry>(
        r#"
        SELECT id, display_name, contact_token, created_at
        FROM roster_entries
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(entry)
}

/// Returns `true` when this call inserted the row, `false` when the contact
/// token was already enrolled.
pub async fn insert_if_absent(
    pool: &SqlitePool,
    id: &str,
    display_name: &str,
    contact_token: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO roster_entries (id, display_name, contact_token)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(display_name)
    .bind(contact_token)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
