//! User and client lookups

use salesmind_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};

use crate::models::{Client, Role, User};

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        name: row.try_get("name")?,
        role: role.parse().map_err(Error::Internal)?,
    })
}

fn client_from_row(row: &SqliteRow) -> Result<Client> {
    Ok(Client {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        name: row.try_get("name")?,
    })
}

pub async fn find_user<'e, E>(executor: E, id: i64) -> Result<Option<User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT id, tenant_id, name, role FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

pub async fn insert_user(pool: &SqlitePool, tenant_id: i64, name: &str, role: Role) -> Result<i64> {
    let result = sqlx::query("INSERT INTO users (tenant_id, name, role) VALUES (?, ?, ?)")
        .bind(tenant_id)
        .bind(name)
        .bind(role.as_str())
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn find_client(pool: &SqlitePool, id: i64) -> Result<Option<Client>> {
    let row = sqlx::query("SELECT id, tenant_id, name FROM clients WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(client_from_row).transpose()
}

pub async fn insert_client(pool: &SqlitePool, tenant_id: i64, name: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO clients (tenant_id, name) VALUES (?, ?)")
        .bind(tenant_id)
        .bind(name)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}
