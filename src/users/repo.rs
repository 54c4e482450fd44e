use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate username")]
    DuplicateUsername,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// The schema-flexible part of a user record, persisted verbatim as one
/// JSONB document. `password` always holds the argon2 PHC string, never
/// the plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDoc {
    pub username: String,
    pub password: String,
    pub age: i64,
    pub jobrole: String,
    pub location: String,
    pub education: String,
    #[serde(
        rename = "imageUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_url: Option<String>,
}

/// A stored user: the store-assigned id plus the document. Serializes flat,
/// so the wire shape is `{id, username, password, ..., imageUrl?}`.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    #[serde(flatten)]
    pub doc: UserDoc,
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    doc: Json<UserDoc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            doc: row.doc.0,
        }
    }
}

pub async fn insert(db: &PgPool, doc: &UserDoc) -> Result<User, StoreError> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users (doc)
        VALUES ($1)
        RETURNING id, doc
        "#,
    )
    .bind(Json(doc))
    .fetch_one(db)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::DuplicateUsername
        }
        _ => StoreError::Db(e),
    })?;
    Ok(row.into())
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, StoreError> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, doc
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row.map(User::from))
}

pub async fn find_by_username(db: &PgPool, username: &str) -> Result<Option<User>, StoreError> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, doc
        FROM users
        WHERE doc->>'username' = $1
        "#,
    )
    .bind(username)
    .fetch_optional(db)
    .await?;
    Ok(row.map(User::from))
}

/// All users in insertion order, optionally capped. Callers validate the
/// limit against the current count before calling.
pub async fn find_all(db: &PgPool, limit: Option<i64>) -> Result<Vec<User>, StoreError> {
    let rows = match limit {
        Some(n) => {
            sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, doc
                FROM users
                ORDER BY seq
                LIMIT $1
                "#,
            )
            .bind(n)
            .fetch_all(db)
            .await?
        }
        None => {
            sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, doc
                FROM users
                ORDER BY seq
                "#,
            )
            .fetch_all(db)
            .await?
        }
    };
    Ok(rows.into_iter().map(User::from).collect())
}

pub async fn count(db: &PgPool) -> Result<i64, StoreError> {
    let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(db)
        .await?;
    Ok(n)
}

/// Partial update of exactly the imageUrl key; every other field is left
/// untouched.
pub async fn update_image(db: &PgPool, id: Uuid, url: &str) -> Result<Option<User>, StoreError> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        UPDATE users
        SET doc = jsonb_set(doc, '{imageUrl}', to_jsonb($2::text))
        WHERE id = $1
        RETURNING id, doc
        "#,
    )
    .bind(id)
    .bind(url)
    .fetch_optional(db)
    .await?;
    Ok(row.map(User::from))
}

pub async fn delete_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, StoreError> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        DELETE FROM users
        WHERE id = $1
        RETURNING id, doc
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row.map(User::from))
}
