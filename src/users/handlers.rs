use std::collections::HashMap;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use bytes::Bytes;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::ApiError,
    state::AppState,
    users::{
        dto::{
            ImageUpdateResponse, LoginRequest, LoginResponse, MessageResponse, RegisterForm,
            UploadResponse,
        },
        password::{hash_password, verify_password},
        repo::{self, User, UserDoc},
    },
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(register).get(list_users))
        .route("/upload", post(upload_image))
        .route("/login", post(login))
        .route("/login/", post(login))
        .route("/:id", get(get_user).delete(delete_user))
        .route("/:id/upload", put(update_user_image))
        // Above the store's own 5 MiB check, so that check is the one
        // clients see.
        .layer(DefaultBodyLimit::max(8 * 1024 * 1024))
}

struct UploadedFile {
    bytes: Bytes,
    filename: String,
    content_type: String,
}

/// Drains a multipart body into text fields and an optional `image` file.
async fn read_multipart(
    mut mp: Multipart,
) -> Result<(RegisterForm, Option<UploadedFile>), ApiError> {
    let mut form = RegisterForm::default();
    let mut file = None;

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == "image" {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {e}")))?;
            file = Some(UploadedFile {
                bytes,
                filename,
                content_type,
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {e}")))?;
            form.set(&name, value);
        }
    }

    Ok((form, file))
}

/// Ids are opaque handles; anything that does not parse names no user.
fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound("User not found".into()))
}

fn parse_limit(query: &HashMap<String, String>) -> Result<Option<i64>, ApiError> {
    if query.keys().any(|k| k != "limit") {
        return Err(ApiError::Validation("Invalid query parameter".into()));
    }
    match query.get("limit").map(String::as_str) {
        None | Some("") => Ok(None),
        Some(raw) => {
            let n = raw
                .parse::<i64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ApiError::NotFound("Limit should be a number > 0".into()))?;
            Ok(Some(n))
        }
    }
}

/// POST /api/users/upload — standalone image upload.
#[instrument(skip(state, mp))]
async fn upload_image(
    State(state): State<AppState>,
    mp: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let (_, file) = read_multipart(mp).await?;
    let Some(file) = file else {
        return Err(ApiError::Validation("No file uploaded".into()));
    };

    let stored = state
        .images
        .store(file.bytes, &file.filename, &file.content_type)
        .await?;
    info!(url = %stored.url, "image uploaded");

    Ok(Json(UploadResponse {
        message: "File uploaded successfully".into(),
        image_url: stored.url,
    }))
}

/// POST /api/users/ — registration with an optional profile image.
#[instrument(skip(state, mp))]
async fn register(State(state): State<AppState>, mp: Multipart) -> Result<Json<User>, ApiError> {
    let (form, file) = read_multipart(mp).await?;
    let new_user = form.validate()?;

    let password = hash_password(&new_user.password)
        .map_err(|e| ApiError::unexpected("Error creating user", e))?;

    let image_url = match file {
        Some(f) => Some(
            state
                .images
                .store(f.bytes, &f.filename, &f.content_type)
                .await?
                .url,
        ),
        None => None,
    };

    let doc = UserDoc {
        username: new_user.username,
        password,
        age: new_user.age,
        jobrole: new_user.jobrole,
        location: new_user.location,
        education: new_user.education,
        image_url,
    };

    // Store failures, duplicate username included, surface as 400 here.
    let user = repo::insert(&state.db, &doc)
        .await
        .map_err(|e| ApiError::Validation(format!("Error creating user: {e}")))?;

    info!(user_id = %user.id, username = %user.doc.username, "user registered");
    Ok(Json(user))
}

/// POST /api/users/login/ — returns the stored record, no session or token.
/// Both unknown user and wrong password are 404s, as the API has always
/// reported them.
#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = repo::find_by_username(&state.db, &payload.username)
        .await
        .map_err(|e| ApiError::unexpected("Login error", e))?
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", payload.username)))?;

    let ok = verify_password(&payload.password, &user.doc.password)
        .map_err(|e| ApiError::unexpected("Login error", e))?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::NotFound("Invalid password".into()));
    }

    info!(user_id = %user.id, username = %user.doc.username, "user logged in");
    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        user,
    }))
}

/// GET /api/users/?limit=N — `limit` is the only query parameter allowed.
#[instrument(skip(state))]
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Vec<User>>, ApiError> {
    let limit = parse_limit(&query)?;

    if let Some(n) = limit {
        let total = repo::count(&state.db)
            .await
            .map_err(|e| ApiError::unexpected("Error fetching users", e))?;
        if n > total {
            return Err(ApiError::NotFound(format!("Only {total} users found")));
        }
    }

    let users = repo::find_all(&state.db, limit)
        .await
        .map_err(|e| ApiError::unexpected("Error fetching users", e))?;
    Ok(Json(users))
}

/// GET /api/users/:id
#[instrument(skip(state))]
async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id = parse_user_id(&id)?;
    let user = repo::find_by_id(&state.db, id)
        .await
        .map_err(|e| ApiError::unexpected("Error fetching user", e))?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(user))
}

/// PUT /api/users/:id/upload — replaces only the imageUrl field. The file
/// is written before the user lookup; a 404 can leave an orphaned file,
/// matching how the upload middleware has always ordered these steps.
#[instrument(skip(state, mp))]
async fn update_user_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mp: Multipart,
) -> Result<Json<ImageUpdateResponse>, ApiError> {
    let id = parse_user_id(&id)?;
    let (_, file) = read_multipart(mp).await?;
    let Some(file) = file else {
        return Err(ApiError::Validation("No file uploaded".into()));
    };

    let stored = state
        .images
        .store(file.bytes, &file.filename, &file.content_type)
        .await?;

    let user = repo::update_image(&state.db, id, &stored.url)
        .await
        .map_err(|e| ApiError::unexpected("Error uploading profile image", e))?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(user_id = %user.id, url = %stored.url, "profile image updated");
    Ok(Json(ImageUpdateResponse {
        message: "Profile image uploaded successfully".into(),
        image_url: stored.url,
        user,
    }))
}

/// DELETE /api/users/:id
#[instrument(skip(state))]
async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_user_id(&id)?;
    let deleted = repo::delete_by_id(&state.db, id)
        .await
        .map_err(|e| ApiError::unexpected("Error deleting user", e))?;

    match deleted {
        Some(user) => {
            info!(user_id = %user.id, "user deleted");
            Ok(Json(MessageResponse {
                message: "User deleted".into(),
            }))
        }
        None => Err(ApiError::NotFound("User not found".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn no_query_means_no_limit() {
        assert_eq!(parse_limit(&query(&[])).unwrap(), None);
    }

    #[test]
    fn empty_limit_means_no_limit() {
        assert_eq!(parse_limit(&query(&[("limit", "")])).unwrap(), None);
    }

    #[test]
    fn positive_limit_parses() {
        assert_eq!(parse_limit(&query(&[("limit", "3")])).unwrap(), Some(3));
    }

    #[test]
    fn zero_and_negative_limits_are_not_found() {
        for bad in ["0", "-5"] {
            let err = parse_limit(&query(&[("limit", bad)])).unwrap_err();
            assert_eq!(err.to_string(), "Limit should be a number > 0");
            assert!(matches!(err, ApiError::NotFound(_)));
        }
    }

    #[test]
    fn non_numeric_limit_is_not_found() {
        let err = parse_limit(&query(&[("limit", "ten")])).unwrap_err();
        assert_eq!(err.to_string(), "Limit should be a number > 0");
    }

    #[test]
    fn unknown_query_parameter_is_rejected() {
        let err = parse_limit(&query(&[("limit", "3"), ("offset", "1")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid query parameter");
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn bad_path_id_names_no_user() {
        let err = parse_user_id("not-a-uuid").unwrap_err();
        assert_eq!(err.to_string(), "User not found");
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn well_formed_path_id_parses() {
        let id = Uuid::new_v4();
        assert_eq!(parse_user_id(&id.to_string()).unwrap(), id);
    }
}
