use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use notes_db::Database;
use notes_types::api::{CreateNoteRequest, DeleteNoteResponse, NoteResponse};
use notes_types::models::Note;

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::Claims;

pub async fn list_notes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = claims.sub;
    let notes: Vec<NoteResponse> = blocking(&state, move |db| db.get_notes_for_user(owner))
        .await?
        .into_iter()
        .map(NoteResponse::from)
        .collect();

    Ok(Json(notes))
}

pub async fn create_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateNoteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let title = req.title.as_deref().map(str::trim).unwrap_or_default();
    let content = req.content.unwrap_or_default();
    if title.is_empty() || content.trim().is_empty() {
        return Err(ApiError::Validation("Please provide both title and content".into()));
    }

    let now = Utc::now();
    let note = Note {
        id: Uuid::new_v4(),
        user_id: claims.sub,
        title: title.to_string(),
        content,
        created_at: now,
        updated_at: now,
    };

    // Run blocking DB insert off the async runtime
    let row = note.clone();
    blocking(&state, move |db| db.create_note(&row)).await?;
    info!("User {} created note {}", claims.sub, note.id);

    Ok((StatusCode::CREATED, Json(NoteResponse::from(note))))
}

pub async fn get_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let note = owned_note(&state, &id, &claims).await?;
    Ok(Json(NoteResponse::from(note)))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let note = owned_note(&state, &id, &claims).await?;
    let note_id = note.id;
    blocking(&state, move |db| db.delete_note(note_id)).await?;
    info!("User {} deleted note {}", claims.sub, note_id);

    Ok(Json(DeleteNoteResponse { id: note_id }))
}

/// Load a note for the requester: 404 if it does not exist (or the id is not
/// a valid id), 401 if it belongs to someone else.
async fn owned_note(state: &AppState, id: &str, claims: &Claims) -> Result<Note, ApiError> {
    let not_found = || ApiError::NotFound("Note not found".into());

    let id: Uuid = id.parse().map_err(|_| not_found())?;
    let note = blocking(state, move |db| db.get_note_by_id(id)).await?.ok_or_else(not_found)?;

    if note.user_id != claims.sub {
        warn!("User {} tried to access note {} owned by {}", claims.sub, note.id, note.user_id);
        return Err(ApiError::Unauthorized("Not authorized".into()));
    }

    Ok(note)
}

async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(state.db.as_ref()))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::from)
}
