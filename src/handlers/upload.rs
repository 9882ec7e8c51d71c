//! `POST /upload/<token>`: new-object upload with name de-duplication.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;

use crate::error::{ApiError, ErrorCode};
use crate::lifecycle;
use crate::unique_name::gen_unique_filename;
use crate::AppState;

pub async fn upload(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    let mut active = lifecycle::setup(&state.config, state.backend.as_ref(), &token, &headers, &query).await?;
    super::drive_body(body, &mut active.fsm).await?;

    let repo_id = active.fsm.repo_id.clone();
    let parent_dir = active
        .fsm
        .form_kvs
        .get("parent_dir")
        .cloned()
        .ok_or_else(|| ApiError::BadRequest("missing parent_dir field".to_owned()))?;

    let Some(sink) = super::take_completed_sink(&mut active.fsm) else {
        return Err(handler_error(&state, &repo_id, &parent_dir, "", ErrorCode::Recv));
    };

    let size = sink.size().map_err(|e| ApiError::ServerError(e.to_string()))?;
    if size > state.config.max_upload_file_size {
        return Err(handler_error(&state, &repo_id, &parent_dir, "", ErrorCode::Size));
    }

    if state.backend.check_quota(&repo_id).await.is_err() {
        return Err(handler_error(&state, &repo_id, &parent_dir, "", ErrorCode::Quota));
    }

    let submitted_name = active.fsm.file_name.clone().unwrap_or_default();
    let existing = state.backend.list_dir(&repo_id, &parent_dir).await.unwrap_or_default();
    let unique_name = gen_unique_filename(&submitted_name, &existing, state.config.max_filename_attempts);

    let user = active.fsm.user.clone();
    match state.backend.post_file(&repo_id, sink.path(), &parent_dir, &unique_name, &user).await {
        Ok(()) => Ok(super::redirect_302(format!(
            "{}/repo/{repo_id}?p={}",
            state.config.service_url,
            urlencoding::encode(&parent_dir)
        ))),
        Err(e) => {
            let code = match e.to_string().as_str() {
                "Invalid filename" => ErrorCode::Filename,
                "file already exists" => ErrorCode::Exists,
                _ => ErrorCode::Internal,
            };
            Err(handler_error(&state, &repo_id, &parent_dir, &unique_name, code))
        }
    }
}

fn handler_error(state: &AppState, repo_id: &str, parent_dir: &str, filename: &str, code: ErrorCode) -> ApiError {
    ApiError::HandlerError {
        code,
        redirect_to: format!(
            "{}/repo/upload_error/{repo_id}?p={}&fn={}&err={}",
            state.config.service_url,
            urlencoding::encode(parent_dir),
            urlencoding::encode(filename),
            code.as_u8()
        ),
    }
}
