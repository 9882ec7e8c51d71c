//! `POST /update/<token>`: in-place object replacement.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;

use crate::error::{ApiError, ErrorCode};
use crate::lifecycle;
use crate::AppState;

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    let mut active = lifecycle::setup(&state.config, state.backend.as_ref(), &token, &headers, &query).await?;
    super::drive_body(body, &mut active.fsm).await?;

    let repo_id = active.fsm.repo_id.clone();
    let target_file = active
        .fsm
        .form_kvs
        .get("target_file")
        .cloned()
        .ok_or_else(|| ApiError::BadRequest("missing target_file field".to_owned()))?;
    let (parent_dir, filename) = split_target(&target_file);

    let Some(sink) = super::take_completed_sink(&mut active.fsm) else {
        return Err(handler_error(&state, &repo_id, &target_file, ErrorCode::Recv));
    };

    let size = sink.size().map_err(|e| ApiError::ServerError(e.to_string()))?;
    if size > state.config.max_upload_file_size {
        return Err(handler_error(&state, &repo_id, &target_file, ErrorCode::Size));
    }

    if state.backend.check_quota(&repo_id).await.is_err() {
        return Err(handler_error(&state, &repo_id, &target_file, ErrorCode::Quota));
    }

    let user = active.fsm.user.clone();
    match state.backend.put_file(&repo_id, sink.path(), &parent_dir, &filename, &user).await {
        Ok(()) => Ok(super::redirect_302(format!(
            "{}/repo/{repo_id}?p={}",
            state.config.service_url,
            urlencoding::encode(&parent_dir)
        ))),
        Err(e) => {
            let code = match e.to_string().as_str() {
                "file does not exist" => ErrorCode::NotExist,
                _ => ErrorCode::Internal,
            };
            Err(handler_error(&state, &repo_id, &target_file, code))
        }
    }
}

/// Splits an absolute in-repo path into `(parent_dir, filename)`.
fn split_target(target_file: &str) -> (String, String) {
    match target_file.rfind('/') {
        Some(0) => ("/".to_owned(), target_file[1..].to_owned()),
        Some(idx) => (target_file[..idx].to_owned(), target_file[idx + 1..].to_owned()),
        None => ("/".to_owned(), target_file.to_owned()),
    }
}

fn handler_error(state: &AppState, repo_id: &str, target_file: &str, code: ErrorCode) -> ApiError {
    ApiError::HandlerError {
        code,
        redirect_to: format!(
            "{}/repo/update_error/{repo_id}?p={}&err={}",
            state.config.service_url,
            urlencoding::encode(target_file),
            code.as_u8()
        ),
    }
}
