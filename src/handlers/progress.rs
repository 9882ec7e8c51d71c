//! `GET /upload_progress`: JSONP progress polling endpoint.

use std::collections::HashMap;

use axum::extract::Query;

use crate::error::ApiError;
use crate::progress::{ProgressId, ProgressRegistry};

/// Looks up the progress entry for `X-Progress-ID` and renders it as a
/// JSONP call to `callback`.
///
/// # Errors
/// Returns [`ApiError::BadRequest`] if either query parameter is
/// missing, or [`ApiError::ProgressNotFound`] if no entry exists for the
/// given id.
pub async fn progress(Query(query): Query<HashMap<String, String>>) -> Result<String, ApiError> {
    let id = query
        .get("X-Progress-ID")
        .cloned()
        .map(ProgressId)
        .ok_or_else(|| ApiError::BadRequest("missing X-Progress-ID query parameter".to_owned()))?;
    let callback = query.get("callback").cloned().ok_or_else(|| ApiError::BadRequest("missing callback query parameter".to_owned()))?;

    let (uploaded, length) = ProgressRegistry::global().lookup(&id).ok_or(ApiError::ProgressNotFound(id))?;

    Ok(format!("{callback}({{\"uploaded\": {uploaded}, \"length\": {length}}});"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::FromRequestParts;
    use axum::http::Request;

    async fn query_from(uri: &str) -> HashMap<String, String> {
        let req = Request::builder().uri(uri).body(()).unwrap();
        let (mut parts, ()) = req.into_parts();
        Query::from_request_parts(&mut parts, &()).await.unwrap().0
    }

    #[tokio::test]
    async fn renders_jsonp_for_known_progress_id() {
        let id = ProgressId("p-progress-handler-test".to_owned());
        ProgressRegistry::global().insert(id.clone(), 100, 10_000).unwrap();
        ProgressRegistry::global().lookup(&id).unwrap();

        let query = query_from("/upload_progress?X-Progress-ID=p-progress-handler-test&callback=cb").await;
        let body = progress(Query(query)).await.unwrap();
        assert_eq!(body, r#"cb({"uploaded": 0, "length": 100});"#);

        ProgressRegistry::global().remove(&id);
    }

    #[tokio::test]
    async fn missing_progress_id_is_bad_request() {
        let query = query_from("/upload_progress?callback=cb").await;
        let err = progress(Query(query)).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn unknown_progress_id_is_not_found() {
        let query = query_from("/upload_progress?X-Progress-ID=nonexistent-id-xyz&callback=cb").await;
        let err = progress(Query(query)).await.unwrap_err();
        assert!(matches!(err, ApiError::ProgressNotFound(_)));
    }
}
