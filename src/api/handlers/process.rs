use axum::{
    body::Body,
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;

use crate::AppState;
use crate::api::error::AppError;
use crate::services::pipeline;
use crate::utils::validation::{missing_field_error, validate_upload};

pub async fn process(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let accepted = &state.config.upload_fields;

    // Collect every recognized field; the winner is decided by the
    // configured priority order, not by arrival order in the body.
    let mut uploads: Vec<(usize, String, Bytes)> = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(priority) = accepted.iter().position(|f| *f == name) {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?;
            uploads.push((priority, filename, bytes));
        }
    }

    let (_, filename, bytes) = uploads
        .into_iter()
        .min_by_key(|(priority, _, _)| *priority)
        .ok_or_else(|| missing_field_error(accepted))?;

    let doc = validate_upload(&filename, bytes)?;
    tracing::info!(
        "Accepted {} byte {:?} upload ({})",
        doc.size(),
        doc.extension,
        filename
    );

    let artifact = pipeline::run(&state.config, doc).await?;

    let headers = [
        (header::CONTENT_TYPE, artifact.media_type.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.download_name),
        ),
    ];

    Ok((headers, Body::from(artifact.bytes)).into_response())
}
