use bytes::Bytes;
use tokio::fs;

use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::services::{artifact, transform};
use crate::services::workspace::Workspace;
use crate::utils::validation::UploadedDocument;

/// A fully-buffered artifact, safe to hand to the response layer after the
/// workspace is gone
#[derive(Debug)]
pub struct ProcessedArtifact {
    pub bytes: Bytes,
    pub media_type: &'static str,
    pub download_name: String,
}

/// Run one upload through stage -> invoke -> retrieve.
///
/// The workspace is released on every exit path. On success the artifact is
/// read fully into memory first, so the response layer never streams from a
/// file that is about to be deleted.
pub async fn run(config: &AppConfig, doc: UploadedDocument) -> Result<ProcessedArtifact, AppError> {
    let workspace = Workspace::allocate(&config.work_root).await?;
    let result = run_in(config, &doc, &workspace).await;
    workspace.release().await;
    result
}

async fn run_in(
    config: &AppConfig,
    doc: &UploadedDocument,
    workspace: &Workspace,
) -> Result<ProcessedArtifact, AppError> {
    workspace.stage_input(doc).await?;
    workspace
        .stage_references(&config.assets_dir, &config.references)
        .await?;
    workspace
        .stage_transform(&config.assets_dir, &config.transform_script)
        .await?;

    transform::invoke(
        workspace,
        &config.transform_interpreter,
        &config.transform_script,
        config.transform_timeout,
    )
    .await?;

    let descriptor = artifact::retrieve(workspace, &config.output_name).await?;
    let bytes = Bytes::from(fs::read(&descriptor.path).await?);

    tracing::info!(
        "Produced {} ({} bytes)",
        descriptor.download_name,
        bytes.len()
    );

    Ok(ProcessedArtifact {
        bytes,
        media_type: descriptor.media_type,
        download_name: descriptor.download_name,
    })
}
