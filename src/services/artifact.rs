use std::path::PathBuf;

use tokio::fs;
use uuid::Uuid;

use crate::api::error::AppError;
use crate::services::workspace::Workspace;

pub const ARTIFACT_MEDIA_TYPE: &str = "application/vnd.google-earth.kmz";

/// Descriptor of the transform's output, ready for streaming to the caller
#[derive(Debug)]
pub struct ArtifactDescriptor {
    pub path: PathBuf,
    pub media_type: &'static str,
    pub download_name: String,
}

/// Locate the fixed-name output artifact in the workspace.
///
/// A zero exit status with no artifact on disk is still a pipeline failure.
/// The download name gets a short random suffix so concurrent downloads and
/// client-side caches never collide.
pub async fn retrieve(
    workspace: &Workspace,
    output_name: &str,
) -> Result<ArtifactDescriptor, AppError> {
    let path = workspace.path().join(output_name);
    if !fs::try_exists(&path).await.unwrap_or(false) {
        return Err(AppError::OutputMissing(output_name.to_string()));
    }

    Ok(ArtifactDescriptor {
        path,
        media_type: ARTIFACT_MEDIA_TYPE,
        download_name: download_name(output_name),
    })
}

/// `Exportado.kmz` -> `Exportado_<6 lowercase hex>.kmz`
fn download_name(output_name: &str) -> String {
    let (stem, ext) = match output_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext),
        None => (output_name, "kmz"),
    };
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}.{}", stem, &suffix[..6], ext)
}
