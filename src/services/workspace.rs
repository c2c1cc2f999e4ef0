use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::api::error::AppError;
use crate::config::ReferenceSpec;
use crate::utils::validation::UploadedDocument;

/// An isolated, request-scoped working directory.
///
/// Every request gets its own directory keyed by a fresh uuid, so no two
/// in-flight requests can ever observe or mutate each other's files. The
/// directory is removed by [`Workspace::release`] on every pipeline exit
/// path; `Drop` keeps a best-effort backstop for cancelled requests.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    released: bool,
}

impl Workspace {
    /// Create a uniquely-named workspace under `work_root`.
    pub async fn allocate(work_root: &Path) -> Result<Self, AppError> {
        let path = work_root.join(format!("kmz-{}", Uuid::new_v4().simple()));
        fs::create_dir_all(&path).await?;
        tracing::debug!("Allocated workspace {}", path.display());
        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the uploaded bytes under the canonical name the transform
    /// expects for the document's extension.
    pub async fn stage_input(&self, doc: &UploadedDocument) -> Result<(), AppError> {
        let dest = self.path.join(doc.extension.staged_name());
        fs::write(&dest, &doc.bytes).await?;
        tracing::debug!(
            "Staged {} byte upload as {}",
            doc.size(),
            dest.display()
        );
        Ok(())
    }

    /// Resolve each reference dataset by trying its candidate names in order
    /// inside `assets_dir` and copy the first match into the workspace.
    ///
    /// A required dataset with no match fails with a message that lists every
    /// candidate tried and the actual directory contents, so a misconfigured
    /// deployment can be diagnosed from the response alone.
    pub async fn stage_references(
        &self,
        assets_dir: &Path,
        specs: &[ReferenceSpec],
    ) -> Result<(), AppError> {
        for spec in specs {
            match find_candidate(assets_dir, &spec.candidates).await {
                Some(src) => {
                    fs::copy(&src, self.path.join(&spec.staged_name)).await?;
                    tracing::debug!(
                        "Staged reference {} as {}",
                        src.display(),
                        spec.staged_name
                    );
                }
                None if spec.required => {
                    return Err(AppError::ResourceMissing(format!(
                        "Reference dataset not found (tried {:?}). Files in {}: {}",
                        spec.candidates,
                        assets_dir.display(),
                        list_dir(assets_dir).await
                    )));
                }
                None => {
                    tracing::debug!(
                        "Optional reference {:?} not present, skipping",
                        spec.candidates
                    );
                }
            }
        }
        Ok(())
    }

    /// Copy the transform program into the workspace.
    pub async fn stage_transform(
        &self,
        assets_dir: &Path,
        script_name: &str,
    ) -> Result<(), AppError> {
        let src = assets_dir.join(script_name);
        if !fs::try_exists(&src).await.unwrap_or(false) {
            return Err(AppError::ResourceMissing(format!(
                "Transform program {} not found in {}. Files: {}",
                script_name,
                assets_dir.display(),
                list_dir(assets_dir).await
            )));
        }
        fs::copy(&src, self.path.join(script_name)).await?;
        Ok(())
    }

    /// Remove the workspace and everything in it. Idempotent.
    pub async fn release(mut self) {
        self.released = true;
        if let Err(e) = fs::remove_dir_all(&self.path).await {
            tracing::warn!("Failed to remove workspace {}: {}", self.path.display(), e);
        } else {
            tracing::debug!("Released workspace {}", self.path.display());
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        // Backstop for cancelled requests; the normal path goes through
        // `release`, which cleans up asynchronously.
        if !self.released {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}

async fn find_candidate(dir: &Path, candidates: &[String]) -> Option<PathBuf> {
    for name in candidates {
        let p = dir.join(name);
        if fs::try_exists(&p).await.unwrap_or(false) {
            return Some(p);
        }
    }
    None
}

/// Sorted, comma-separated listing of a directory for diagnostic messages.
async fn list_dir(dir: &Path) -> String {
    let mut names = Vec::new();
    if let Ok(mut entries) = fs::read_dir(dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    if names.is_empty() {
        "<empty or unreadable>".to_string()
    } else {
        names.join(", ")
    }
}
