use bytes::Bytes;

use crate::api::error::AppError;

/// Extensions accepted for the uploaded document
pub const ALLOWED_EXTENSIONS: &[&str] = &["kmz", "kml"];

/// Normalized extension of an accepted upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocExtension {
    Kmz,
    Kml,
}

impl DocExtension {
    /// Canonical filename the transform expects for the staged input
    pub fn staged_name(self) -> &'static str {
        match self {
            DocExtension::Kmz => "TEST.kmz",
            DocExtension::Kml => "TEST.kml",
        }
    }
}

/// A validated upload, ready for staging
#[derive(Debug)]
pub struct UploadedDocument {
    pub bytes: Bytes,
    pub extension: DocExtension,
}

impl UploadedDocument {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Checks the declared filename's extension (case-insensitive) and wraps the
/// payload. The original filename is not kept; staging uses a canonical name.
pub fn validate_upload(filename: &str, bytes: Bytes) -> Result<UploadedDocument, AppError> {
    let extension = match extension_of(filename) {
        Some(ext) => ext,
        None => {
            return Err(AppError::Validation(
                "Upload a valid .kmz or .kml file.".to_string(),
            ));
        }
    };

    Ok(UploadedDocument { bytes, extension })
}

fn extension_of(filename: &str) -> Option<DocExtension> {
    let lower = filename.to_lowercase();
    if lower.ends_with(".kmz") {
        Some(DocExtension::Kmz)
    } else if lower.ends_with(".kml") {
        Some(DocExtension::Kml)
    } else {
        None
    }
}

/// Error for a request that carried no recognized upload field, listing the
/// accepted field names for the caller.
pub fn missing_field_error(accepted: &[String]) -> AppError {
    AppError::Validation(format!(
        "Expected a file in one of the fields: {}.",
        accepted.join(", ")
    ))
}
