use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// A server-resident reference dataset, resolved by trying `candidates` in
/// order inside the assets directory and staged into the workspace under
/// `staged_name`.
#[derive(Debug, Clone)]
pub struct ReferenceSpec {
    pub candidates: Vec<String>,
    pub staged_name: String,
    pub required: bool,
}

/// Runtime configuration for the processing pipeline
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the reference dataset(s) and the transform program
    pub assets_dir: PathBuf,

    /// Root under which per-request workspaces are allocated
    pub work_root: PathBuf,

    /// Multipart field names accepted for the upload, highest priority first
    pub upload_fields: Vec<String>,

    /// Reference datasets to stage; the first entry is the required primary
    pub references: Vec<ReferenceSpec>,

    /// Filename of the transform program inside `assets_dir`
    pub transform_script: String,

    /// Interpreter used to run the transform program
    pub transform_interpreter: String,

    /// Wall-clock budget for one transform invocation
    pub transform_timeout: Duration,

    /// Filename the transform must produce in the workspace
    pub output_name: String,

    /// Maximum accepted upload size in bytes (default: 64 MB)
    pub max_upload_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("./assets"),
            work_root: env::temp_dir(),
            upload_fields: vec!["test_kmz".to_string(), "file".to_string()],
            references: vec![
                ReferenceSpec {
                    candidates: vec![
                        "DATABASE.kmz".to_string(),
                        "Database.kmz".to_string(),
                        "Transmission Network.kmz".to_string(),
                    ],
                    staged_name: "Transmission Network.kmz".to_string(),
                    required: true,
                },
                ReferenceSpec {
                    candidates: vec![
                        "DISTRIBUTION.kmz".to_string(),
                        "Distribution.kmz".to_string(),
                        "Distribution Network.kmz".to_string(),
                    ],
                    staged_name: "Distribution Network.kmz".to_string(),
                    required: false,
                },
            ],
            transform_script: "informative-letters-v3.py".to_string(),
            transform_interpreter: "python3".to_string(),
            transform_timeout: Duration::from_secs(120),
            output_name: "Exportado.kmz".to_string(),
            max_upload_size: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            assets_dir: env::var("ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.assets_dir.clone()),

            work_root: env::var("WORK_ROOT")
                .map(PathBuf::from)
                .unwrap_or(default.work_root.clone()),

            transform_script: env::var("TRANSFORM_SCRIPT")
                .unwrap_or_else(|_| default.transform_script.clone()),

            transform_interpreter: env::var("TRANSFORM_INTERPRETER")
                .unwrap_or_else(|_| default.transform_interpreter.clone()),

            transform_timeout: env::var("TRANSFORM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.transform_timeout),

            output_name: env::var("OUTPUT_NAME").unwrap_or_else(|_| default.output_name.clone()),

            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            ..default
        }
    }

    pub fn primary_reference(&self) -> &ReferenceSpec {
        &self.references[0]
    }
}
