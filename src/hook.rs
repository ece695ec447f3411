// The post-publish hook itself: read the recording's metadata.xml and
// hand it to the import endpoint. One run sends at most one request.

use crate::api::{ApiClient, ImportReceipt};
use crate::config::Args;
use crate::error::HookError;
use std::path::PathBuf;
use tracing::{error, info, Dispatch};

/// What to import, as given by the recording pipeline.
#[derive(Debug, Clone)]
pub struct Import {
    pub meeting_id: String,
    /// Playback format the pipeline just published. Only logged.
    pub format: Option<String>,
    pub metadata_path: PathBuf,
}

impl Import {
    pub fn from_args(args: &Args) -> Self {
        Import {
            meeting_id: args.meeting_id.clone(),
            format: args.format.clone(),
            metadata_path: args.metadata_path(),
        }
    }
}

/// Upload the metadata of `import`, logging through `log`. A metadata
/// file that cannot be read fails the run before anything is sent.
pub fn run(import: &Import, api: &ApiClient, log: &Dispatch) -> Result<ImportReceipt, HookError> {
    tracing::dispatcher::with_default(log, || {
        let result = upload(import, api);
        match &result {
            Ok(receipt) => {
                let record_id = receipt
                    .recording
                    .as_ref()
                    .and_then(|r| r.record_id.as_deref())
                    .unwrap_or("-");
                info!(
                    meeting_id = %import.meeting_id,
                    status = receipt.status,
                    record_id,
                    "recording imported"
                );
            }
            Err(err) => {
                let http_status = match err {
                    HookError::Api(api_err) => api_err.status(),
                    _ => None,
                };
                error!(
                    meeting_id = %import.meeting_id,
                    exit_code = err.exit_code(),
                    http_status = ?http_status,
                    error = %err,
                    "recording import failed"
                );
            }
        }
        result
    })
}

fn upload(import: &Import, api: &ApiClient) -> Result<ImportReceipt, HookError> {
    info!(
        meeting_id = %import.meeting_id,
        format = import.format.as_deref().unwrap_or("-"),
        path = %import.metadata_path.display(),
        url = %api.recordings_import_url(),
        "importing recording metadata"
    );

    let metadata = std::fs::read(&import.metadata_path).map_err(|source| HookError::Metadata {
        path: import.metadata_path.clone(),
        source,
    })?;

    Ok(api.import_recording(metadata)?)
}
