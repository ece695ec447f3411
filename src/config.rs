// Configuration module: command line options of the hook plus the
// environment fallbacks used on a BigBlueButton node. Everything the
// hook needs to know is resolved here before any I/O happens.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the API access token.
pub const ENV_ACCESS_TOKEN: &str = "B3SCALE_API_ACCESS_TOKEN";

/// Env files tried (in order) when the token is not in the environment.
pub const ENV_FILES: &[&str] = &[".env", "/etc/default/b3scale", "/etc/sysconfig/b3scale"];

const METADATA_FILE_NAME: &str = "metadata.xml";

/// Options passed by the recording pipeline, with the remaining settings
/// taken from the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "post-publish-b3scale-import")]
#[command(about = "Import a published recording's metadata.xml into b3scale")]
pub struct Args {
    /// Recording id to import.
    #[arg(long, value_parser = parse_meeting_id)]
    pub meeting_id: String,

    /// Playback format name. Accepted for compatibility, not sent.
    #[arg(long)]
    pub format: Option<String>,

    /// Base URL of the b3scale instance.
    #[arg(long, env = "B3SCALE_API_URL", default_value = "https://bbb.example.com")]
    pub api_url: String,

    /// Bearer token for the b3scale API.
    #[arg(long, env = ENV_ACCESS_TOKEN, hide_env_values = true)]
    pub access_token: String,

    /// Directory holding the published presentation recordings.
    #[arg(
        long,
        env = "B3SCALE_PUBLISHED_PRESENTATION_PATH",
        default_value = "/var/bigbluebutton/published/presentation"
    )]
    pub published_root: PathBuf,

    /// Log file, rotated weekly.
    #[arg(
        long,
        env = "B3SCALE_IMPORT_LOG_FILE",
        default_value = "/var/log/bigbluebutton/post_publish.log"
    )]
    pub log_file: PathBuf,

    /// Log filter directive, e.g. `info` or `b3scale_import_hook=debug`.
    #[arg(long, env = "B3SCALE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Request timeout in seconds.
    #[arg(long, env = "B3SCALE_HTTP_REQUEST_TIMEOUT", default_value_t = 60)]
    pub timeout: u64,
}

impl Args {
    /// Location of the metadata document for this recording.
    pub fn metadata_path(&self) -> PathBuf {
        metadata_path(&self.published_root, &self.meeting_id)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Build `<root>/<meeting_id>/metadata.xml`.
pub fn metadata_path(root: &Path, meeting_id: &str) -> PathBuf {
    root.join(meeting_id).join(METADATA_FILE_NAME)
}

/// The id becomes a path component, so it must name exactly one
/// directory below the published root.
fn parse_meeting_id(raw: &str) -> Result<String, String> {
    if raw.is_empty() {
        return Err("meeting id must not be empty".into());
    }
    if raw == "." || raw == ".." {
        return Err(format!("invalid meeting id: {raw}"));
    }
    if raw.contains('/') || raw.contains('\\') {
        return Err(format!("meeting id must not contain path separators: {raw}"));
    }
    Ok(raw.to_string())
}

/// Load the env files unless the token is already configured. Returns
/// the files that were actually read.
pub fn load_env_files() -> Vec<PathBuf> {
    if std::env::var_os(ENV_ACCESS_TOKEN).is_some_and(|v| !v.is_empty()) {
        return Vec::new();
    }
    load_env_files_from(ENV_FILES.iter().map(PathBuf::from))
}

/// Read each existing file into the process environment. Variables that
/// are already set win over the files. Unreadable files and malformed
/// lines are skipped with a warning on stderr; the options given on the
/// command line may still be enough for the run.
pub fn load_env_files_from<I>(files: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut loaded = Vec::new();
    for path in files {
        if !path.is_file() {
            continue;
        }
        let entries = match dotenvy::from_path_iter(&path) {
            Ok(entries) => entries,
            Err(err) => {
                eprintln!("ignoring environment file {}: {err}", path.display());
                continue;
            }
        };
        for entry in entries {
            match entry {
                Ok((key, value)) => {
                    if std::env::var_os(&key).is_none() {
                        std::env::set_var(key, value);
                    }
                }
                Err(err @ dotenvy::Error::LineParse(..)) => {
                    eprintln!("skipping line in {}: {err}", path.display());
                }
                Err(err) => {
                    eprintln!("stopped reading {}: {err}", path.display());
                    break;
                }
            }
        }
        loaded.push(path);
    }
    loaded
}
