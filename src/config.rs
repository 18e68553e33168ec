use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the Taskline REST backend.
    pub api_url: String,
    /// Where the signed-in session (token + user snapshot) is kept.
    pub session_file: PathBuf,
    pub http_timeout: Duration,
}

impl Config {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            session_file: default_session_file(),
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn from_env() -> ClientResult<Self> {
        dotenv::dotenv().ok();

        let api_url = env::var("TASKLINE_API_URL")
            .map_err(|_| ClientError::Config("TASKLINE_API_URL must be set".to_string()))?;
        let session_file = env::var("TASKLINE_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_session_file());
        let timeout_secs = match env::var("TASKLINE_HTTP_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                ClientError::Config(format!("TASKLINE_HTTP_TIMEOUT_SECS is not a number: {raw}"))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            api_url,
            session_file,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = path.into();
        self
    }
}

fn default_session_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".taskline")
        .join("session.json")
}
