use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
    time::Duration,
};

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    record::SeriesResponse,
    request::{RequestError, SeriesRequest},
};

pub const DEFAULT_BASE_URL: &str = "https://re.jrc.ec.europa.eu/api/v5_3";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error, Diagnostic)]
pub enum SourceError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Request(#[from] RequestError),
    #[error("PVGIS answered {code}: {message}")]
    #[diagnostic(
        code(solar_profile::source::status),
        help("check the location is over land and covered by the radiation database")
    )]
    Status { code: u16, message: String },
    #[error("Could not reach PVGIS: {0}")]
    #[diagnostic(code(solar_profile::source::transport))]
    Transport(#[source] Box<ureq::Transport>),
    #[error("Could not read the response body")]
    #[diagnostic(code(solar_profile::source::body))]
    Body(#[source] io::Error),
    #[error("Could not read {}", .path.display())]
    #[diagnostic(code(solar_profile::source::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unexpected series format: {0}")]
    #[diagnostic(code(solar_profile::source::decode))]
    Decode(#[from] serde_json::Error),
}

/// Anything able to hand out a `seriescalc` JSON body.
pub trait RecordSource {
    /// The body exactly as received, e.g. to keep a copy on disk.
    fn fetch_raw(&self) -> Result<String, SourceError>;

    fn fetch(&self) -> Result<SeriesResponse, SourceError> {
        Ok(self.fetch_raw()?.parse()?)
    }
}

/// Hourly series straight from the PVGIS web service.
pub struct PvgisSource {
    agent: ureq::Agent,
    base_url: String,
    request: SeriesRequest,
}

impl PvgisSource {
    pub fn new(request: SeriesRequest) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, DEFAULT_TIMEOUT, request)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration, request: SeriesRequest) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            base_url: base_url.trim_end_matches('/').to_string(),
            request,
        }
    }

    pub fn url(&self) -> String {
        format!("{}/seriescalc", self.base_url)
    }
}

impl RecordSource for PvgisSource {
    fn fetch_raw(&self) -> Result<String, SourceError> {
        self.request.validate()?;

        let url = self.url();
        let mut call = self.agent.get(&url);
        for (key, value) in self.request.query_pairs() {
            debug!(key, %value, "query parameter");
            call = call.query(key, &value);
        }

        info!(%url, "requesting hourly series");
        let response = match call.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(SourceError::Status {
                    code,
                    message: service_message(&body),
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(SourceError::Transport(Box::new(transport)))
            }
        };

        // `into_string` caps bodies at 10 MB, multi-year series go past that.
        let mut body = String::new();
        response
            .into_reader()
            .read_to_string(&mut body)
            .map_err(SourceError::Body)?;
        info!(bytes = body.len(), "received hourly series");

        Ok(body)
    }
}

/// A `seriescalc` response previously saved to disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl RecordSource for JsonFileSource {
    fn fetch_raw(&self) -> Result<String, SourceError> {
        info!(path = %self.path.display(), "reading hourly series");
        fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// PVGIS explains rejected requests in a `{"message": ...}` body.
fn service_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Rejection {
        message: String,
    }

    match serde_json::from_str::<Rejection>(body) {
        Ok(rejection) => rejection.message,
        Err(_) if body.trim().is_empty() => String::from("empty response"),
        Err(_) => body.trim().to_string(),
    }
}
