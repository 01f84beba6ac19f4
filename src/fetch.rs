use std::time::Duration;

use tracing::debug;

use crate::error::FetchError;

const TIMEOUT_SECS: u64 = 30;

/// Bytes plus the declared `Content-Type`, if the server sent one.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Blocking byte-fetch-by-URL. Tests swap in a stub; the binary uses [`HttpFetcher`].
pub trait Fetcher {
    fn get(&self, url: &str) -> Result<Fetched, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn get(&self, url: &str) -> Result<Fetched, FetchError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = response.bytes()?.to_vec();

        Ok(Fetched {
            bytes,
            content_type,
        })
    }
}
