//! The transport seam: synchronous GET-into-memory.
//!
//! The resolver only ever needs one capability from the network: issue a GET,
//! download the response fully into memory, and report failure otherwise.
//! Everything else (TLS, proxies, timeouts) belongs to the implementation
//! behind the trait.

use thiserror::Error;

/// Errors produced by a [`Transport`] implementation.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request could not be performed at all.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("unexpected status {status} from {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// The URL that was requested.
        url: String,
    },
}

/// Synchronous fetch of a resource into memory.
///
/// Implementations block the caller until the body is fully downloaded or
/// the request has failed; there is no cancellation. Retrying is the
/// caller's business.
pub trait Transport {
    /// Perform a GET for `url` and return the full response body.
    ///
    /// With `no_cache` set, intermediate caches are asked (via
    /// `Cache-Control: no-cache`) to revalidate rather than serve a stored
    /// copy.
    fn fetch(&self, url: &str, no_cache: bool) -> Result<Vec<u8>, TransportError>;
}

/// [`Transport`] implementation over a blocking HTTP client.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build a transport with the library user agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be constructed
    /// (e.g. TLS backend initialization failure).
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(crate::USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str, no_cache: bool) -> Result<Vec<u8>, TransportError> {
        let mut request = self.client.get(url);
        if no_cache {
            request = request.header(reqwest::header::CACHE_CONTROL, "no-cache");
        }
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes()?.to_vec())
    }
}
