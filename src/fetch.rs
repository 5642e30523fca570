use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, warn};

use crate::config::{CONTACT_ENV, RetryPolicy};
use crate::error::InsiderError;

/// Downloads are copied through a buffer of this size so a multi-megabyte
/// archive never sits in memory at once.
pub const CHUNK_SIZE: usize = 4 * 1024 * 1024;

pub trait FetchClient {
    fn fetch(&self, url: &str) -> Result<Box<dyn Read + Send>, InsiderError>;

    /// Streams `url` into `destination`, returning the number of bytes written.
    fn download(&self, url: &str, destination: &Path) -> Result<u64, InsiderError>;

    fn fetch_text(&self, url: &str) -> Result<String, InsiderError> {
        let mut body = self.fetch(url)?;
        let mut text = String::new();
        body.read_to_string(&mut text).map_err(|err| InsiderError::Http {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        Ok(text)
    }
}

/// Value sent as `User-Agent`. SEC asks automated clients to identify
/// themselves with a contact address and may refuse requests that don't.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Contact(String),
    Anonymous,
}

impl Identity {
    pub fn from_contact(contact: Option<&str>) -> Self {
        match contact.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => Identity::Contact(value.to_string()),
            None => {
                warn!(
                    "{CONTACT_ENV} is not set; requests go out without a contact User-Agent \
                     and may be rejected by sec.gov"
                );
                Identity::Anonymous
            }
        }
    }

    pub fn user_agent(&self) -> String {
        match self {
            Identity::Contact(contact) => contact.clone(),
            Identity::Anonymous => format!("edgar-insiders/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Outcome of a single attempt as seen by the retry loop.
#[derive(Debug)]
pub enum RequestFailure {
    Transient(String),
    NotFound,
    Fatal(InsiderError),
}

/// Runs `op` until it succeeds, fails permanently, or `policy.max_attempts`
/// attempts have been made. Sleeps `policy.delay_after(n)` between attempts.
pub fn with_retries<T, F>(url: &str, policy: RetryPolicy, mut op: F) -> Result<T, InsiderError>
where
    F: FnMut() -> Result<T, RequestFailure>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(RequestFailure::NotFound) => {
                return Err(InsiderError::NotFound(url.to_string()));
            }
            Err(RequestFailure::Fatal(err)) => return Err(err),
            Err(RequestFailure::Transient(message)) => {
                if attempt >= max_attempts {
                    return Err(InsiderError::RetriesExhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        last: message,
                    });
                }
                let delay = policy.delay_after(attempt);
                warn!(
                    "request to {url} failed ({message}); pausing {}s before attempt {}",
                    delay.as_secs(),
                    attempt + 1
                );
                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

#[derive(Clone)]
pub struct EdgarHttpClient {
    client: Client,
    policy: RetryPolicy,
}

impl EdgarHttpClient {
    pub fn new(identity: &Identity, policy: RetryPolicy) -> Result<Self, InsiderError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&identity.user_agent()).map_err(|err| InsiderError::Http {
                url: String::new(),
                message: format!("invalid contact header: {err}"),
            })?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|err| InsiderError::Http {
                url: String::new(),
                message: err.to_string(),
            })?;
        Ok(Self { client, policy })
    }

    fn send_once(&self, url: &str) -> Result<Response, RequestFailure> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| classify_error(url, &err))?;
        classify_status(url, response)
    }

    fn send(&self, url: &str) -> Result<Response, InsiderError> {
        with_retries(url, self.policy, || self.send_once(url))
    }
}

impl FetchClient for EdgarHttpClient {
    fn fetch(&self, url: &str) -> Result<Box<dyn Read + Send>, InsiderError> {
        Ok(Box::new(self.send(url)?))
    }

    /// Request and body stream form one attempt, so a connection dropped
    /// mid-body is retried from the start like a failed request.
    fn download(&self, url: &str, destination: &Path) -> Result<u64, InsiderError> {
        with_retries(url, self.policy, || {
            let mut response = self.send_once(url)?;
            download_attempt(&mut response, destination)
        })
    }
}

/// One streamed copy of `source` into `destination`, classified for
/// [`with_retries`]: a read failure is transient, a local write failure is
/// fatal. A failed attempt leaves `destination` untouched.
pub fn download_attempt<R: Read + ?Sized>(
    source: &mut R,
    destination: &Path,
) -> Result<u64, RequestFailure> {
    write_stream_atomic(source, destination).map_err(|err| match err {
        StreamError::Read(message) => {
            RequestFailure::Transient(format!("body interrupted: {message}"))
        }
        StreamError::Write(message) => RequestFailure::Fatal(InsiderError::Filesystem(message)),
    })
}

#[derive(Debug)]
pub enum StreamError {
    Read(String),
    Write(String),
}

/// Copies `source` in `CHUNK_SIZE` pieces into a temporary file beside
/// `destination`, syncs it, then renames it into place.
pub fn write_stream_atomic<R: Read + ?Sized>(
    source: &mut R,
    destination: &Path,
) -> Result<u64, StreamError> {
    let write_err = |err: std::io::Error| StreamError::Write(format!("{}: {err}", destination.display()));
    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(write_err)?;
    let mut temp = tempfile::Builder::new()
        .prefix(".edgar-insiders-download")
        .tempfile_in(parent)
        .map_err(write_err)?;

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let read = source
            .read(&mut buffer)
            .map_err(|err| StreamError::Read(err.to_string()))?;
        if read == 0 {
            break;
        }
        temp.write_all(&buffer[..read]).map_err(write_err)?;
        total += read as u64;
    }
    temp.flush().map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;
    temp.persist(destination)
        .map_err(|err| write_err(err.error))?;
    debug!("wrote {total} bytes to {}", destination.display());
    Ok(total)
}

fn classify_status(url: &str, response: Response) -> Result<Response, RequestFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let code = status.as_u16();
    if is_not_found_status(code) {
        return Err(RequestFailure::NotFound);
    }
    if is_retryable_status(code) {
        return Err(RequestFailure::Transient(format!("status {code}")));
    }
    Err(RequestFailure::Fatal(InsiderError::HttpStatus {
        url: url.to_string(),
        status: code,
    }))
}

fn classify_error(url: &str, err: &reqwest::Error) -> RequestFailure {
    if is_retryable_error(err) {
        RequestFailure::Transient(err.to_string())
    } else {
        RequestFailure::Fatal(InsiderError::Http {
            url: url.to_string(),
            message: err.to_string(),
        })
    }
}

pub fn is_not_found_status(status: u16) -> bool {
    matches!(status, 404 | 410)
}

pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes() {
        assert!(is_not_found_status(404));
        assert!(is_not_found_status(410));
        assert!(!is_retryable_status(404));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(403));
    }

    #[test]
    fn anonymous_identity_still_has_agent() {
        let identity = Identity::from_contact(Some("   "));
        assert_eq!(identity, Identity::Anonymous);
        assert!(identity.user_agent().starts_with("edgar-insiders/"));
    }
}
