//! ## Download Transports
//!
//! A [`Transport`] moves the bytes behind a URL into a local file. Two implementations are provided:
//!
//! - [`DriveTransport`]: the primary transport. It understands the HTML interstitial that file-sharing
//!   hosts serve for large files (a "can't scan for viruses" page with a confirm form) and replays the
//!   request with the confirm token. The body is streamed to disk.
//! - [`HttpTransport`]: a plain GET that follows redirects and writes the body verbatim. The fetcher
//!   uses it as the fallback when the primary transport cannot make sense of the response.

use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

static FORM_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<form[^>]*id="download-form"[^>]*action="([^"]+)""#).unwrap()
});
static HIDDEN_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<input[^>]*type="hidden"[^>]*name="([^"]+)"[^>]*value="([^"]*)""#).unwrap()
});
static CONFIRM_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"confirm=([0-9A-Za-z_-]+)").unwrap());

/// Errors raised while moving bytes from a URL to disk.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server answered HTTP {0}")]
    Status(u16),

    /// The server answered, but not with something the transport knows how to handle.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The destination file could not be written.
    #[error("could not write download: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether the fetcher should retry this download with its fallback transport.
    pub fn triggers_fallback(&self) -> bool {
        matches!(self, TransportError::UnexpectedResponse(_))
    }
}

/// Moves the bytes behind a URL into a local file.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Downloads `url` into `destination`, creating or truncating the file.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), TransportError>;
}

fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(TransportError::Status(status.as_u16()))
    }
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"))
}

async fn stream_to_file(response: Response, destination: &Path) -> Result<u64, TransportError> {
    let mut file = tokio::fs::File::create(destination).await?;
    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// The follow-up request encoded in a large-file confirmation page.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ConfirmRequest {
    /// Target URL; `None` means "repeat the original URL".
    pub action: Option<String>,
    pub params: Vec<(String, String)>,
}

impl ConfirmRequest {
    /// Reads the confirm form (or, on older pages, a `confirm=` link) out of an interstitial page.
    pub(crate) fn parse(page: &str) -> Option<Self> {
        if let Some(action) = FORM_ACTION.captures(page).and_then(|c| c.get(1)) {
            let params: Vec<(String, String)> = HIDDEN_INPUT
                .captures_iter(page)
                .map(|c| (unescape(&c[1]), unescape(&c[2])))
                .collect();
            if !params.is_empty() {
                return Some(Self {
                    action: Some(unescape(action.as_str())),
                    params,
                });
            }
        }
        CONFIRM_TOKEN.captures(page).map(|c| Self {
            action: None,
            params: vec![
                ("export".to_string(), "download".to_string()),
                ("confirm".to_string(), c[1].to_string()),
            ],
        })
    }
}

fn unescape(s: &str) -> String {
    s.replace("&amp;", "&")
}

/// Primary transport; handles the large-file confirmation page.
#[derive(Debug, Clone, Default)]
pub struct DriveTransport {
    client: Client,
}

impl DriveTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for DriveTransport {
    fn name(&self) -> &str {
        "drive"
    }

    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), TransportError> {
        let response = check_status(self.client.get(url).send().await?)?;

        let response = if is_html(&response) {
            let page = response.text().await?;
            let confirm = ConfirmRequest::parse(&page).ok_or_else(|| {
                TransportError::UnexpectedResponse(
                    "received an HTML page without a download confirmation".to_string(),
                )
            })?;
            debug!("Confirming large-file download for {}", url);
            let target = confirm.action.as_deref().unwrap_or(url);
            let confirmed = check_status(
                self.client
                    .get(target)
                    .query(&confirm.params)
                    .send()
                    .await?,
            )?;
            if is_html(&confirmed) {
                return Err(TransportError::UnexpectedResponse(
                    "confirmation was answered with another HTML page".to_string(),
                ));
            }
            confirmed
        } else {
            response
        };

        let written = stream_to_file(response, destination).await?;
        info!("Downloaded {} bytes to {}", written, destination.display());
        Ok(())
    }
}

/// Fallback transport: plain GET with redirects, body written verbatim.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), TransportError> {
        let response = check_status(self.client.get(url).send().await?)?;
        let body = response.bytes().await?;
        tokio::fs::write(destination, &body).await?;
        info!("Wrote {} bytes to {}", body.len(), destination.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_confirm_form() {
        let page = r#"<html><body>
            <form id="download-form" action="https://drive.usercontent.example.com/download" method="get">
              <input type="hidden" name="id" value="ABC123">
              <input type="hidden" name="export" value="download">
              <input type="hidden" name="confirm" value="t">
              <input type="hidden" name="uuid" value="0f-1e">
            </form></body></html>"#;
        let confirm = ConfirmRequest::parse(page).unwrap();
        assert_eq!(
            confirm.action.as_deref(),
            Some("https://drive.usercontent.example.com/download")
        );
        assert_eq!(confirm.params.len(), 4);
        assert!(confirm
            .params
            .contains(&("confirm".to_string(), "t".to_string())));
        assert!(confirm
            .params
            .contains(&("uuid".to_string(), "0f-1e".to_string())));
    }

    #[test]
    fn test_parse_confirm_link() {
        let page = r#"<a id="uc-download-link" href="/uc?export=download&amp;confirm=Xy_9&amp;id=ABC">Download anyway</a>"#;
        let confirm = ConfirmRequest::parse(page).unwrap();
        assert_eq!(confirm.action, None);
        assert_eq!(
            confirm.params,
            vec![
                ("export".to_string(), "download".to_string()),
                ("confirm".to_string(), "Xy_9".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_unrelated_page() {
        assert_eq!(ConfirmRequest::parse("<html><body>Sign in</body></html>"), None);
    }

    #[test]
    fn test_fallback_trigger() {
        assert!(TransportError::UnexpectedResponse("page".into()).triggers_fallback());
        assert!(!TransportError::Status(404).triggers_fallback());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert!(!TransportError::from(io).triggers_fallback());
    }
}
