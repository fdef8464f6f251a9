//! HTTP client for the remote claim service.

pub mod feed;

pub use feed::{FeedEntry, UnavailableFeed};

use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Remote claim service errors.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("invalid remote URL: {0}")]
    InvalidUrl(String),

    /// Non-success response. The body is carried verbatim so callers can
    /// surface the remote's own message.
    #[error("remote returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Call exceeded the configured timeout. Recoverable; the next cycle
    /// retries.
    #[error("remote request timed out")]
    Timeout,

    #[error("remote transport error: {0}")]
    Transport(reqwest::Error),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err)
        }
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// A successful claim on the remote service.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaimResponse {
    pub reservation_id: String,
    #[serde(default, deserialize_with = "deserialize_opt_rfc3339")]
    pub expires_at: Option<OffsetDateTime>,
}

/// One reservation as reported by `GET /api/my-reservations`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteReservation {
    pub id: String,
    pub repo_id: String,
    pub commit_hash: String,
    #[serde(deserialize_with = "deserialize_rfc3339")]
    pub reserved_at: OffsetDateTime,
    #[serde(default, deserialize_with = "deserialize_opt_rfc3339")]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "deserialize_opt_rfc3339")]
    pub released_at: Option<OffsetDateTime>,
}

/// Client for one remote account. Cheap to construct per call site; the
/// underlying `reqwest::Client` is shared and pools connections.
#[derive(Clone)]
pub struct RemoteClaimClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    timeout: Duration,
}

impl RemoteClaimClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        token: &str,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| RemoteError::InvalidUrl(format!("{base_url}: {e}")))?;
        Ok(Self {
            http,
            base_url,
            token: token.to_string(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> RemoteResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| RemoteError::InvalidUrl(format!("{path}: {e}")))
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> RemoteResult<reqwest::Response> {
        let response = req
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status { status, body });
        }
        Ok(response)
    }

    /// Claim a commit on the remote service.
    pub async fn claim(
        &self,
        repo_remote_id: &str,
        commit_hash: &str,
    ) -> RemoteResult<ClaimResponse> {
        let url = self.url("/api/claim")?;
        let body = serde_json::json!({
            "repo_id": repo_remote_id,
            "commit_hash": commit_hash,
        });
        let response = self.send(self.http.post(url).json(&body)).await?;
        Ok(response.json().await?)
    }

    /// Release a remote reservation by its remote id.
    pub async fn release(&self, reservation_id: &str) -> RemoteResult<()> {
        let url = self.url(&format!("/api/reservations/{reservation_id}"))?;
        self.send(self.http.delete(url)).await?;
        Ok(())
    }

    /// Fetch the unavailability feed for one repository. Commits absent from
    /// the feed are available.
    pub async fn list_unavailable(&self, repo_remote_id: &str) -> RemoteResult<UnavailableFeed> {
        let url = self.url(&format!("/api/repos/{repo_remote_id}/unavailable-commits"))?;
        let response = self.send(self.http.get(url)).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await?;

        if content_type.starts_with("text/csv") || content_type.starts_with("text/plain") {
            Ok(feed::parse_csv(&body))
        } else {
            feed::parse_json(&body)
        }
    }

    /// All reservations held by this account on the remote service.
    pub async fn list_my_reservations(&self) -> RemoteResult<Vec<RemoteReservation>> {
        let url = self.url("/api/my-reservations")?;
        let response = self.send(self.http.get(url)).await?;
        Ok(response.json().await?)
    }
}

fn deserialize_rfc3339<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    OffsetDateTime::parse(&s, &Rfc3339).map_err(serde::de::Error::custom)
}

fn deserialize_opt_rfc3339<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    // Unparseable timestamps degrade to None; feed rows with a bad expiry
    // still count as unavailable.
    let s = Option::<String>::deserialize(deserializer)?;
    Ok(s.and_then(|s| OffsetDateTime::parse(&s, &Rfc3339).ok()))
}
