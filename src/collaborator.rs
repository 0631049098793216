//! Request/response boundary to the message and scoring service. The
//! service itself lives elsewhere; this side only shapes the request and
//! decodes what comes back.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CollaboratorError;
use crate::profile::ProfileDraft;

static CODE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*```[A-Za-z]*\s*$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    GenerateMessage,
    ScoreProfile,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaboratorRequest {
    pub action: Action,
    pub profile_data: ProfileDraft,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
}

impl CollaboratorRequest {
    pub fn new(action: Action, draft: ProfileDraft) -> Self {
        Self {
            action,
            profile_data: draft,
            user_name: None,
            objective: None,
        }
    }

    pub fn with_sender(mut self, user_name: Option<String>, objective: Option<String>) -> Self {
        self.user_name = user_name;
        self.objective = objective;
        self
    }
}

/// Response envelope. `score` may arrive as a number or as model text that
/// still needs decoding, so it is kept loose here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawResponse {
    pub success: bool,
    pub message: Option<String>,
    pub score: Option<serde_json::Value>,
    pub reasons: Option<Vec<String>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub score: u8,
    #[serde(default)]
    pub reasons: Vec<String>,
}

#[async_trait]
pub trait Collaborator: Send + Sync {
    async fn send(&self, request: &CollaboratorRequest) -> Result<RawResponse, CollaboratorError>;

    async fn generate_message(&self, request: CollaboratorRequest) -> Result<String, CollaboratorError> {
        let resp = self.send(&request).await?;
        let resp = accepted(resp)?;
        resp.message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .ok_or_else(|| CollaboratorError::Rejected("Empty message in response".into()))
    }

    async fn score_profile(&self, request: CollaboratorRequest) -> Result<ScoreCard, CollaboratorError> {
        let resp = self.send(&request).await?;
        score_from_response(accepted(resp)?)
    }
}

fn accepted(resp: RawResponse) -> Result<RawResponse, CollaboratorError> {
    if resp.success {
        Ok(resp)
    } else {
        Err(CollaboratorError::Rejected(
            resp.error.unwrap_or_else(|| "Request failed".to_string()),
        ))
    }
}

pub fn score_from_response(resp: RawResponse) -> Result<ScoreCard, CollaboratorError> {
    match resp.score {
        Some(serde_json::Value::Number(n)) => Ok(ScoreCard {
            score: clamp_score(n.as_f64().unwrap_or_default()),
            reasons: resp.reasons.unwrap_or_default(),
        }),
        Some(serde_json::Value::String(text)) => parse_score(&text),
        _ => match resp.message {
            Some(text) => parse_score(&text),
            None => Err(CollaboratorError::MalformedScore("no score in response".into())),
        },
    }
}

/// Decode a score payload. A payload that is not valid JSON gets exactly one
/// more attempt with code-fence lines removed.
pub fn parse_score(text: &str) -> Result<ScoreCard, CollaboratorError> {
    match decode_score(text) {
        Ok(card) => Ok(card),
        Err(first) => {
            let stripped = strip_code_fences(text);
            decode_score(&stripped).map_err(|_| CollaboratorError::MalformedScore(first))
        }
    }
}

fn decode_score(text: &str) -> Result<ScoreCard, String> {
    #[derive(Deserialize)]
    struct Loose {
        score: f64,
        #[serde(default)]
        reasons: Vec<String>,
    }

    let loose: Loose = serde_json::from_str(text.trim()).map_err(|e| e.to_string())?;
    Ok(ScoreCard {
        score: clamp_score(loose.score),
        reasons: loose.reasons,
    })
}

fn clamp_score(raw: f64) -> u8 {
    raw.round().clamp(0.0, 100.0) as u8
}

pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE_RE.replace_all(text, "").trim().to_string()
}

/// Posts the request JSON to a configured endpoint.
pub struct HttpCollaborator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCollaborator {
    pub fn new(endpoint: &str) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn from_settings(endpoint: Option<&str>) -> Result<Self, CollaboratorError> {
        match endpoint {
            Some(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Err(CollaboratorError::NotConfigured),
        }
    }
}

#[async_trait]
impl Collaborator for HttpCollaborator {
    async fn send(&self, request: &CollaboratorRequest) -> Result<RawResponse, CollaboratorError> {
        info!(action = ?request.action, endpoint = %self.endpoint, "Calling collaborator");

        let resp = self.client.post(&self.endpoint).json(request).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<RawResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(body);
            warn!(status = status.as_u16(), "Collaborator returned an error");
            return Err(CollaboratorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| CollaboratorError::Rejected(e.to_string()))
    }
}

// ── Tests ──
