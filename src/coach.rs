//! Daily motivational message produced by an external text-generation API.

use crate::models::{Assessment, CoachMessage, Goal, OwnerId};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-pro";

#[derive(Debug, Clone, Error)]
pub enum CoachError {
    #[error("text generation is not configured: GEMINI_API_KEY is not set")]
    MissingApiKey,
    #[error("profile incomplete: a first name is required")]
    ProfileIncomplete,
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for CoachError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, CoachError>;
}

/// Builds the generation prompt from what the user told us about themselves.
pub fn build_prompt(
    first_name: &str,
    today: NaiveDate,
    goals: &[Goal],
    assessments: &[Assessment],
) -> String {
    let weekday = today.format("%A");

    let goals_text = if goals.is_empty() {
        "no specific goals yet".to_string()
    } else {
        goals
            .iter()
            .map(|goal| {
                format!(
                    "You want to achieve {} because {}.",
                    goal.name, goal.importance
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    };

    let assessment_text = if assessments.is_empty() {
        "no assessments yet".to_string()
    } else {
        assessments
            .iter()
            .map(describe_assessment)
            .collect::<Vec<_>>()
            .join(" ")
    };

    format!(
        "Generate a short, supportive and relatable message for {first_name} on this {weekday} \
         based on their goals: {goals_text} and assessments: {assessment_text}. \
         The message should not include emojis or hashtags."
    )
}

fn describe_assessment(assessment: &Assessment) -> String {
    match assessment {
        Assessment::OldMe {
            limiting_beliefs,
            bad_habits,
            time_wasters,
            energy_drainers,
            growth_blockers,
        } => format!(
            "You have limiting beliefs of {limiting_beliefs}, bad habits of {bad_habits}, \
             time wasters of {time_wasters}, energy drainers of {energy_drainers}, \
             and growth blockers of {growth_blockers}."
        ),
        Assessment::NewMe {
            new_beliefs,
            empowering_habits,
            time_investment,
            energy_gains,
            growth_areas,
        } => format!(
            "You have new beliefs of {new_beliefs}, empowering habits of {empowering_habits}, \
             time investment of {time_investment}, energy gains of {energy_gains}, \
             and growth areas of {growth_areas}."
        ),
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content
            .parts
            .into_iter()
            .next()?
            .text
    }
}

/// Google Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(api_key: String, model: String) -> Result<Self, CoachError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("habit-tracker/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_key,
            model,
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, CoachError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        debug!(model = %self.model, "requesting generated text");
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "text generation failed");
            return Err(CoachError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|err| CoachError::InvalidResponse(err.to_string()))?;
        parsed
            .into_text()
            .ok_or_else(|| CoachError::InvalidResponse("missing candidate text".to_string()))
    }
}

/// Hands out one generated message per owner per day.
pub struct Coach {
    generator: Option<Arc<dyn TextGenerator>>,
    cache: Mutex<HashMap<OwnerId, CoachMessage>>,
}

impl Coach {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            generator: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.generator.is_some()
    }

    pub fn ensure_enabled(&self) -> Result<(), CoachError> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(CoachError::MissingApiKey)
        }
    }

    pub async fn cached(&self, owner: &OwnerId, today: NaiveDate) -> Option<CoachMessage> {
        let cache = self.cache.lock().await;
        cache
            .get(owner)
            .filter(|message| message.date == today)
            .cloned()
    }

    /// Generates today's message and remembers it. Failures are not cached.
    pub async fn generate(
        &self,
        owner: &OwnerId,
        today: NaiveDate,
        prompt: &str,
    ) -> Result<CoachMessage, CoachError> {
        let generator = self.generator.as_ref().ok_or(CoachError::MissingApiKey)?;
        let text = generator.generate(prompt).await?;
        let message = CoachMessage {
            date: today,
            text: text.trim().to_string(),
        };

        info!(owner = %owner, "generated daily coach message");
        self.cache
            .lock()
            .await
            .insert(owner.clone(), message.clone());
        Ok(message)
    }
}
