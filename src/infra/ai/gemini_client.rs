// =============================================================================
// GEMINI CLIENT - Google AI Studio moderation integration
// =============================================================================
//
// Implements the `AiModerator` trait against Google's Gemini API
// (https://ai.google.dev/gemini-api/docs).
//
// **API notes:**
// - Authentication: API key is passed as a query parameter (`?key=API_KEY`)
//   rather than a Bearer token in the Authorization header.
// - Request format: `contents[]` with nested `parts`; safety thresholds go in
//   a top-level `safetySettings` array.
// - Response format: answer text is at `candidates[0].content.parts[0].text`,
//   safety verdicts at `candidates[0].safetyRatings`.
//
// The model is asked for a one-word SAFE/UNSAFE answer, but Gemini's own
// safety ratings outrank whatever the text says: a MEDIUM or HIGH probability
// on any category rejects the content even when the answer reads "SAFE".
//
// **Environment Variables:**
// - `GEMINI_API_KEY` - API key from https://aistudio.google.com/apikey

use crate::core::moderation::{AiModerator, ClassifyError, Verdict};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Cheapest text model; moderation only needs a one-word answer.
const MODEL: &str = "gemini-2.5-flash-lite";

/// Bound on the whole HTTP round trip, nested inside the job timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Categories we ask Gemini to screen, all at medium-and-above blocking.
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

const SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";

// =============================================================================
// GEMINI API DATA STRUCTURES
// =============================================================================
//
// These structs model the generateContent request/response format.
// See: https://ai.google.dev/api/generate-content

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    /// Low temperature: we want a deterministic SAFE/UNSAFE call.
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

/// One safety verdict from the model, e.g.
/// `{ "category": "HARM_CATEGORY_HATE_SPEECH", "probability": "MEDIUM" }`.
#[derive(Debug, Deserialize)]
struct SafetyRating {
    category: String,
    probability: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,

    #[serde(default)]
    safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

/// Error body shape, parsed for friendlier warnings.
#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

// =============================================================================
// CLIENT
// =============================================================================

/// Gemini-backed content moderator.
///
/// # Example
/// ```ignore
/// let moderator = GeminiModerator::new(std::env::var("GEMINI_API_KEY")?);
/// let verdict = moderator.classify("hello chirper").await?;
/// ```
pub struct GeminiModerator {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiModerator {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the client somewhere else, e.g. a stub server.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    fn build_request(content: &str) -> GenerateContentRequest {
        let instruction = format!(
            "Please analyze this content for safety and appropriateness. Respond with \
             only 'SAFE' if the content is appropriate, or 'UNSAFE' followed by the \
             reason if it contains inappropriate content. Content to analyze: {content}"
        );

        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: instruction }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 50,
            },
            safety_settings: SAFETY_CATEGORIES
                .into_iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: SAFETY_THRESHOLD,
                })
                .collect(),
        }
    }

    /// Turn a successful API response into a verdict.
    ///
    /// Safety ratings are checked before the text answer: if Gemini itself
    /// flagged the content, that outranks whatever the model wrote.
    fn interpret(response: GenerateContentResponse) -> Result<Verdict, ClassifyError> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ClassifyError::Unparsable("no candidates in response".to_string()))?;

        let flagged: Vec<String> = candidate
            .safety_ratings
            .iter()
            .filter(|rating| matches!(rating.probability.as_str(), "MEDIUM" | "HIGH"))
            .map(|rating| rating.category.clone())
            .collect();

        if !flagged.is_empty() {
            return Ok(Verdict::rejected(
                format!(
                    "Content flagged by Gemini safety filters: {}",
                    flagged.join(", ")
                ),
                0.9,
            ));
        }

        let text = candidate
            .content
            .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
            .unwrap_or_default();

        let answer = text.trim().to_uppercase();

        if answer.starts_with("SAFE") {
            return Ok(Verdict::approved("Content passed Gemini AI moderation", 0.95));
        }

        if let Some(remainder) = answer.strip_prefix("UNSAFE") {
            let detail = remainder.trim();
            let detail = if detail.is_empty() {
                "Inappropriate content detected"
            } else {
                detail
            };
            return Ok(Verdict::rejected(
                format!("Content flagged by Gemini: {detail}"),
                0.9,
            ));
        }

        // Anything else is a shape we don't understand. The caller falls
        // back to the rules; an unreadable answer is never an approval.
        Err(ClassifyError::Unparsable(text))
    }
}

#[async_trait]
impl AiModerator for GeminiModerator {
    async fn classify(&self, content: &str) -> Result<Verdict, ClassifyError> {
        if self.api_key.is_empty() {
            return Err(ClassifyError::MissingKey);
        }

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, MODEL, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&Self::build_request(content))
            .send()
            .await
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            // Pull out the API's own message when the body parses.
            if let Ok(error) = serde_json::from_str::<GeminiErrorResponse>(&body) {
                tracing::warn!(
                    status = status.as_u16(),
                    message = %error.error.message,
                    "Gemini API request failed"
                );
            } else {
                tracing::warn!(status = status.as_u16(), body = %body, "Gemini API request failed");
            }

            return Err(ClassifyError::Status(status.as_u16()));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;

        Self::interpret(parsed)
    }
}

// =============================================================================
// TESTS
// =============================================================================
