use crate::domain::error::DomainError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Thin `generateContent` client shared by the research and analysis adapters.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Ground the answer with the Google Search tool.
    pub google_search: bool,
    /// Ask for `application/json` output.
    pub json_output: bool,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<Value>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Returns the concatenated text parts of the first candidate. Errors are
    /// plain strings; callers map them onto their own stage.
    pub async fn generate(&self, model: &str, prompt: &str, opts: GenerateOptions) -> Result<String, String> {
        let request = GenerateRequest {
            contents: vec![json!({ "role": "user", "parts": [{ "text": prompt }] })],
            tools: if opts.google_search {
                vec![json!({ "google_search": {} })]
            } else {
                Vec::new()
            },
            generation_config: opts
                .json_output
                .then(|| json!({ "responseMimeType": "application/json" })),
        };

        let resp = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, model))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Gemini API error: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("Gemini API {status}: {body}"));
        }

        let result: GenerateResponse = resp.json().await.map_err(|e| format!("Parse error: {e}"))?;
        Ok(first_candidate_text(result))
    }
}

fn first_candidate_text(resp: GenerateResponse) -> String {
    resp.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

/// Maps a client failure onto the analysis stage. An invalid key is a
/// configuration problem, not a per-match failure.
pub fn analysis_error(msg: String) -> DomainError {
    if msg.contains("API_KEY_INVALID") {
        DomainError::Config(msg)
    } else {
        DomainError::Analysis(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joins_text_parts_of_first_candidate() {
        let resp: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [
                {"content": {"parts": [{"text": "{\"pick\":"}, {"text": " \"draw\"}"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(first_candidate_text(resp), "{\"pick\": \"draw\"}");
    }

    #[test]
    fn test_no_candidates_is_empty_text() {
        let resp: GenerateResponse = serde_json::from_str(r#"{"promptFeedback": {}}"#).unwrap();
        assert_eq!(first_candidate_text(resp), "");
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            contents: vec![json!({ "role": "user", "parts": [{ "text": "hi" }] })],
            tools: vec![json!({ "google_search": {} })],
            generation_config: None,
        };
        let v = serde_json::to_value(&request).unwrap();
        assert_eq!(v["tools"][0], json!({ "google_search": {} }));
        assert!(v.get("generationConfig").is_none());
    }
}
