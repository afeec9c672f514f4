use crate::config::strategy::StrategyConfig;
use crate::domain::entities::match_record::Match;
use crate::domain::entities::odds_snapshot::OddsSnapshot;
use crate::domain::entities::recommendation::RecommendationContent;
use crate::domain::error::DomainError;
use crate::domain::ports::analysis_engine::AnalysisEngine;
use crate::domain::ports::research_provider::QualitativeReport;
use crate::infrastructure::analysis::prompt::build_prompt;
use crate::infrastructure::gemini::{analysis_error, GeminiClient, GenerateOptions};
use serde::Deserialize;
use tracing::debug;

const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub struct GeminiAnalysisEngine {
    client: GeminiClient,
    model: String,
}

/// Model output before validation. Enum fields arrive as free text.
#[derive(Debug, Deserialize)]
struct RawRecommendation {
    pick: String,
    pick_text: String,
    confidence: String,
    edge_reason: String,
    #[serde(default)]
    key_factors: Vec<String>,
}

impl GeminiAnalysisEngine {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: GeminiClient::new(api_key),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client = self.client.with_base_url(base_url);
        self
    }
}

/// Parses the model's JSON answer. Tolerates a Markdown code fence around it.
pub fn parse_recommendation(text: &str) -> Result<RecommendationContent, DomainError> {
    let body = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    if body.is_empty() {
        return Err(DomainError::Analysis("empty model response".into()));
    }

    let raw: RawRecommendation = serde_json::from_str(body)
        .map_err(|e| DomainError::Analysis(format!("malformed recommendation JSON: {e}")))?;
    let content = RecommendationContent {
        pick: raw.pick.parse().map_err(DomainError::Analysis)?,
        pick_text: raw.pick_text.trim().to_string(),
        confidence: raw.confidence.parse().map_err(DomainError::Analysis)?,
        edge_reason: raw.edge_reason.trim().to_string(),
        key_factors: raw
            .key_factors
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect(),
    };
    content.validate()?;
    Ok(content)
}

#[async_trait::async_trait]
impl AnalysisEngine for GeminiAnalysisEngine {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn analyze(
        &self,
        record: &Match,
        history: &[OddsSnapshot],
        report: &QualitativeReport,
        strategy: &StrategyConfig,
    ) -> Result<RecommendationContent, DomainError> {
        let prompt = build_prompt(record, history, report, strategy);
        debug!(match_id = %record.id, model = %self.model, snapshots = history.len(), "requesting analysis");

        let opts = GenerateOptions {
            google_search: false,
            json_output: true,
        };
        let text = self
            .client
            .generate(&self.model, &prompt, opts)
            .await
            .map_err(analysis_error)?;
        parse_recommendation(&text)
    }
}
