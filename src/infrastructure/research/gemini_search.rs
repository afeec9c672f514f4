use crate::domain::entities::match_record::Match;
use crate::domain::ports::research_provider::{QualitativeReport, ResearchProvider};
use crate::infrastructure::gemini::{GeminiClient, GenerateOptions};
use tracing::{debug, warn};

const DEFAULT_SEARCH_MODEL: &str = "gemini-2.0-flash";

/// Grounded web research: one batched Google Search query per match covering
/// both teams' availability, form and the head-to-head.
pub struct GeminiSearchResearch {
    client: GeminiClient,
    model: String,
}

impl GeminiSearchResearch {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: GeminiClient::new(api_key),
            model: model.unwrap_or_else(|| DEFAULT_SEARCH_MODEL.to_string()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client = self.client.with_base_url(base_url);
        self
    }
}

pub fn research_query(record: &Match) -> String {
    let home = &record.home_team;
    let away = &record.away_team;
    let date = record.start_time.format("%Y-%m-%d");
    format!(
        "Find current betting-relevant information for {home} vs {away} match on {date}: \
         1) {home} injury report, suspensions, player availability, recent home form and motivation; \
         2) {away} injury report, suspensions, player availability, recent away form and motivation; \
         3) Head-to-head history, tactical matchups, and match preview analysis; \
         4) Any other factors affecting match outcome like team news, lineup changes, or external motivations. \
         Focus on factual information that could impact betting decisions."
    )
}

fn search_prompt(query: &str) -> String {
    format!(
        "You are a sports news assistant. Use Google Search to find the latest factual information about: {query} \
         Focus on player injuries, team updates, and relevant news that affects match outcomes. \
         Provide concise and accurate information with citations."
    )
}

#[async_trait::async_trait]
impl ResearchProvider for GeminiSearchResearch {
    fn name(&self) -> &str {
        "gemini-search"
    }

    async fn research(&self, record: &Match) -> QualitativeReport {
        let prompt = search_prompt(&research_query(record));
        let opts = GenerateOptions {
            google_search: true,
            json_output: false,
        };
        match self.client.generate(&self.model, &prompt, opts).await {
            Ok(text) => {
                debug!(match_id = %record.id, chars = text.len(), "research returned");
                QualitativeReport::from_text(text.trim())
            }
            Err(e) => {
                warn!(match_id = %record.id, error = %e, "research failed, continuing without it");
                QualitativeReport::Empty
            }
        }
    }
}
