use crate::domain::entities::match_record::Match;
use crate::domain::entities::odds_snapshot::OddsSnapshot;
use crate::domain::error::DomainError;
use crate::domain::ports::odds_source::{ObservedMatch, OddsSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

const ODDS_API_BASE_URL: &str = "https://api.the-odds-api.com/v4";
const BOOKMAKERS: &str = "unibet,pinnacle";

/// One event from `/sports/{league}/odds`.
#[derive(Debug, Deserialize)]
struct OddsApiEvent {
    id: String,
    sport_key: String,
    commence_time: DateTime<Utc>,
    home_team: String,
    away_team: String,
    #[serde(default)]
    bookmakers: Vec<OddsApiBookmaker>,
}

#[derive(Debug, Deserialize)]
struct OddsApiBookmaker {
    title: String,
    #[serde(default)]
    markets: Vec<OddsApiMarket>,
}

#[derive(Debug, Deserialize)]
struct OddsApiMarket {
    key: String,
    #[serde(default)]
    outcomes: Vec<OddsApiOutcome>,
}

#[derive(Debug, Deserialize)]
struct OddsApiOutcome {
    name: String,
    price: f64,
}

/// Head-to-head decimal odds from The Odds API, one request per league.
pub struct TheOddsApiSource {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl TheOddsApiSource {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: ODDS_API_BASE_URL.into(),
            client: reqwest::Client::builder()
                .user_agent("OddsAgent/0.1")
                .build()
                .unwrap_or_default(),
        }
    }

    /// Points the client at another API root, such as a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_league(&self, league: &str) -> Result<Vec<ObservedMatch>, DomainError> {
        let resp = self
            .client
            .get(format!("{}/sports/{}/odds", self.base_url, league))
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("regions", "eu"),
                ("markets", "h2h"),
                ("oddsFormat", "decimal"),
                ("bookmakers", BOOKMAKERS),
            ])
            .send()
            .await
            .map_err(|e| DomainError::SourceUnavailable(format!("{league}: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DomainError::Config(format!(
                "Odds API rejected the API key ({status})"
            )));
        }
        if !status.is_success() {
            return Err(DomainError::SourceUnavailable(format!(
                "Odds API returned {status} for {league}"
            )));
        }

        if let Some(remaining) = resp.headers().get("x-requests-remaining") {
            debug!(league, remaining = ?remaining, "odds api quota");
        }

        let events: Vec<OddsApiEvent> = resp
            .json()
            .await
            .map_err(|e| DomainError::SourceUnavailable(format!("{league}: invalid response: {e}")))?;
        Ok(events.into_iter().map(into_observed).collect())
    }
}

/// Picks the first bookmaker offering an h2h market and maps its outcomes onto
/// home/draw/away by team name. Events without such a bookmaker still yield a
/// snapshot, with no prices.
fn into_observed(event: OddsApiEvent) -> ObservedMatch {
    let h2h = event.bookmakers.iter().find_map(|b| {
        b.markets
            .iter()
            .find(|m| m.key == "h2h")
            .map(|m| (b.title.clone(), m))
    });

    let (mut home, mut draw, mut away) = (None, None, None);
    let bookmaker = h2h.map(|(title, market)| {
        for outcome in &market.outcomes {
            if outcome.name == event.home_team {
                home = Some(outcome.price);
            } else if outcome.name == event.away_team {
                away = Some(outcome.price);
            } else {
                draw = Some(outcome.price);
            }
        }
        title
    });

    let record = Match::new(
        event.id,
        event.sport_key,
        event.home_team,
        event.away_team,
        event.commence_time,
    );
    let snapshot = OddsSnapshot::h2h(record.id.clone(), bookmaker, home, draw, away);
    ObservedMatch { record, snapshot }
}

#[async_trait]
impl OddsSource for TheOddsApiSource {
    fn name(&self) -> &str {
        "the-odds-api"
    }

    /// Leagues are fetched independently; the call only fails when every
    /// league failed.
    async fn fetch(&self, leagues: &[String]) -> Result<Vec<ObservedMatch>, DomainError> {
        let mut observed = Vec::new();
        let mut errors = Vec::new();

        for league in leagues {
            match self.fetch_league(league).await {
                Ok(matches) => {
                    debug!(league = %league, count = matches.len(), "league odds fetched");
                    observed.extend(matches);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(league = %league, error = %e, "league odds fetch failed");
                    errors.push(e.to_string());
                }
            }
        }

        if !leagues.is_empty() && errors.len() == leagues.len() {
            return Err(DomainError::SourceUnavailable(errors.join("; ")));
        }
        Ok(observed)
    }
}
