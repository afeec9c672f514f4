use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Selection keys used for head-to-head markets.
pub const HOME: &str = "home";
pub const AWAY: &str = "away";
pub const DRAW: &str = "draw";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPrice {
    /// Market key (e.g. `h2h`).
    pub market: String,
    /// Selection within the market (`home`, `away`, `draw`, ...).
    pub selection: String,
    /// Decimal odds.
    pub price: f64,
}

/// One observation of a match's prices from a single fetch. Snapshots are
/// append-only: the ordered sequence per match is its line-movement history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsSnapshot {
    pub id: String,
    pub match_id: String,
    pub bookmaker: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub prices: Vec<MarketPrice>,
}

impl OddsSnapshot {
    pub fn new(match_id: String, bookmaker: Option<String>, prices: Vec<MarketPrice>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            match_id,
            bookmaker,
            captured_at: Utc::now(),
            prices,
        }
    }

    /// Builds a head-to-head snapshot from home/draw/away decimal prices.
    pub fn h2h(
        match_id: String,
        bookmaker: Option<String>,
        home: Option<f64>,
        draw: Option<f64>,
        away: Option<f64>,
    ) -> Self {
        let prices = [(HOME, home), (DRAW, draw), (AWAY, away)]
            .into_iter()
            .filter_map(|(selection, price)| {
                price.map(|price| MarketPrice {
                    market: "h2h".into(),
                    selection: selection.into(),
                    price,
                })
            })
            .collect();
        Self::new(match_id, bookmaker, prices)
    }

    pub fn price_for(&self, selection: &str) -> Option<f64> {
        self.prices
            .iter()
            .find(|p| p.selection == selection)
            .map(|p| p.price)
    }
}
