//! Builds the analysis prompt from the strategy, the match, its odds history
//! and the research context.

use crate::config::strategy::StrategyConfig;
use crate::domain::entities::match_record::Match;
use crate::domain::entities::odds_snapshot::{OddsSnapshot, AWAY, DRAW, HOME};
use crate::domain::ports::research_provider::QualitativeReport;

pub const NO_ODDS: &str = "No odds data available for this match.";

const RESPONSE_SCHEMA: &str = "Generate a JSON object with the following structure:
- \"pick\": A string, one of \"home_win\", \"away_win\", or \"draw\".
- \"pick_text\": A short, human-readable pick.
- \"confidence\": A string, one of \"High\", \"Medium\", or \"Low\".
- \"edge_reason\": A single, compelling sentence explaining your edge.
- \"key_factors\": A JSON array of 2-4 short strings.";

pub fn build_prompt(
    record: &Match,
    history: &[OddsSnapshot],
    report: &QualitativeReport,
    strategy: &StrategyConfig,
) -> String {
    let mut sections = vec![
        strategy.persona().to_string(),
        format!("**Match:** {} vs {}", record.home_team, record.away_team),
        odds_section(record, history),
        format!(
            "**Context - Raw Search Data:**\n---\n{}\n---",
            report.as_context()
        ),
    ];

    let mut instructions = String::from("**Instructions:**\n");
    if let Some(line) = priorities_line(strategy) {
        instructions.push_str(&line);
        instructions.push('\n');
    }
    instructions.push_str(strategy.instructions());
    sections.push(instructions);
    sections.push(RESPONSE_SCHEMA.to_string());

    sections.join("\n\n")
}

/// Latest snapshot, plus the one before it for line movement.
fn odds_section(record: &Match, history: &[OddsSnapshot]) -> String {
    let mut newest_first = history.iter().rev();
    let Some(latest) = newest_first.next() else {
        return NO_ODDS.to_string();
    };

    let mut out = format!(
        "**Current Betting Odds:**\n- Bookmaker: {}\n- Home Win ({}): {}\n- Draw: {}\n- Away Win ({}): {}",
        latest.bookmaker.as_deref().unwrap_or("unknown"),
        record.home_team,
        price(latest, HOME),
        price(latest, DRAW),
        record.away_team,
        price(latest, AWAY),
    );
    if let Some(previous) = newest_first.next() {
        out.push_str(&format!(
            "\n\n**Previous Betting Odds (for movement analysis):**\n- Home Win: {}\n- Draw: {}\n- Away Win: {}",
            price(previous, HOME),
            price(previous, DRAW),
            price(previous, AWAY),
        ));
    }
    out
}

fn price(snapshot: &OddsSnapshot, selection: &str) -> String {
    snapshot
        .price_for(selection)
        .map(|p| format!("{p:.2}"))
        .unwrap_or_else(|| "n/a".to_string())
}

fn priorities_line(strategy: &StrategyConfig) -> Option<String> {
    if strategy.priorities().is_empty() {
        return None;
    }
    let list = strategy
        .ranked_criteria()
        .iter()
        .map(|c| c.label())
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!(
        "Your analysis should be weighted according to these priorities, in order: {list}."
    ))
}
