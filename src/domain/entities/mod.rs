pub mod cycle_summary;
pub mod match_record;
pub mod odds_snapshot;
pub mod recommendation;
