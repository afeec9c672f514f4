pub mod analysis_engine;
pub mod match_store;
pub mod notification_channel;
pub mod odds_source;
pub mod research_provider;
