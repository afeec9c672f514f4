pub mod the_odds_api;
