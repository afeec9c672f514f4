pub mod settings;
pub mod strategy;
