pub mod analysis;
pub mod gemini;
pub mod notify;
pub mod odds;
pub mod research;
pub mod sqlite;
