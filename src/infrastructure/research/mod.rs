pub mod gemini_search;
pub mod noop;
