pub mod gemini;

pub use gemini::{shared_rate_limiter, GeminiClient};
