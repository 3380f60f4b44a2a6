pub mod from_anthropic;
pub mod from_gemini;
pub mod from_openai;
