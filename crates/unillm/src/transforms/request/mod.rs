pub mod to_anthropic;
pub mod to_gemini;
pub mod to_openai;
