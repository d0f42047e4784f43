pub mod groq;
pub mod mock;

pub use groq::GroqProvider;
pub use mock::MockProvider;
