pub mod memory;
pub mod providers;
pub mod traits;
pub mod types;

pub use memory::{ConversationMemory, Message, MessageRole};
pub use providers::{GroqProvider, MockProvider};
pub use traits::LLMProvider;
pub use types::{RouterActionWire, RouterResponseWire};
