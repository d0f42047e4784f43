pub mod bridge;
pub mod executor_adapter;
pub mod outbound_adapter;
pub mod router_adapter;
pub mod session_store;
pub mod summarizer_adapter;

pub use bridge::Bridge;
pub use executor_adapter::ExecutorAdapter;
pub use outbound_adapter::BroadcastOutbound;
pub use router_adapter::RouterAdapter;
pub use session_store::{ArtifactStore, RegistryConfig};
pub use summarizer_adapter::SummarizerAdapter;
