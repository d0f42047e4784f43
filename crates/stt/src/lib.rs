pub mod traits;

pub use traits::{TranscriptionProvider, TranscriptionResult};
