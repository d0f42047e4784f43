pub mod claude;
pub mod factory;
pub mod traits;

pub use factory::ExecutorFactory;
pub use traits::{ExecutorConfig, ExecutorOutput, ExecutorSession, ExecutorType};
