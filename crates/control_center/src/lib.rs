pub mod executor;
pub mod logs;

pub mod center;

pub use logs::{LogType, ParsedLogLine, LogMonitor, ClaudeLogMonitor, spawn_log_monitor};
pub use executor::{ExecutorSession, ExecutorConfig, ExecutorType, ExecutorFactory, ExecutorOutput};
pub use center::ControlCenter;

