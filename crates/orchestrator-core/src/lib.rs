pub mod confirmation;
pub mod ports;
pub mod runtime;
pub mod session;
pub mod state;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

pub use confirmation::{ConfirmationTicket, ConfirmVote};
pub use ports::{ExecutorPort, OutboundPort, RouterContext, RouterPort, RoutingDecision, SessionStorePort, SummarizerPort};
pub use runtime::{EventLoop, Ports};
pub use session::{time_aware_phrase, Session, SessionHistory, SessionStatus};
pub use state::{Core, Effect, Event, ExecutorOutcome, State};
