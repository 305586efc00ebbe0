//! Gateway connection
//!
//! The session state machine, its heartbeat task, and the socket plumbing
//! underneath them.

mod backoff;
mod heartbeat;
mod session;
mod socket;
mod state;
mod throttle;

pub use session::{GatewaySession, SessionHandle};
pub use state::SessionState;
