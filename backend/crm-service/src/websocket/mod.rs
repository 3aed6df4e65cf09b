//! Real-time change propagation
//!
//! The broadcaster fans change events out to every connected observer; each
//! WebSocket session is one observer.

pub mod manager;
pub mod messages;
pub mod session;

pub use manager::{ChangeBroadcaster, PublishReport, Subscription};
pub use messages::ChangeEvent;
pub use session::ChangeFeedSession;
