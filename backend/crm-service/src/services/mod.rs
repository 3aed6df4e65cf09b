//! Business services
//!
//! Each service owns one concern and talks to storage through
//! `Arc<dyn Storage>`; HTTP handlers only orchestrate them.

pub mod activity;
pub mod customers;
pub mod export;
pub mod identity;
pub mod invitations;
pub mod oauth;
pub mod sessions;

pub use activity::ActivityRecorder;
pub use customers::CustomerService;
pub use identity::IdentityResolver;
pub use invitations::InvitationLedger;
pub use oauth::{FacebookProvider, IdentityProvider};
pub use sessions::{SessionCredential, SessionGuard};
