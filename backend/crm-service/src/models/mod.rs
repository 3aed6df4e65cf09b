//! Data models for CRM Service

pub mod activity;
pub mod customer;
pub mod invitation;
pub mod session;
pub mod user;

pub use activity::{NewActivity, TeamActivity};
pub use customer::{
    CreateCustomerRequest, CreateNoteRequest, Customer, CustomerAnalytics, CustomerFilter,
    CustomerNote, CustomerPatch, CustomerStatus, NewCustomer, NewCustomerNote,
    UpdateCustomerRequest,
};
pub use invitation::{normalize_email, CreateInvitationRequest, Invitation};
pub use session::Session;
pub use user::{ExternalIdentity, NewUser, PublicProfile, User};
