//! In-memory storage
//!
//! All collections live behind one `RwLock`, so the invitation-consume and
//! user-create pair happens inside a single critical section.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    ActivityRepository, CustomerRepository, InvitationRepository, SessionRepository, StoreError,
    StoreResult, UserCreation, UserRepository,
};
use crate::models::{
    Customer, CustomerFilter, CustomerNote, CustomerPatch, Invitation, NewActivity, NewCustomer,
    NewCustomerNote, NewUser, Session, TeamActivity, User,
};

#[derive(Default)]
struct State {
    invitations: Vec<Invitation>,
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, Session>,
    customers: HashMap<Uuid, Customer>,
    notes: Vec<CustomerNote>,
    activity: Vec<TeamActivity>,
}

impl State {
    fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.values().find(|u| u.email == email)
    }

    fn customer_email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.customers
            .values()
            .any(|c| c.email == email && Some(c.id) != except)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<RwLock<State>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvitationRepository for MemoryStorage {
    async fn insert_invitation(&self, email: &str, invited_by: &str) -> StoreResult<Invitation> {
        let mut state = self.state.write().await;
        if state
            .invitations
            .iter()
            .any(|i| i.email == email && !i.is_used)
        {
            return Err(StoreError::Conflict("invitations_unused_email".into()));
        }

        let invitation = Invitation {
            id: Uuid::new_v4(),
            email: email.to_string(),
            invited_by: invited_by.to_string(),
            is_used: false,
            created_at: Utc::now(),
            used_at: None,
        };
        state.invitations.push(invitation.clone());
        Ok(invitation)
    }

    async fn find_unused_invitation(&self, email: &str) -> StoreResult<Option<Invitation>> {
        let state = self.state.read().await;
        Ok(state
            .invitations
            .iter()
            .filter(|i| i.email == email && !i.is_used)
            .max_by_key(|i| i.created_at)
            .cloned())
    }

    async fn consume_invitation(&self, id: Uuid) -> StoreResult<Invitation> {
        let mut state = self.state.write().await;
        let invitation = state
            .invitations
            .iter_mut()
            .find(|i| i.id == id && !i.is_used)
            .ok_or(StoreError::NotFound)?;
        invitation.is_used = true;
        invitation.used_at = Some(Utc::now());
        Ok(invitation.clone())
    }

    async fn list_invitations(&self) -> StoreResult<Vec<Invitation>> {
        let state = self.state.read().await;
        let mut invitations = state.invitations.clone();
        invitations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invitations)
    }
}

#[async_trait]
impl UserRepository for MemoryStorage {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.user_by_email(email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn create_user_with_invitation(
        &self,
        new_user: NewUser,
        invitation_id: Uuid,
    ) -> StoreResult<UserCreation> {
        let mut state = self.state.write().await;

        if state.user_by_email(&new_user.email).is_some() {
            return Ok(UserCreation::EmailTaken);
        }
        if let Some(external_id) = new_user.external_id.as_deref() {
            if state
                .users
                .values()
                .any(|u| u.external_id.as_deref() == Some(external_id))
            {
                return Err(StoreError::Conflict("users_external_id_key".into()));
            }
        }

        let now = Utc::now();
        let invitation = state
            .invitations
            .iter_mut()
            .find(|i| i.id == invitation_id && !i.is_used)
            .ok_or(StoreError::NotFound)?;
        invitation.is_used = true;
        invitation.used_at = Some(now);

        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            name: new_user.name,
            external_id: new_user.external_id,
            profile_picture: new_user.profile_picture,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(UserCreation::Created(user))
    }

    async fn set_user_active(&self, email: &str, active: bool) -> StoreResult<User> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .values_mut()
            .find(|u| u.email == email)
            .ok_or(StoreError::NotFound)?;
        user.is_active = active;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl SessionRepository for MemoryStorage {
    async fn insert_session(&self, session: Session) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.sessions.contains_key(&session.token_hash) {
            return Err(StoreError::Conflict("sessions_pkey".into()));
        }
        state.sessions.insert(session.token_hash.clone(), session);
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        Ok(self.state.read().await.sessions.get(token_hash).cloned())
    }

    async fn delete_session(&self, token_hash: &str) -> StoreResult<bool> {
        Ok(self
            .state
            .write()
            .await
            .sessions
            .remove(token_hash)
            .is_some())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - state.sessions.len()) as u64)
    }
}

#[async_trait]
impl CustomerRepository for MemoryStorage {
    async fn list_customers(&self, filter: &CustomerFilter) -> StoreResult<Vec<Customer>> {
        let state = self.state.read().await;
        let mut customers: Vec<Customer> = state
            .customers
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        customers.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(customers)
    }

    async fn get_customer(&self, id: Uuid) -> StoreResult<Option<Customer>> {
        Ok(self.state.read().await.customers.get(&id).cloned())
    }

    async fn insert_customer(&self, input: NewCustomer) -> StoreResult<Customer> {
        let mut state = self.state.write().await;
        if state.customer_email_taken(&input.email, None) {
            return Err(StoreError::Conflict("customers_email_key".into()));
        }

        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4(),
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            phone: input.phone,
            company: input.company,
            role: input.role,
            status: input.status,
            region: input.region,
            last_contact: input.last_contact,
            last_contact_by: input.last_contact_by,
            created_at: now,
            updated_at: now,
        };
        state.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn update_customer(&self, id: Uuid, patch: CustomerPatch) -> StoreResult<Customer> {
        let mut state = self.state.write().await;
        if let Some(email) = patch.email.as_deref() {
            if state.customer_email_taken(email, Some(id)) {
                return Err(StoreError::Conflict("customers_email_key".into()));
            }
        }

        let customer = state.customers.get_mut(&id).ok_or(StoreError::NotFound)?;
        patch.apply(customer, Utc::now());
        Ok(customer.clone())
    }

    async fn delete_customer(&self, id: Uuid) -> StoreResult<Customer> {
        let mut state = self.state.write().await;
        let customer = state.customers.remove(&id).ok_or(StoreError::NotFound)?;
        state.notes.retain(|n| n.customer_id != id);
        Ok(customer)
    }

    async fn list_notes(&self, customer_id: Uuid) -> StoreResult<Vec<CustomerNote>> {
        let state = self.state.read().await;
        let mut notes: Vec<CustomerNote> = state
            .notes
            .iter()
            .filter(|n| n.customer_id == customer_id)
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notes)
    }

    async fn insert_note(&self, input: NewCustomerNote) -> StoreResult<CustomerNote> {
        let mut state = self.state.write().await;
        if !state.customers.contains_key(&input.customer_id) {
            return Err(StoreError::NotFound);
        }

        let note = CustomerNote {
            id: Uuid::new_v4(),
            customer_id: input.customer_id,
            content: input.content,
            author_name: input.author_name,
            created_at: Utc::now(),
        };
        state.notes.push(note.clone());
        Ok(note)
    }

    async fn count_customers(&self) -> StoreResult<i64> {
        Ok(self.state.read().await.customers.len() as i64)
    }

    async fn count_customers_with_status(&self, status: &str) -> StoreResult<i64> {
        let state = self.state.read().await;
        Ok(state
            .customers
            .values()
            .filter(|c| c.status.as_str() == status)
            .count() as i64)
    }

    async fn count_notes(&self) -> StoreResult<i64> {
        Ok(self.state.read().await.notes.len() as i64)
    }
}

#[async_trait]
impl ActivityRepository for MemoryStorage {
    async fn insert_activity(&self, entry: NewActivity) -> StoreResult<TeamActivity> {
        let mut state = self.state.write().await;
        let activity = TeamActivity {
            id: Uuid::new_v4(),
            action: entry.action,
            user_name: entry.user_name,
            customer_name: entry.customer_name,
            customer_id: entry.customer_id,
            created_at: Utc::now(),
        };
        state.activity.push(activity.clone());
        Ok(activity)
    }

    async fn recent_activity(&self, limit: i64) -> StoreResult<Vec<TeamActivity>> {
        let state = self.state.read().await;
        // Entries are appended in time order; ties on `created_at` keep insertion order.
        Ok(state
            .activity
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count_activity_since(&self, action: &str, since: DateTime<Utc>) -> StoreResult<i64> {
        let state = self.state.read().await;
        Ok(state
            .activity
            .iter()
            .filter(|a| a.action == action && a.created_at >= since)
            .count() as i64)
    }
}
