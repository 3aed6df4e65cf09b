//! Customer and note operations
//!
//! Every mutation follows the same pipeline: storage write, best-effort
//! activity record, best-effort broadcast, then return. Only the storage
//! write can fail the operation.
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::activity::{
    ACTION_ADDED_NOTE, ACTION_CREATED_CUSTOMER, ACTION_DELETED_CUSTOMER, ACTION_EXPORTED,
    ACTION_UPDATED_CUSTOMER,
};
use super::export::render_customers_csv;
use super::ActivityRecorder;
use crate::db::{StoreError, Storage};
use crate::error::{AppError, Result};
use crate::models::{
    CreateCustomerRequest, CreateNoteRequest, Customer, CustomerAnalytics, CustomerFilter,
    CustomerNote, CustomerStatus, NewCustomerNote, UpdateCustomerRequest, User,
};
use crate::websocket::{ChangeBroadcaster, ChangeEvent};

const RECENT_EXPORT_WINDOW_DAYS: i64 = 30;

fn customer_store_error(err: StoreError) -> AppError {
    match err {
        StoreError::NotFound => AppError::NotFound("customer"),
        StoreError::Conflict(_) => {
            AppError::Conflict("a customer with this email already exists".to_string())
        }
        other => other.into(),
    }
}

#[derive(Clone)]
pub struct CustomerService {
    storage: Arc<dyn Storage>,
    activity: ActivityRecorder,
    broadcaster: ChangeBroadcaster,
}

impl CustomerService {
    pub fn new(
        storage: Arc<dyn Storage>,
        activity: ActivityRecorder,
        broadcaster: ChangeBroadcaster,
    ) -> Self {
        Self {
            storage,
            activity,
            broadcaster,
        }
    }

    pub async fn list(&self, filter: &CustomerFilter) -> Result<Vec<Customer>> {
        Ok(self.storage.list_customers(filter).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Customer> {
        self.storage
            .get_customer(id)
            .await?
            .ok_or(AppError::NotFound("customer"))
    }

    pub async fn create(&self, actor: &User, input: CreateCustomerRequest) -> Result<Customer> {
        let input = input.with_normalized_email();
        input.validate()?;
        let customer = self
            .storage
            .insert_customer(input.into())
            .await
            .map_err(customer_store_error)?;

        info!(customer_id = %customer.id, actor_id = %actor.id, "Customer created");
        self.activity
            .record_best_effort(
                ACTION_CREATED_CUSTOMER,
                &actor.name,
                Some(&customer.full_name()),
                Some(customer.id),
            )
            .await;
        self.broadcaster
            .publish(ChangeEvent::CustomerCreated(customer.clone()))
            .await;
        Ok(customer)
    }

    pub async fn update(
        &self,
        actor: &User,
        id: Uuid,
        patch: UpdateCustomerRequest,
    ) -> Result<Customer> {
        let patch = patch.with_normalized_email();
        patch.validate()?;
        let customer = self
            .storage
            .update_customer(id, patch.into())
            .await
            .map_err(customer_store_error)?;

        info!(customer_id = %customer.id, actor_id = %actor.id, "Customer updated");
        self.activity
            .record_best_effort(
                ACTION_UPDATED_CUSTOMER,
                &actor.name,
                Some(&customer.full_name()),
                Some(customer.id),
            )
            .await;
        self.broadcaster
            .publish(ChangeEvent::CustomerUpdated(customer.clone()))
            .await;
        Ok(customer)
    }

    /// Removes the customer together with its notes.
    pub async fn delete(&self, actor: &User, id: Uuid) -> Result<()> {
        let customer = self
            .storage
            .delete_customer(id)
            .await
            .map_err(customer_store_error)?;

        info!(customer_id = %customer.id, actor_id = %actor.id, "Customer deleted");
        self.activity
            .record_best_effort(
                ACTION_DELETED_CUSTOMER,
                &actor.name,
                Some(&customer.full_name()),
                None,
            )
            .await;
        self.broadcaster
            .publish(ChangeEvent::CustomerDeleted { id: customer.id })
            .await;
        Ok(())
    }

    pub async fn notes(&self, customer_id: Uuid) -> Result<Vec<CustomerNote>> {
        // Distinguish "no notes" from "no such customer".
        self.get(customer_id).await?;
        Ok(self.storage.list_notes(customer_id).await?)
    }

    pub async fn add_note(
        &self,
        actor: &User,
        customer_id: Uuid,
        input: CreateNoteRequest,
    ) -> Result<CustomerNote> {
        input.validate()?;
        let customer = self.get(customer_id).await?;

        let note = self
            .storage
            .insert_note(NewCustomerNote {
                customer_id,
                content: input.content.trim().to_string(),
                author_name: actor.name.clone(),
            })
            .await
            .map_err(customer_store_error)?;

        self.activity
            .record_best_effort(
                ACTION_ADDED_NOTE,
                &actor.name,
                Some(&customer.full_name()),
                Some(customer_id),
            )
            .await;
        self.broadcaster
            .publish(ChangeEvent::NoteCreated(note.clone()))
            .await;
        Ok(note)
    }

    pub async fn analytics(&self) -> Result<CustomerAnalytics> {
        let since = Utc::now() - Duration::days(RECENT_EXPORT_WINDOW_DAYS);
        Ok(CustomerAnalytics {
            total_customers: self.storage.count_customers().await?,
            active_customers: self
                .storage
                .count_customers_with_status(CustomerStatus::Active.as_str())
                .await?,
            total_notes: self.storage.count_notes().await?,
            recent_exports: self.activity.count_since(ACTION_EXPORTED, since).await?,
        })
    }

    /// Full snapshot as CSV; records one export activity entry.
    pub async fn export_csv(&self, actor: &User) -> Result<String> {
        let customers = self.storage.list_customers(&CustomerFilter::default()).await?;
        let csv = render_customers_csv(&customers);

        info!(actor_id = %actor.id, rows = customers.len(), "Customer data exported");
        self.activity
            .record_best_effort(ACTION_EXPORTED, &actor.name, None, None)
            .await;
        Ok(csv)
    }
}
