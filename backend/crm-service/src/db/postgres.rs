//! PostgreSQL storage backed by sqlx

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{
    ActivityRepository, CustomerRepository, InvitationRepository, SessionRepository, StoreError,
    StoreResult, UserCreation, UserRepository,
};
use crate::config::DatabaseSettings;
use crate::models::{
    Customer, CustomerFilter, CustomerNote, CustomerPatch, CustomerStatus, Invitation,
    NewActivity, NewCustomer, NewCustomerNote, NewUser, Session, TeamActivity, User,
};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const INVITATION_COLUMNS: &str = "id, email, invited_by, is_used, created_at, used_at";
const USER_COLUMNS: &str =
    "id, email, name, external_id, profile_picture, is_active, created_at, updated_at";
const CUSTOMER_COLUMNS: &str = "id, first_name, last_name, email, phone, company, role, status, \
     region, last_contact, last_contact_by, created_at, updated_at";
const ACTIVITY_COLUMNS: &str = "id, action, user_name, customer_name, customer_id, created_at";

pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout))
        .connect(&settings.url)
        .await?;
    info!(
        max_connections = settings.max_connections,
        "Connected to PostgreSQL"
    );
    Ok(pool)
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    company: String,
    role: Option<String>,
    status: String,
    region: String,
    last_contact: Option<DateTime<Utc>>,
    last_contact_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = StoreError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let status: CustomerStatus = row.status.parse().map_err(StoreError::Database)?;
        Ok(Customer {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            company: row.company,
            role: row.role,
            status,
            region: row.region,
            last_contact: row.last_contact,
            last_contact_by: row.last_contact_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl InvitationRepository for PgStorage {
    async fn insert_invitation(&self, email: &str, invited_by: &str) -> StoreResult<Invitation> {
        // Partial unique index on unused invitations turns duplicates into 23505.
        let invitation = sqlx::query_as::<_, Invitation>(&format!(
            "INSERT INTO invitations (email, invited_by) VALUES ($1, $2) RETURNING {}",
            INVITATION_COLUMNS
        ))
        .bind(email)
        .bind(invited_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(invitation)
    }

    async fn find_unused_invitation(&self, email: &str) -> StoreResult<Option<Invitation>> {
        let invitation = sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {} FROM invitations WHERE email = $1 AND NOT is_used \
             ORDER BY created_at DESC LIMIT 1",
            INVITATION_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(invitation)
    }

    async fn consume_invitation(&self, id: Uuid) -> StoreResult<Invitation> {
        let invitation = sqlx::query_as::<_, Invitation>(&format!(
            "UPDATE invitations SET is_used = TRUE, used_at = NOW() \
             WHERE id = $1 AND NOT is_used RETURNING {}",
            INVITATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        invitation.ok_or(StoreError::NotFound)
    }

    async fn list_invitations(&self) -> StoreResult<Vec<Invitation>> {
        let invitations = sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {} FROM invitations ORDER BY created_at DESC",
            INVITATION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(invitations)
    }
}

#[async_trait]
impl UserRepository for PgStorage {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user_with_invitation(
        &self,
        new_user: NewUser,
        invitation_id: Uuid,
    ) -> StoreResult<UserCreation> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, name, external_id, profile_picture) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (email) DO NOTHING RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.external_id)
        .bind(&new_user.profile_picture)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(user) = user else {
            tx.rollback().await?;
            return Ok(UserCreation::EmailTaken);
        };

        let consumed = sqlx::query(
            "UPDATE invitations SET is_used = TRUE, used_at = NOW() \
             WHERE id = $1 AND NOT is_used",
        )
        .bind(invitation_id)
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound);
        }

        tx.commit().await?;
        Ok(UserCreation::Created(user))
    }

    async fn set_user_active(&self, email: &str, active: bool) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_active = $2, updated_at = NOW() WHERE email = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(email)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?;
        user.ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl SessionRepository for PgStorage {
    async fn insert_session(&self, session: Session) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&session.token_hash)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT token_hash, user_id, created_at, expires_at FROM sessions WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn delete_session(&self, token_hash: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CustomerRepository for PgStorage {
    async fn list_customers(&self, filter: &CustomerFilter) -> StoreResult<Vec<Customer>> {
        let rows = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM customers \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::text IS NULL OR region = $2) \
               AND ($3::text IS NULL \
                    OR strpos(lower(first_name), $3) > 0 \
                    OR strpos(lower(last_name), $3) > 0 \
                    OR strpos(lower(email), $3) > 0 \
                    OR strpos(lower(company), $3) > 0) \
             ORDER BY updated_at DESC",
            CUSTOMER_COLUMNS
        ))
        .bind(filter.status())
        .bind(filter.region())
        .bind(filter.search())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Customer::try_from).collect()
    }

    async fn get_customer(&self, id: Uuid) -> StoreResult<Option<Customer>> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {} FROM customers WHERE id = $1",
            CUSTOMER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Customer::try_from).transpose()
    }

    async fn insert_customer(&self, input: NewCustomer) -> StoreResult<Customer> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "INSERT INTO customers (first_name, last_name, email, phone, company, role, status, \
             region, last_contact, last_contact_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            CUSTOMER_COLUMNS
        ))
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.company)
        .bind(&input.role)
        .bind(input.status.as_str())
        .bind(&input.region)
        .bind(input.last_contact)
        .bind(&input.last_contact_by)
        .fetch_one(&self.pool)
        .await?;
        Customer::try_from(row)
    }

    async fn update_customer(&self, id: Uuid, patch: CustomerPatch) -> StoreResult<Customer> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "UPDATE customers SET \
               first_name = COALESCE($2, first_name), \
               last_name = COALESCE($3, last_name), \
               email = COALESCE($4, email), \
               phone = COALESCE($5, phone), \
               company = COALESCE($6, company), \
               role = COALESCE($7, role), \
               status = COALESCE($8, status), \
               region = COALESCE($9, region), \
               last_contact = COALESCE($10, last_contact), \
               last_contact_by = COALESCE($11, last_contact_by), \
               updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            CUSTOMER_COLUMNS
        ))
        .bind(id)
        .bind(&patch.first_name)
        .bind(&patch.last_name)
        .bind(&patch.email)
        .bind(&patch.phone)
        .bind(&patch.company)
        .bind(&patch.role)
        .bind(patch.status.map(|s| s.as_str()))
        .bind(&patch.region)
        .bind(patch.last_contact)
        .bind(&patch.last_contact_by)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(StoreError::NotFound).and_then(Customer::try_from)
    }

    async fn delete_customer(&self, id: Uuid) -> StoreResult<Customer> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM customer_notes WHERE customer_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "DELETE FROM customers WHERE id = $1 RETURNING {}",
            CUSTOMER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(StoreError::NotFound);
        };

        tx.commit().await?;
        Customer::try_from(row)
    }

    async fn list_notes(&self, customer_id: Uuid) -> StoreResult<Vec<CustomerNote>> {
        let notes = sqlx::query_as::<_, CustomerNote>(
            "SELECT id, customer_id, content, author_name, created_at FROM customer_notes \
             WHERE customer_id = $1 ORDER BY created_at DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(notes)
    }

    async fn insert_note(&self, input: NewCustomerNote) -> StoreResult<CustomerNote> {
        let note = sqlx::query_as::<_, CustomerNote>(
            "INSERT INTO customer_notes (customer_id, content, author_name) \
             SELECT id, $2, $3 FROM customers WHERE id = $1 \
             RETURNING id, customer_id, content, author_name, created_at",
        )
        .bind(input.customer_id)
        .bind(&input.content)
        .bind(&input.author_name)
        .fetch_optional(&self.pool)
        .await?;
        note.ok_or(StoreError::NotFound)
    }

    async fn count_customers(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_customers_with_status(&self, status: &str) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_notes(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customer_notes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl ActivityRepository for PgStorage {
    async fn insert_activity(&self, entry: NewActivity) -> StoreResult<TeamActivity> {
        let activity = sqlx::query_as::<_, TeamActivity>(&format!(
            "INSERT INTO team_activity (action, user_name, customer_name, customer_id) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            ACTIVITY_COLUMNS
        ))
        .bind(&entry.action)
        .bind(&entry.user_name)
        .bind(&entry.customer_name)
        .bind(entry.customer_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(activity)
    }

    async fn recent_activity(&self, limit: i64) -> StoreResult<Vec<TeamActivity>> {
        let entries = sqlx::query_as::<_, TeamActivity>(&format!(
            "SELECT {} FROM team_activity ORDER BY created_at DESC, seq DESC LIMIT $1",
            ACTIVITY_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn count_activity_since(&self, action: &str, since: DateTime<Utc>) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM team_activity WHERE action = $1 AND created_at >= $2",
        )
        .bind(action)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
