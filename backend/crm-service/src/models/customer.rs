use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    #[default]
    Prospect,
    Active,
    Inactive,
}

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Prospect => "prospect",
            CustomerStatus::Active => "active",
            CustomerStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prospect" => Ok(CustomerStatus::Prospect),
            "active" => Ok(CustomerStatus::Active),
            "inactive" => Ok(CustomerStatus::Inactive),
            other => Err(format!("unknown customer status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: String,
    pub role: Option<String>,
    pub status: CustomerStatus,
    pub region: String,
    pub last_contact: Option<DateTime<Utc>>,
    pub last_contact_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Case-insensitive substring match over name, email and company.
    /// `needle` must already be lower-cased.
    pub fn matches_search(&self, needle: &str) -> bool {
        [&self.first_name, &self.last_name, &self.email, &self.company]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be empty".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    #[validate(custom(function = "not_blank"))]
    pub first_name: String,
    #[validate(custom(function = "not_blank"))]
    pub last_name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub phone: Option<String>,
    #[validate(custom(function = "not_blank"))]
    pub company: String,
    pub role: Option<String>,
    #[serde(default)]
    pub status: CustomerStatus,
    #[validate(custom(function = "not_blank"))]
    pub region: String,
    pub last_contact: Option<DateTime<Utc>>,
    pub last_contact_by: Option<String>,
}

impl CreateCustomerRequest {
    /// Trim and lower-case the email so validation sees the stored form.
    pub fn with_normalized_email(mut self) -> Self {
        self.email = super::normalize_email(&self.email);
        self
    }
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerRequest {
    #[validate(custom(function = "not_blank"))]
    pub first_name: Option<String>,
    #[validate(custom(function = "not_blank"))]
    pub last_name: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    #[validate(custom(function = "not_blank"))]
    pub company: Option<String>,
    pub role: Option<String>,
    pub status: Option<CustomerStatus>,
    #[validate(custom(function = "not_blank"))]
    pub region: Option<String>,
    pub last_contact: Option<DateTime<Utc>>,
    pub last_contact_by: Option<String>,
}

impl UpdateCustomerRequest {
    pub fn with_normalized_email(mut self) -> Self {
        self.email = self.email.as_deref().map(super::normalize_email);
        self
    }
}

/// Validated customer ready for insertion
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: String,
    pub role: Option<String>,
    pub status: CustomerStatus,
    pub region: String,
    pub last_contact: Option<DateTime<Utc>>,
    pub last_contact_by: Option<String>,
}

impl From<CreateCustomerRequest> for NewCustomer {
    fn from(req: CreateCustomerRequest) -> Self {
        Self {
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            email: super::normalize_email(&req.email),
            phone: req.phone,
            company: req.company.trim().to_string(),
            role: req.role,
            status: req.status,
            region: req.region.trim().to_string(),
            last_contact: req.last_contact,
            last_contact_by: req.last_contact_by,
        }
    }
}

/// Validated partial update handed to storage
#[derive(Debug, Clone, Default)]
pub struct CustomerPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub status: Option<CustomerStatus>,
    pub region: Option<String>,
    pub last_contact: Option<DateTime<Utc>>,
    pub last_contact_by: Option<String>,
}

impl From<UpdateCustomerRequest> for CustomerPatch {
    fn from(req: UpdateCustomerRequest) -> Self {
        let trimmed = |v: Option<String>| v.map(|s| s.trim().to_string());
        Self {
            first_name: trimmed(req.first_name),
            last_name: trimmed(req.last_name),
            email: req.email.as_deref().map(super::normalize_email),
            phone: req.phone,
            company: trimmed(req.company),
            role: req.role,
            status: req.status,
            region: trimmed(req.region),
            last_contact: req.last_contact,
            last_contact_by: req.last_contact_by,
        }
    }
}

impl CustomerPatch {
    pub fn apply(self, customer: &mut Customer, now: DateTime<Utc>) {
        if let Some(v) = self.first_name {
            customer.first_name = v;
        }
        if let Some(v) = self.last_name {
            customer.last_name = v;
        }
        if let Some(v) = self.email {
            customer.email = v;
        }
        if let Some(v) = self.phone {
            customer.phone = Some(v);
        }
        if let Some(v) = self.company {
            customer.company = v;
        }
        if let Some(v) = self.role {
            customer.role = Some(v);
        }
        if let Some(v) = self.status {
            customer.status = v;
        }
        if let Some(v) = self.region {
            customer.region = v;
        }
        if let Some(v) = self.last_contact {
            customer.last_contact = Some(v);
        }
        if let Some(v) = self.last_contact_by {
            customer.last_contact_by = Some(v);
        }
        customer.updated_at = now;
    }
}

/// List filter; `"all"` or an empty value disables a criterion
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerFilter {
    pub status: Option<String>,
    pub region: Option<String>,
    pub search: Option<String>,
}

impl CustomerFilter {
    fn active(value: &Option<String>) -> Option<&str> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty() && *v != "all")
    }

    pub fn status(&self) -> Option<&str> {
        Self::active(&self.status)
    }

    pub fn region(&self) -> Option<&str> {
        Self::active(&self.region)
    }

    /// Lower-cased search needle
    pub fn search(&self) -> Option<String> {
        Self::active(&self.search).map(str::to_lowercase)
    }

    pub fn matches(&self, customer: &Customer) -> bool {
        if let Some(status) = self.status() {
            if customer.status.as_str() != status {
                return false;
            }
        }
        if let Some(region) = self.region() {
            if customer.region != region {
                return false;
            }
        }
        match self.search() {
            Some(needle) => customer.matches_search(&needle),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CustomerNote {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub content: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateNoteRequest {
    #[validate(custom(function = "not_blank"))]
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct NewCustomerNote {
    pub customer_id: Uuid,
    pub content: String,
    pub author_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerAnalytics {
    pub total_customers: i64,
    pub active_customers: i64,
    pub total_notes: i64,
    pub recent_exports: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Customer {
        let now = Utc::now();
        Customer {
            id: Uuid::new_v4(),
            first_name: "Sarah".into(),
            last_name: "Johnson".into(),
            email: "sarah.johnson@techcorp.com".into(),
            phone: None,
            company: "TechCorp Solutions".into(),
            role: Some("CTO".into()),
            status: CustomerStatus::Active,
            region: "north-america".into(),
            last_contact: None,
            last_contact_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            CustomerStatus::Prospect,
            CustomerStatus::Active,
            CustomerStatus::Inactive,
        ] {
            assert_eq!(status.as_str().parse::<CustomerStatus>().unwrap(), status);
        }
        assert!("archived".parse::<CustomerStatus>().is_err());
    }

    #[test]
    fn test_filter_all_means_no_filter() {
        let filter = CustomerFilter {
            status: Some("all".into()),
            region: Some("all".into()),
            search: Some("  ".into()),
        };
        assert!(filter.matches(&sample()));
    }

    #[test]
    fn test_filter_by_status_region_and_search() {
        let customer = sample();

        let by_status = CustomerFilter {
            status: Some("prospect".into()),
            ..Default::default()
        };
        assert!(!by_status.matches(&customer));

        let by_region = CustomerFilter {
            region: Some("north-america".into()),
            ..Default::default()
        };
        assert!(by_region.matches(&customer));

        let by_search = CustomerFilter {
            search: Some("TECHCORP".into()),
            ..Default::default()
        };
        assert!(by_search.matches(&customer));
    }

    #[test]
    fn test_create_request_rejects_blank_fields() {
        let req: CreateCustomerRequest = serde_json::from_value(serde_json::json!({
            "firstName": " ",
            "lastName": "Wei",
            "email": "bad",
            "company": "Asia Pacific Ventures",
            "region": "asia-pacific"
        }))
        .unwrap();

        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("first_name"));
        assert!(fields.contains_key("email"));
        assert!(!fields.contains_key("company"));
        assert_eq!(req.status, CustomerStatus::Prospect);
    }

    #[test]
    fn test_patch_leaves_absent_fields_unchanged() {
        let mut customer = sample();
        let before = customer.clone();
        let later = before.updated_at + chrono::Duration::seconds(5);

        CustomerPatch {
            status: Some(CustomerStatus::Inactive),
            ..Default::default()
        }
        .apply(&mut customer, later);

        assert_eq!(customer.status, CustomerStatus::Inactive);
        assert_eq!(customer.first_name, before.first_name);
        assert_eq!(customer.email, before.email);
        assert_eq!(customer.updated_at, later);
    }
}
