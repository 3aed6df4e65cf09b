//! CSV rendering for the customer export

use std::fmt::Write;

use chrono::SecondsFormat;

use crate::models::Customer;

pub const EXPORT_FILENAME: &str = "customers.csv";

const HEADER: &str = "First Name,Last Name,Email,Phone,Company,Role,Status,Region,Last Contact";

/// Wrap a field in double quotes, doubling embedded quotes.
fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Render customers in the fixed export column order. Rows end with `\n`.
pub fn render_customers_csv(customers: &[Customer]) -> String {
    let mut out = String::with_capacity(HEADER.len() + customers.len() * 128);
    out.push_str(HEADER);
    out.push('\n');

    for c in customers {
        let last_contact = c
            .last_contact
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default();
        let fields = [
            c.first_name.as_str(),
            c.last_name.as_str(),
            c.email.as_str(),
            c.phone.as_deref().unwrap_or(""),
            c.company.as_str(),
            c.role.as_deref().unwrap_or(""),
            c.status.as_str(),
            c.region.as_str(),
            last_contact.as_str(),
        ];
        let row: Vec<String> = fields.iter().map(|f| quote(f)).collect();
        // Writing to a String cannot fail.
        let _ = writeln!(out, "{}", row.join(","));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CustomerStatus;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn customer() -> Customer {
        let now = Utc::now();
        Customer {
            id: Uuid::new_v4(),
            first_name: "Marcus".into(),
            last_name: "Rodriguez".into(),
            email: "m.rodriguez@globalfinance.com".into(),
            phone: None,
            company: "Global \"Finance\", Inc".into(),
            role: Some("VP Engineering".into()),
            status: CustomerStatus::Prospect,
            region: "north-america".into(),
            last_contact: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()),
            last_contact_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_header_only_for_empty_list() {
        assert_eq!(render_customers_csv(&[]), format!("{}\n", HEADER));
    }

    #[test]
    fn test_row_quoting_and_optional_fields() {
        let csv = render_customers_csv(&[customer()]);
        let row = csv.lines().nth(1).unwrap();

        assert_eq!(
            row,
            "\"Marcus\",\"Rodriguez\",\"m.rodriguez@globalfinance.com\",\"\",\
             \"Global \"\"Finance\"\", Inc\",\"VP Engineering\",\"prospect\",\
             \"north-america\",\"2024-03-01T12:30:00Z\""
        );
    }
}
