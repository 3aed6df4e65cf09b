use std::env;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{Duration, Utc};
use crm_service::config::DatabaseSettings;
use crm_service::db::{postgres, CustomerRepository, PgStorage, Storage, UserRepository};
use crm_service::models::invitation::SYSTEM_INVITER;
use crm_service::models::{normalize_email, CustomerFilter, CustomerStatus, NewCustomer, NewCustomerNote};
use crm_service::services::InvitationLedger;

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  crm-admin invite <email>       open an invitation (members need one to sign in)");
    eprintln!("  crm-admin deactivate <email>   lock a member out (live sessions included)");
    eprintln!("  crm-admin reactivate <email>   let a deactivated member back in");
    eprintln!("  crm-admin seed-demo            load sample customers into an empty database");
    eprintln!();
    eprintln!("DATABASE_URL must be set.");
    std::process::exit(1);
}

async fn open_storage() -> anyhow::Result<PgStorage> {
    let url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = postgres::connect(&DatabaseSettings {
        url,
        max_connections: 2,
        acquire_timeout: 10,
    })
    .await?;
    let storage = PgStorage::new(pool);
    storage.migrate().await?;
    Ok(storage)
}

/// Sign-in needs an unused invitation, so an existing member whose first
/// login consumed theirs gets a fresh one here.
async fn invite(storage: Arc<dyn Storage>, email: &str) -> anyhow::Result<()> {
    let ledger = InvitationLedger::new(storage.clone());
    if let Some(open) = ledger.find_active_invitation(email).await? {
        println!("Invitation already open for {} (id {})", open.email, open.id);
        return Ok(());
    }
    let invitation = ledger.create_invitation(email, SYSTEM_INVITER).await?;
    if storage.find_user_by_email(&invitation.email).await?.is_some() {
        println!(
            "Re-issued invitation for existing member {} (id {})",
            invitation.email, invitation.id
        );
    } else {
        println!("Invited {} (id {})", invitation.email, invitation.id);
    }
    Ok(())
}

async fn set_active(storage: &PgStorage, email: &str, active: bool) -> anyhow::Result<()> {
    let email = normalize_email(email);
    let user = storage
        .set_user_active(&email, active)
        .await
        .with_context(|| format!("No member with email {}", email))?;
    println!(
        "{} is now {}",
        user.email,
        if user.is_active { "active" } else { "deactivated" }
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn demo_customer(
    first_name: &str,
    last_name: &str,
    email: &str,
    phone: &str,
    company: &str,
    role: &str,
    status: CustomerStatus,
    region: &str,
    contact: Option<(i64, &str)>,
) -> NewCustomer {
    NewCustomer {
        first_name: first_name.into(),
        last_name: last_name.into(),
        email: email.into(),
        phone: Some(phone.into()),
        company: company.into(),
        role: Some(role.into()),
        status,
        region: region.into(),
        last_contact: contact.map(|(days, _)| Utc::now() - Duration::days(days)),
        last_contact_by: contact.map(|(_, by)| by.to_string()),
    }
}

async fn seed_demo(storage: &PgStorage) -> anyhow::Result<()> {
    if !storage
        .list_customers(&CustomerFilter::default())
        .await?
        .is_empty()
    {
        println!("Customers already present; nothing seeded");
        return Ok(());
    }

    let customers = [
        demo_customer(
            "Sarah", "Johnson", "sarah.johnson@techcorp.com", "+1-555-0123",
            "TechCorp Solutions", "CTO", CustomerStatus::Active, "north-america",
            Some((2, "Alex Chen")),
        ),
        demo_customer(
            "Marcus", "Rodriguez", "m.rodriguez@globalfinance.com", "+1-555-0234",
            "Global Finance Inc", "VP Engineering", CustomerStatus::Prospect, "north-america",
            None,
        ),
        demo_customer(
            "Emma", "Thompson", "emma.thompson@eurotech.eu", "+44-20-7946-0958",
            "EuroTech Limited", "Head of Operations", CustomerStatus::Active, "europe",
            Some((7, "Sarah Chen")),
        ),
        demo_customer(
            "Chen", "Wei", "chen.wei@asiapacific.com", "+86-138-0013-8000",
            "Asia Pacific Ventures", "Director", CustomerStatus::Inactive, "asia-pacific",
            Some((45, "Marcus Brown")),
        ),
    ];

    let mut inserted = Vec::new();
    for customer in customers {
        inserted.push(storage.insert_customer(customer).await?);
    }

    let notes = [
        (0, "Had a great call discussing their Q2 expansion plans.", "Alex Chen"),
        (0, "Follow-up meeting scheduled for next week.", "Sarah Chen"),
        (2, "Evaluating multiple vendors; highlight European data centers.", "Marcus Brown"),
    ];
    for (idx, content, author) in notes {
        storage
            .insert_note(NewCustomerNote {
                customer_id: inserted[idx].id,
                content: content.into(),
                author_name: author.into(),
            })
            .await?;
    }

    println!("Seeded {} customers and {} notes", inserted.len(), notes.len());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if cfg!(debug_assertions) {
        dotenvy::dotenv().ok();
    }

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage();
    }

    match (args[1].as_str(), args.get(2)) {
        ("invite", Some(email)) => {
            let storage = open_storage().await?;
            invite(Arc::new(storage), email).await?;
        }
        ("deactivate", Some(email)) => set_active(&open_storage().await?, email, false).await?,
        ("reactivate", Some(email)) => set_active(&open_storage().await?, email, true).await?,
        ("seed-demo", None) => seed_demo(&open_storage().await?).await?,
        (cmd, _) if ["invite", "deactivate", "reactivate", "seed-demo"].contains(&cmd) => {
            bail!("wrong number of arguments for {}", cmd)
        }
        _ => usage(),
    }

    Ok(())
}
