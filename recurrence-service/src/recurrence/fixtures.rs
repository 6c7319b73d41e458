//! Row builders shared by the engine's unit tests.

use crate::models::{Invoice, LineItem};
use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn template(is_recurring: &str) -> Invoice {
    let created = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
    Invoice {
        invoice_id: Uuid::new_v4(),
        invoice_number: "F-2024-001".to_string(),
        client_id: Some(Uuid::new_v4()),
        client_name: "Boulangerie Martin".to_string(),
        status: "brouillon".to_string(),
        issue_date: date(2024, 1, 15),
        due_date: date(2024, 2, 14),
        subtotal: Decimal::new(100000, 2),
        tax_total: Decimal::new(20000, 2),
        total: Decimal::new(120000, 2),
        notes: Some("Forfait mensuel".to_string()),
        is_recurring: is_recurring.to_string(),
        recurrence_day: Some(15),
        next_generation_date: Some(date(2024, 2, 15)),
        occurrences_count: 0,
        max_occurrences: None,
        end_date: None,
        auto_send: false,
        parent_invoice_id: None,
        created_utc: created,
        updated_utc: created,
    }
}

pub fn line_item(invoice_id: Uuid, description: &str, quantity: i64, unit_cents: i64) -> LineItem {
    let quantity = Decimal::from(quantity);
    let unit_price = Decimal::new(unit_cents, 2);
    LineItem {
        line_item_id: Uuid::new_v4(),
        invoice_id,
        description: description.to_string(),
        quantity,
        unit_price,
        total: quantity * unit_price,
        sort_order: 0,
        created_utc: Utc::now(),
    }
}
