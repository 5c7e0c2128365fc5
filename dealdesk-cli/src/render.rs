//! Terminal rendering for deals.

use chrono::NaiveDate;
use dealdesk_adapters_amocrm::{Deal, StatusColor};
use serde_json::{json, Value};

pub fn status_badge(color: StatusColor) -> &'static str {
    match color {
        StatusColor::Red => "🔴 red",
        StatusColor::Yellow => "🟡 yellow",
        StatusColor::Green => "🟢 green",
    }
}

/// The deals table: id, name, budget, contact, phone, status
pub fn deals_table(deals: &[Deal], today: NaiveDate) -> String {
    let mut out = format!(
        "{:<6} {:<20} {:>10}  {:<20} {:<16} {}\n",
        "ID", "Name", "Budget", "Contact", "Phone", "Status"
    );
    out.push_str(&"-".repeat(86));
    out.push('\n');

    for deal in deals {
        out.push_str(&format!(
            "{:<6} {:<20} {:>10}  {:<20} {:<16} {}\n",
            deal.id,
            truncate(&deal.name, 20),
            deal.budget,
            truncate(deal.contact_name(), 20),
            deal.contact_phone(),
            status_badge(deal.status(today)),
        ));
    }

    if deals.is_empty() {
        out.push_str("(no deals)\n");
    }
    out
}

/// Expanded view of a single deal
pub fn deal_details(deal: &Deal, today: NaiveDate) -> String {
    let mut out = format!("=== Deal {} ===\n", deal.id);
    out.push_str(&format!("Name: {}\n", deal.name));
    out.push_str(&format!("Budget: {}\n", deal.budget));
    out.push_str(&format!("Contact: {}\n", deal.contact_name()));
    out.push_str(&format!("Phone: {}\n", deal.contact_phone()));
    out.push_str(&format!("Status: {}\n", status_badge(deal.status(today))));
    for task in &deal.tasks {
        out.push_str(&format!(
            "Task: due {} ({})\n",
            task.due_date.format("%d.%m.%Y"),
            task.status
        ));
    }
    out
}

/// Shown in place of the details when a fetch failed
pub fn details_unavailable(deal_id: u64, reason: &dyn std::fmt::Display) -> String {
    format!("=== Deal {} ===\nDetails unavailable: {}\n", deal_id, reason)
}

/// Deals as JSON, each annotated with its status colour
pub fn deals_json(deals: &[Deal], today: NaiveDate) -> Value {
    Value::Array(
        deals
            .iter()
            .map(|deal| {
                json!({
                    "id": deal.id,
                    "name": deal.name,
                    "budget": deal.budget,
                    "contact": deal.contact_name(),
                    "phone": deal.contact_phone(),
                    "status": deal.status(today),
                })
            })
            .collect(),
    )
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
