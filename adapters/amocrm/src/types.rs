//! amoCRM deal model and the deal status indicator.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CrmError;

/// Placeholder rendered for missing contact fields
pub const NOT_AVAILABLE: &str = "N/A";

/// A deal ("lead" in amoCRM terms)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: u64,

    pub name: String,

    /// amoCRM calls this field `price`
    #[serde(default, alias = "price")]
    pub budget: u64,

    /// Linked contacts as returned by `with=contacts`
    #[serde(default)]
    pub contacts: Vec<ContactRef>,

    /// First linked contact, resolved by a follow-up request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,

    /// Tasks as returned by `with=tasks`
    #[serde(default)]
    pub tasks: Vec<DealTask>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRef {
    pub id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub id: u64,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealTask {
    /// Due date, `dd.mm.yyyy` on the wire
    #[serde(with = "due_date_format")]
    pub due_date: NaiveDate,

    pub status: String,
}

/// Traffic-light indicator shown next to each deal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    /// Overdue, or no task at all
    Red,
    /// Due in the future
    Yellow,
    /// Due today
    Green,
}

impl std::fmt::Display for StatusColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StatusColor::Red => "red",
            StatusColor::Yellow => "yellow",
            StatusColor::Green => "green",
        };
        f.write_str(name)
    }
}

impl Deal {
    /// Indicator for the deal's first task relative to `today`
    pub fn status(&self, today: NaiveDate) -> StatusColor {
        let Some(task) = self.tasks.first() else {
            return StatusColor::Red;
        };

        let days = (task.due_date - today).num_days();
        match days {
            0 => StatusColor::Green,
            d if d > 0 => StatusColor::Yellow,
            _ => StatusColor::Red,
        }
    }

    pub fn contact_name(&self) -> &str {
        self.contact
            .as_ref()
            .and_then(|c| c.name.as_deref())
            .filter(|s| !s.is_empty())
            .unwrap_or(NOT_AVAILABLE)
    }

    pub fn contact_phone(&self) -> &str {
        self.contact
            .as_ref()
            .and_then(|c| c.phone.as_deref())
            .filter(|s| !s.is_empty())
            .unwrap_or(NOT_AVAILABLE)
    }

    /// Id of the contact to resolve for the deals table
    pub fn primary_contact_id(&self) -> Option<u64> {
        self.contacts.first().map(|c| c.id)
    }
}

/// Decode a single lead
pub fn parse_deal(mut value: Value) -> Result<Deal, CrmError> {
    hoist_embedded_contacts(&mut value);
    Ok(serde_json::from_value(value)?)
}

/// Decode a deals listing: either a bare array or amoCRM's
/// `{"_embedded": {"leads": [...]}}` envelope
pub fn parse_deals(value: Value) -> Result<Vec<Deal>, CrmError> {
    match value {
        Value::Array(leads) => leads.into_iter().map(parse_deal).collect(),
        Value::Object(mut map) => {
            let leads = map
                .get_mut("_embedded")
                .and_then(|embedded| embedded.get_mut("leads"))
                .map(Value::take)
                .ok_or_else(|| {
                    <serde_json::Error as serde::de::Error>::custom(
                        "expected an array of deals or an _embedded.leads envelope",
                    )
                })?;
            match leads {
                Value::Array(leads) => leads.into_iter().map(parse_deal).collect(),
                other => Ok(serde_json::from_value(other)?),
            }
        }
        // amoCRM answers 204 with an empty body when there is nothing to list
        Value::Null => Ok(Vec::new()),
        other => Err(<serde_json::Error as serde::de::Error>::custom(format!(
            "unexpected deals payload: {}",
            other
        ))
        .into()),
    }
}

/// amoCRM nests a lead's contact refs under `_embedded.contacts`
fn hoist_embedded_contacts(lead: &mut Value) {
    let Some(lead) = lead.as_object_mut() else {
        return;
    };
    if lead.contains_key("contacts") {
        return;
    }
    let embedded = lead
        .get_mut("_embedded")
        .and_then(|embedded| embedded.get_mut("contacts"))
        .map(Value::take);
    if let Some(contacts) = embedded {
        lead.insert("contacts".to_string(), contacts);
    }
}

mod due_date_format {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%d.%m.%Y";

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}
