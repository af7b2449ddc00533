use std::cmp::Ordering;

use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street_address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Employment {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub key_skill: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CreditCard {
    #[serde(default)]
    pub cc_number: String,
}

/// One generated user as returned by the upstream api.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Record {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub employment: Option<Employment>,
    #[serde(default)]
    pub credit_card: Option<CreditCard>,
}

impl Record {
    /// Labelled fields shown in the detail dialog. Missing nested objects become empty strings.
    pub fn detail_fields(&self) -> Vec<(&'static str, String)> {
        let address = self
            .address
            .as_ref()
            .map(|a| {
                format!(
                    "{}, {}, {}, {}, {}",
                    a.street_address, a.city, a.state, a.zip_code, a.country
                )
            })
            .unwrap_or_default();
        let employment = self
            .employment
            .as_ref()
            .map(|e| format!("{} ({})", e.title, e.key_skill))
            .unwrap_or_default();
        let credit_card = self
            .credit_card
            .as_ref()
            .map(|c| c.cc_number.clone())
            .unwrap_or_default();

        vec![
            ("Full Name", format!("{} {}", self.first_name, self.last_name)),
            ("Email", self.email.clone()),
            ("Username", self.username.clone()),
            ("Phone Number", self.phone_number.clone()),
            ("Date of Birth", self.date_of_birth.clone()),
            ("Address", address),
            ("Employment", employment),
            ("Credit Card Number", credit_card),
        ]
    }
}

/// The columns that can be shown, sorted on and filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    FirstName,
    LastName,
    Email,
}

pub const TRACKED_COLUMNS: [Column; 4] = [
    Column::Id,
    Column::FirstName,
    Column::LastName,
    Column::Email,
];

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::FirstName => "first_name",
            Column::LastName => "last_name",
            Column::Email => "email",
        }
    }

    pub fn idx(&self) -> usize {
        match self {
            Column::Id => 0,
            Column::FirstName => 1,
            Column::LastName => 2,
            Column::Email => 3,
        }
    }

    pub fn from_idx(idx: usize) -> Option<Column> {
        TRACKED_COLUMNS.get(idx).copied()
    }

    pub fn value(&self, record: &Record) -> String {
        match self {
            Column::Id => record.id.to_string(),
            Column::FirstName => record.first_name.clone(),
            Column::LastName => record.last_name.clone(),
            Column::Email => record.email.clone(),
        }
    }

    /// Native ordering of the field: numeric for `id`, lexicographic for the rest.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        match self {
            Column::Id => a.id.cmp(&b.id),
            Column::FirstName => a.first_name.cmp(&b.first_name),
            Column::LastName => a.last_name.cmp(&b.last_name),
            Column::Email => a.email.cmp(&b.email),
        }
    }
}
