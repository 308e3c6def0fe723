//! CSV recipient ingestion.
//!
//! Each survey type's recipient export lands as one CSV file with a header
//! row. Column names drift between exports, so every logical field resolves
//! through an ordered alias list; the first non-empty match wins. A row
//! whose email cannot be resolved is excluded from dispatch without
//! counting as a failure.

use std::collections::HashMap;
use std::path::Path;

use crate::error::RosterError;

/// Ordered header aliases for the contact email. First non-empty wins.
pub const EMAIL_ALIASES: &[&str] = &[
    "Contact Email",
    "Email",
    "Contact E-mail",
    "Primary Contact Email",
];

/// Ordered header aliases for the property / display name.
pub const PROPERTY_ALIASES: &[&str] = &["Property Name", "Property", "Account Name", "Name"];

/// Ordered header aliases for the record-service record id.
pub const RECORD_ID_ALIASES: &[&str] = &["Record ID#", "Record ID", "recordId"];

/// Ordered header aliases for the account-manager email list.
pub const ACCOUNT_MANAGER_ALIASES: &[&str] = &[
    "Account Manager Email",
    "Account Manager Emails",
    "AM Email",
];

/// Ordered header aliases for the relationship-manager email list.
pub const RELATIONSHIP_MANAGER_ALIASES: &[&str] = &[
    "Relationship Manager Email",
    "Relationship Manager Emails",
    "RM Email",
];

/// Ordered header aliases for the district-manager email list.
pub const DISTRICT_MANAGER_ALIASES: &[&str] = &[
    "District Manager Email",
    "District Manager Emails",
    "DM Email",
];

/// One parsed CSV row. Headers are normalized (trimmed, lowercased) so
/// alias lookups ignore the export's capitalization.
#[derive(Debug, Clone, Default)]
pub struct RosterRow {
    columns: HashMap<String, String>,
}

impl RosterRow {
    /// Build a row from already-normalized header/value pairs.
    pub fn new(columns: HashMap<String, String>) -> Self {
        Self { columns }
    }

    /// Resolve a logical field through its alias list; the first alias
    /// present with a non-empty value wins.
    pub fn get(&self, aliases: &[&str]) -> Option<&str> {
        aliases.iter().find_map(|alias| {
            self.columns
                .get(&alias.to_ascii_lowercase())
                .map(String::as_str)
                .filter(|v| !v.is_empty())
        })
    }
}

/// A recipient resolved from one roster row.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub email: String,
    pub property: String,
    pub record_id: Option<String>,
    /// Manager email lists, comma-separated as exported.
    pub account_managers: Option<String>,
    pub relationship_managers: Option<String>,
    pub district_managers: Option<String>,
}

impl Recipient {
    /// Returns `None` when the row has no resolvable email; such rows are
    /// skipped, not failed.
    pub fn from_row(row: &RosterRow) -> Option<Recipient> {
        let email = row.get(EMAIL_ALIASES)?.to_string();
        Some(Recipient {
            email,
            property: row.get(PROPERTY_ALIASES).unwrap_or_default().to_string(),
            record_id: row.get(RECORD_ID_ALIASES).map(str::to_string),
            account_managers: row.get(ACCOUNT_MANAGER_ALIASES).map(str::to_string),
            relationship_managers: row.get(RELATIONSHIP_MANAGER_ALIASES).map(str::to_string),
            district_managers: row.get(DISTRICT_MANAGER_ALIASES).map(str::to_string),
        })
    }
}

/// Load all rows from a CSV file. A missing file is an empty roster, not
/// an error. Tolerates a UTF-8 byte-order marker and whitespace around
/// headers and values; blank lines are dropped.
pub fn load_rows(path: &Path) -> Result<Vec<RosterRow>, RosterError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(path).map_err(|source| RosterError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let content = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| RosterError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| RosterError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let columns = headers
            .iter()
            .cloned()
            .zip(record.iter().map(|field| field.trim().to_string()))
            .collect();
        rows.push(RosterRow::new(columns));
    }
    Ok(rows)
}
