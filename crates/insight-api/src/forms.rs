//! Parsing and validation of the dashboard and comment forms.
//!
//! Everything is validated before any write happens, so a rejected
//! submission leaves no partial state behind.

use std::collections::{BTreeMap, HashMap};

use axum::extract::Multipart;

use insight_db::queries::DashboardChanges;
use insight_types::models::{AxisRole, Visibility};

use crate::error::{ApiError, FieldErrors};

const MAX_TEXT_LEN: usize = 255;
const FILE_FIELD: &str = "file_path";
const CLEAR_FIELD: &str = "file_path-clear";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Create or update the chart together with dataset and metadata.
    Chart,
    /// Update dataset, metadata and axis selections.
    Data,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Keep,
    Replace(Vec<u8>),
    Clear,
}

/// Multipart body of `POST /dashboard/{id}` before validation.
#[derive(Debug, Default)]
pub struct RawSubmission {
    fields: HashMap<String, String>,
    file_name: Option<String>,
    file: Option<Vec<u8>>,
}

#[derive(Debug)]
pub struct DashboardSubmission {
    pub action: Action,
    pub changes: DashboardChanges,
    pub chart_type: Option<String>,
    pub file: FileChange,
    /// Column letters per axis; only non-empty fields are present.
    pub axes: BTreeMap<AxisRole, String>,
}

impl RawSubmission {
    pub async fn read(mut multipart: Multipart, max_bytes: usize) -> Result<Self, ApiError> {
        let mut raw = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Malformed form data: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == FILE_FIELD {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
                if bytes.len() > max_bytes {
                    return Err(ApiError::PayloadTooLarge(max_bytes));
                }
                // An empty file input means "no new file".
                if !bytes.is_empty() {
                    raw.file_name = file_name;
                    raw.file = Some(bytes.to_vec());
                }
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read field {}: {}", name, e)))?;
                raw.fields.insert(name, text);
            }
        }

        Ok(raw)
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Validates the submission against the known chart type names.
    pub fn validate(self, chart_types: &[String]) -> Result<DashboardSubmission, ApiError> {
        let mut errors = FieldErrors::new();

        let clear = self.fields.contains_key(CLEAR_FIELD);
        let action = match self.text("action").map(str::trim) {
            Some("chart") => Some(Action::Chart),
            Some("data") => Some(Action::Data),
            None | Some("") if clear => Some(Action::Data),
            _ => {
                errors.insert("action", "Unknown action.".into());
                None
            }
        };

        let name = match self.text("name").map(str::trim) {
            None => None,
            Some("") => {
                errors.insert("name", "This field is required.".into());
                None
            }
            Some(n) if n.chars().count() > MAX_TEXT_LEN => {
                errors.insert("name", too_long());
                None
            }
            Some(n) => Some(n.to_string()),
        };

        let description = match self.text("description") {
            Some(d) if d.chars().count() > MAX_TEXT_LEN => {
                errors.insert("description", too_long());
                None
            }
            other => other.map(|d| d.trim().to_string()),
        };

        let is_private = match self.text("status").map(str::trim) {
            None | Some("") => None,
            Some(s) => match Visibility::from_form(s) {
                Some(v) => Some(v.is_private()),
                None => {
                    errors.insert("status", "Select a valid choice.".into());
                    None
                }
            },
        };

        let chart_type = self
            .text("chart_type")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if action == Some(Action::Chart) {
            match &chart_type {
                None => {
                    errors.insert("chart_type", "This field is required.".into());
                }
                Some(t) if !chart_types.iter().any(|known| known == t) => {
                    errors.insert("chart_type", "Select a valid choice.".into());
                }
                Some(_) => {}
            }
        }

        let file = match (self.file, clear) {
            (Some(_), true) => {
                errors.insert(
                    FILE_FIELD,
                    "Please either submit a file or check the clear checkbox, not both.".into(),
                );
                FileChange::Keep
            }
            (Some(bytes), false) => {
                let is_csv = self
                    .file_name
                    .as_deref()
                    .is_none_or(|n| n.to_ascii_lowercase().ends_with(".csv"));
                if !is_csv {
                    errors.insert(FILE_FIELD, "Upload a .csv file.".into());
                }
                FileChange::Replace(bytes)
            }
            (None, true) => FileChange::Clear,
            (None, false) => FileChange::Keep,
        };

        let axes = AxisRole::ALL
            .into_iter()
            .filter_map(|role| {
                let letter = self.fields.get(role.form_field())?.trim();
                (!letter.is_empty()).then(|| (role, letter.to_string()))
            })
            .collect();

        match action {
            Some(action) if errors.is_empty() => Ok(DashboardSubmission {
                action,
                changes: DashboardChanges {
                    name,
                    description,
                    is_private,
                },
                chart_type,
                file,
                axes,
            }),
            _ => Err(ApiError::Validation(errors)),
        }
    }
}

/// Validates a comment body.
pub fn validate_comment(text: &str) -> Result<String, ApiError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ApiError::field("comment", "This field is required."));
    }
    if text.chars().count() > MAX_TEXT_LEN {
        return Err(ApiError::field("comment", too_long()));
    }
    Ok(text.to_string())
}

fn too_long() -> String {
    format!("Ensure this value has at most {} characters.", MAX_TEXT_LEN)
}

#[cfg(test)]
impl RawSubmission {
    fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }

    fn with_file(mut self, file_name: &str, bytes: &[u8]) -> Self {
        self.file_name = Some(file_name.to_string());
        self.file = Some(bytes.to_vec());
        self
    }
}
