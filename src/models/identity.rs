// src/models/identity.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ExamError;

/// Participant identity captured during SETUP.
/// Both fields must be non-blank before the session may start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[validate(custom(function = validate_not_blank))]
    pub name: String,

    /// Student number (NIM).
    #[validate(custom(function = validate_not_blank))]
    pub nim: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, nim: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nim: nim.into(),
        }
    }

    /// Validates the identity, mapping validator output onto the
    /// session error taxonomy.
    pub fn ensure_complete(&self) -> Result<(), ExamError> {
        self.validate()
            .map_err(|e| ExamError::Validation(e.to_string()))
    }
}

fn validate_not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("field_cannot_be_blank"));
    }
    Ok(())
}
