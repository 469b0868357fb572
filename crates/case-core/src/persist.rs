//! JSON persistence of the current document state.
//!
//! Only the entity state is saved; undo history is session-local and never
//! written out.

use crate::error::DocumentError;
use crate::model::CaseDocument;

impl CaseDocument {
    /// Serialize the document as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a document and check that its activation points at real entities.
    ///
    /// # Errors
    /// Malformed JSON, or an `activeStep` / `activeCategory` the document
    /// does not contain.
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        let doc: CaseDocument = serde_json::from_str(text)?;

        if let Some(step) = doc.active_step
            && doc.step(step).is_none()
        {
            return Err(DocumentError::DanglingActivation(format!(
                "active step {step} not found"
            )));
        }
        if let Some(category) = doc.active_category
            && doc.category(category).is_none()
        {
            return Err(DocumentError::DanglingActivation(format!(
                "active category {category} not found"
            )));
        }

        log::debug!(
            "loaded case '{}': {} categories, {} steps",
            doc.title,
            doc.categories.len(),
            doc.steps().count()
        );
        Ok(doc)
    }
}
