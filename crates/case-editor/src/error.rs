//! Errors raised while building, applying, or inverting commands.

use case_core::{CategoryId, ElementId, PropertyError, StepId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("element {0} not found")]
    ElementNotFound(ElementId),

    #[error("step {0} not found")]
    StepNotFound(StepId),

    #[error("category {0} not found")]
    CategoryNotFound(CategoryId),

    /// No step is active, so there is nowhere to place new elements.
    #[error("no active step")]
    NoActiveStep,

    /// A command was built with an empty target set.
    #[error("{0} needs at least one target")]
    EmptyTargets(&'static str),

    /// A new entity reuses an id the document (or the same batch) already has.
    #[error("id {0} already exists")]
    DuplicateId(String),

    /// The command would leave the document exactly as it is.
    #[error("{0} changes nothing")]
    NoChange(&'static str),

    #[error(transparent)]
    Property(#[from] PropertyError),
}
