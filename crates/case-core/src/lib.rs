pub mod error;
pub mod id;
pub mod model;
pub mod persist;
pub mod property;

pub use error::{DocumentError, PropertyError};
pub use id::{CategoryId, ElementId, StepId};
pub use model::*;
pub use property::PropertyValue;
