//! Request extractors shared by handlers.

pub mod validate;

pub use validate::{ValidatedJson, ValidatedQuery};
