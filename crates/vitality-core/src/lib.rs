//! Vitality Core: domain models, registry traits and errors shared by
//! every crate of the metadata visibility model.

pub mod catalog;
pub mod error;
pub mod ids;
pub mod models;
pub mod repository;

pub use error::{VitalityError, VitalityResult};
