//! Vitality Filter: structural redaction of catalog records.
//!
//! A record is a nested JSON map in which some fields hold JSON-encoded
//! text. [`ContentFilter::filter`] expands those fields, flattens the
//! record into slash-joined paths, keeps the paths whose field id is
//! whitelisted, rebuilds the nesting and re-encodes the stringified
//! fields. [`ContentFilter::keys_match`] reports paths the field registry
//! does not know yet.

mod config;
mod decode;
mod encode;
mod error;
mod filter;
mod flatten;

pub use config::FilterConfig;
pub use decode::{decode, try_parse_json};
pub use encode::to_spaced_json;
pub use error::FilterError;
pub use filter::ContentFilter;
pub use flatten::{PATH_SEPARATOR, flatten, unflatten};
