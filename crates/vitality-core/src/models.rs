//! Domain models for the authorization graph.
//!
//! Every node is keyed by the identifier the host catalog already uses,
//! so ids are plain strings rather than generated UUIDs.

pub mod dataset;
pub mod element;
pub mod group;
pub mod organization;
pub mod role;
pub mod template;
pub mod user;
