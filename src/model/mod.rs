//! Core data model: message handles, attachment parts, and storage destinations.

pub mod attachment;
pub mod destination;
pub mod message;
