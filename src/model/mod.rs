//! Core data model types: part tree, attachments, and the decoded record.

pub mod attachment;
pub mod part;
pub mod record;
