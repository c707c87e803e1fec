//! `mimedecode`: turn raw RFC 5322 / MIME messages into structured records.
//!
//! This crate provides the decoding engine (headers, transfer encodings,
//! encoded-words, multipart trees, body selection) and the serializable
//! [`EmailRecord`] it produces.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;

pub use model::record::EmailRecord;
pub use parser::{decode, decode_file, decode_with, Limits};
