//! MIME decoding engine: header unfolding, transfer and word decoding,
//! multipart splitting, tree building, and message assembly.

pub mod charset;
pub mod entity;
pub mod header;
pub mod html;
pub mod message;
pub mod mime;
pub mod multipart;
pub mod transfer;

pub use message::{decode, decode_file, decode_with};
pub use mime::Limits;
