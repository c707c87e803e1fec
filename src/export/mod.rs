//! Writing decoded message content to disk.

pub mod attachment;
