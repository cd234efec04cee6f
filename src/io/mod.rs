//! Dataset input and result export.

pub mod export;
pub mod input;
