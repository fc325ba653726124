//! Vendor wire formats
//!
//! Pure serde structs matching each vendor's JSON API. They are only used at
//! the boundary; everything past the adapter speaks the canonical types.

pub mod dashscope;
pub mod openai;
