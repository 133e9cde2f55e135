//! # Formats
//!
//! External representations of a `Config`.
//!
//! Only pure transformations live here; reading and writing files is the
//! binary's job.

mod document;

pub use document::{decode, encode};
