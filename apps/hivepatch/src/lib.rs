//! # hivepatch
//!
//! The command-line shell around `hivepatch-core`.
//!
//! The shell owns everything the core deliberately leaves out: reading and
//! writing files, asking the operator before any write, naming audit files,
//! loading settings and logging.

pub mod audit;
pub mod cli;
pub mod prompt;
pub mod settings;
