//! srtfix - AI-assisted SRT spelling review
//!
//! Loads an SRT subtitle file, asks an external text-review service to flag
//! suspected spelling errors, and lets an operator accept, edit or dismiss
//! each flag before exporting the corrected file.

pub mod cli;
pub mod config;
pub mod error;
pub mod subtitle;
pub mod session;
pub mod review;
pub mod analyze;
pub mod credentials;
pub mod workflow;
