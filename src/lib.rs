//! # Nougat Checkpoint
//!
//! Checkpoint provisioning and run-directory bookkeeping for training the
//! Nougat document-OCR model.
//!
//! ## Modules
//!
//! - [`artifacts`] — Artifact names, release tag, and download URLs
//! - [`fetch`] — Blocking HTTP downloads with progress reporting
//! - [`resolver`] — Locates the checkpoint directory and fills it when incomplete
//! - [`layout`] — Files that make up a resumable training checkpoint
//! - [`experiment`] — Experiment config, run identity, and config snapshots
//! - [`config`] — TOML configuration loading and validation
//! - [`error`] — Structured error types

pub mod artifacts;
pub mod config;
pub mod error;
pub mod experiment;
pub mod fetch;
pub mod layout;
pub mod resolver;

#[cfg(test)]
mod test_support;

pub use resolver::{get_checkpoint, Resolver};
