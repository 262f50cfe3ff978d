//! Admin tooling for AHX signing keys, tokens and revocations.
//!
//! The `ahx-keys` binary is a thin shell over [`commands`]; configuration
//! loading lives in [`config`] so it can be tested without a process.

pub mod cli;
pub mod commands;
pub mod config;
pub mod observability;
pub mod output;
