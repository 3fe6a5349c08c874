//! # formwatch-cli: formwatch Command-Line Interface
//!
//! A clap-based front end for exercising change watchers outside a
//! browser.
//!
//! ## Subcommands
//!
//! - `replay`: Run a scripted interaction sequence against a document
//!   and report watcher and guard state after every step.
//! - `config`: Show the resolved configuration and its provenance for
//!   every matching region.
//!
//! ## Crate Policy
//!
//! - CLI construction (argument parsing) is separated from business logic.
//! - Handler functions delegate to the domain crates.

pub mod config;
pub mod input;
pub mod replay;
