//! # formwatch-core: Foundational Types for formwatch
//!
//! The leaf crate of the workspace. It defines everything the change
//! watcher needs to know about the page it runs on, without any state of
//! its own:
//!
//! - **Element model** (`element.rs`): an owned element tree with the
//!   attribute, class and descendant queries the watcher performs.
//!
//! - **Selectors** (`selector.rs`): a small CSS selector subset
//!   (tag, `#id`, `.class`, `[attr]`, `[attr=value]`, comma lists).
//!
//! - **Configuration** (`config.rs`): option keys, defaults, and the
//!   ordered resolution of declarative, explicit and default sources.
//!
//! - **Identity and time** (`identity.rs`, `temporal.rs`): `SessionId`
//!   and a UTC, second-precision `Timestamp`.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `formwatch-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod config;
pub mod element;
pub mod error;
pub mod identity;
pub mod selector;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use config::{ConfigSource, Configuration, OptionKey, Options, SOURCE_PRECEDENCE};
pub use element::{Document, Element, NodeId};
pub use error::{FormwatchError, SelectorError};
pub use identity::SessionId;
pub use selector::Selector;
pub use temporal::Timestamp;
