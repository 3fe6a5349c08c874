//! # Config Subcommand
//!
//! Prints the configuration each matching region would be watched with,
//! including which source (declarative, explicit, defaults) supplied
//! every option.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use formwatch_core::{Configuration, Document, Options};

use crate::input::{load_document, load_options};
use crate::replay::DEFAULT_REGION_SELECTOR;

/// Arguments for the `formwatch config` subcommand.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Document description (YAML or JSON).
    #[arg(long)]
    pub document: PathBuf,

    /// Selector for the watched regions.
    #[arg(long, default_value = DEFAULT_REGION_SELECTOR)]
    pub region: String,

    /// Explicit options file (YAML or JSON).
    #[arg(long)]
    pub options: Option<PathBuf>,
}

/// Resolved configuration for one region.
#[derive(Debug, Clone, Serialize)]
pub struct RegionConfig {
    /// The region, rendered as `tag#id.class`.
    pub region: String,
    /// The resolved configuration with provenance.
    pub configuration: Configuration,
}

/// Execute the config subcommand.
pub fn run_config(args: &ConfigArgs) -> Result<u8> {
    let document = load_document(&args.document)?;
    let options = load_options(args.options.as_deref())?;
    let configs = resolve_regions(&document, &args.region, &options)?;
    if configs.is_empty() {
        tracing::warn!(region = %args.region, "no region matched");
    }
    println!("{}", serde_json::to_string_pretty(&configs)?);
    Ok(0)
}

/// Resolve the configuration of every region matching `region_selector`.
pub fn resolve_regions(
    document: &Document,
    region_selector: &str,
    options: &Options,
) -> Result<Vec<RegionConfig>> {
    Ok(document
        .query(region_selector)
        .context("invalid region selector")?
        .into_iter()
        .map(|region| RegionConfig {
            region: region.to_string(),
            configuration: Configuration::resolve(options, &Options::from_declarative(region)),
        })
        .collect())
}
