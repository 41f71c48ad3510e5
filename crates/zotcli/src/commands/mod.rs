use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Args;
use serde_json::Value;
use zotcli_core::client::SearchParams;
use zotcli_core::config::{ProfileOverrides, ProfileStore, ResolvedSettings};
use zotcli_core::output::{Column, OutputFormat, format_value};
use zotcli_core::{ZoteroClient, ZoteroClientConfig};

pub mod collection;
pub mod configure;
pub mod file;
pub mod fulltext;
pub mod group;
pub mod item;
pub mod search;
pub mod tag;

/// Per-invocation context shared by every command group.
pub struct AppContext {
    pub overrides: ProfileOverrides,
    pub debug: bool,
    pub no_interaction: bool,
}

impl AppContext {
    pub fn store(&self) -> Result<ProfileStore> {
        ProfileStore::load_default()
    }

    pub fn settings(&self) -> Result<ResolvedSettings> {
        Ok(self.store()?.resolve_settings(&self.overrides))
    }

    pub fn client(&self) -> Result<ZoteroClient> {
        let settings = self.settings()?;
        let config = ZoteroClientConfig::from_settings(&settings)?;
        Ok(ZoteroClient::new(config)?)
    }

    /// Gate a destructive command: `--force` skips the prompt, and
    /// `--no-interaction` without `--force` refuses outright.
    pub fn confirm_destructive(&self, description: &str, force: bool) -> Result<bool> {
        if force {
            return Ok(true);
        }
        if self.no_interaction {
            bail!("refusing to {description} without --force in --no-interaction mode");
        }
        confirm(&format!("Are you sure you want to {description}?"))
    }
}

/// Options shared by the listing commands.
#[derive(Debug, Args)]
pub struct CommonArgs {
    #[arg(long, help = "Number of results to return")]
    pub limit: Option<u32>,
    #[arg(long, help = "Offset into the result set")]
    pub start: Option<u32>,
    #[arg(long, help = "Only objects modified after this library version")]
    pub since: Option<String>,
    #[arg(long, help = "Field to sort by")]
    pub sort: Option<String>,
    #[arg(long, value_parser = ["asc", "desc"], help = "Sort direction")]
    pub direction: Option<String>,
    #[arg(short = 'q', long = "query", help = "Quick search query")]
    pub query: Option<String>,
    #[arg(
        long,
        value_parser = ["titleCreatorYear", "everything"],
        help = "Quick search mode"
    )]
    pub qmode: Option<String>,
    #[arg(
        long = "filter-tag",
        value_name = "TAG",
        help = "Filter by tag; repeat the flag for AND logic"
    )]
    pub filter_tags: Vec<String>,
    #[arg(long = "filter-item-type", value_name = "TYPE", help = "Filter by item type")]
    pub filter_item_type: Option<String>,
    #[arg(
        long,
        default_value = "json",
        value_parser = ["json", "yaml", "table", "keys"],
        help = "Output format"
    )]
    pub output: String,
}

impl CommonArgs {
    pub fn params(&self) -> SearchParams {
        SearchParams {
            limit: self.limit,
            start: self.start,
            since: self.since.clone(),
            sort: self.sort.clone(),
            direction: self.direction.clone(),
            query: self.query.clone(),
            qmode: self.qmode.clone(),
            tags: self.filter_tags.clone(),
            item_type: self.filter_item_type.clone(),
            ..Default::default()
        }
    }

    pub fn format(&self) -> Result<OutputFormat> {
        OutputFormat::parse(&self.output)
    }
}

/// Accept either a path to a JSON file or an inline JSON string.
pub fn load_json_input(input: &str) -> Result<Value> {
    let path = Path::new(input);
    if path.is_file() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        return serde_json::from_str(&content)
            .with_context(|| format!("file contains invalid JSON: {}", path.display()));
    }
    serde_json::from_str(input)
        .with_context(|| format!("input is not valid JSON or a readable file: '{input}'"))
}

pub fn print_formatted(
    data: &Value,
    format: OutputFormat,
    columns: &[Column],
    key_field: &str,
) -> Result<()> {
    println!("{}", format_value(data, format, columns, key_field)?);
    Ok(())
}

pub fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N]: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}
