use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::{Value, json};
use zotcli_core::OutputFormat;
use zotcli_core::output::Column;

use super::{AppContext, confirm, load_json_input, print_formatted};

const NEW_FULLTEXT_COLUMNS: &[Column] = &[
    Column::new("Item Key", "itemKey"),
    Column::new("Library Version", "libraryVersion"),
];

#[derive(Debug, Args)]
pub struct FulltextArgs {
    #[command(subcommand)]
    command: FulltextCommand,
}

#[derive(Debug, Subcommand)]
enum FulltextCommand {
    #[command(about = "Retrieve full-text content for an attachment item")]
    Get {
        item_key: String,
        #[arg(
            long,
            default_value = "json",
            value_parser = ["json", "yaml", "raw"],
            help = "Output format; 'raw' prints only the content text"
        )]
        output: String,
    },
    #[command(about = "Set full-text content for an attachment item")]
    Set {
        item_key: String,
        #[arg(
            long = "from-json",
            value_name = "JSON|PATH",
            help = "Payload with 'content' plus page or char counts"
        )]
        from_json: String,
    },
    #[command(name = "list-new", about = "Items with new full-text since a library version")]
    ListNew {
        #[arg(long, help = "Library version to diff against")]
        since: String,
        #[arg(
            long,
            default_value = "json",
            value_parser = ["json", "yaml", "table", "keys"]
        )]
        output: String,
    },
}

pub fn run(ctx: &AppContext, args: FulltextArgs) -> Result<()> {
    match args.command {
        FulltextCommand::Get { item_key, output } => {
            let mut client = ctx.client()?;
            let data = client.fulltext_item(&item_key)?;
            if output == "raw" {
                match data.get("content").and_then(Value::as_str) {
                    Some(content) => println!("{content}"),
                    None => {
                        eprintln!("Warning: 'content' field is missing or not a string.");
                        println!("{data}");
                    }
                }
                return Ok(());
            }
            print_formatted(&data, OutputFormat::parse(&output)?, &[], "content")
        }
        FulltextCommand::Set {
            item_key,
            from_json,
        } => {
            let settings = ctx.settings()?;
            if settings.local {
                eprintln!(
                    "Warning: setting full-text against the local Zotero instance may fail \
                     (read-only)."
                );
                if !ctx.no_interaction && !confirm("Proceed anyway?")? {
                    println!("Aborted.");
                    return Ok(());
                }
            }
            let payload = load_json_input(&from_json)?;
            let mut client = ctx.client()?;
            client.set_fulltext(&item_key, &payload)?;
            println!("Successfully set full-text for item '{item_key}'.");
            Ok(())
        }
        FulltextCommand::ListNew { since, output } => {
            let mut client = ctx.client()?;
            let data = client.new_fulltext(&since)?;
            let entries = data.as_object().cloned().unwrap_or_default();
            if entries.is_empty() {
                println!("No new full-text content found since the specified version.");
                return Ok(());
            }
            match OutputFormat::parse(&output)? {
                OutputFormat::Table => {
                    let rows = entries
                        .iter()
                        .map(|(key, version)| {
                            json!({"itemKey": key, "libraryVersion": version})
                        })
                        .collect::<Vec<_>>();
                    print_formatted(
                        &Value::Array(rows),
                        OutputFormat::Table,
                        NEW_FULLTEXT_COLUMNS,
                        "itemKey",
                    )
                }
                OutputFormat::Keys => {
                    for key in entries.keys() {
                        println!("{key}");
                    }
                    Ok(())
                }
                format => print_formatted(&data, format, &[], "itemKey"),
            }
        }
    }
}
