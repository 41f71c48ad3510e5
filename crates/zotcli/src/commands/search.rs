use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;
use zotcli_core::OutputFormat;
use zotcli_core::output::Column;

use super::collection::report_write_failures;
use super::{AppContext, CommonArgs, load_json_input, print_formatted};

const SEARCH_COLUMNS: &[Column] = &[
    Column::new("Key", "key"),
    Column::new("Name", "data.name"),
    Column::new("Version", "version"),
];

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[command(subcommand)]
    command: SearchCommand,
}

#[derive(Debug, Subcommand)]
enum SearchCommand {
    #[command(about = "List saved searches")]
    List {
        #[command(flatten)]
        common: CommonArgs,
    },
    #[command(about = "Create a saved search")]
    Create {
        #[arg(long, help = "Name of the saved search")]
        name: String,
        #[arg(
            long = "conditions-json",
            value_name = "JSON|PATH",
            help = "Condition array, inline or as a file path: \
                    [{\"condition\": ..., \"operator\": ..., \"value\": ...}]"
        )]
        conditions_json: String,
        #[arg(
            long,
            default_value = "table",
            value_parser = ["json", "yaml", "table", "keys"]
        )]
        output: String,
    },
    #[command(about = "Delete saved searches by key")]
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
        #[arg(long, help = "Skip the confirmation prompt")]
        force: bool,
    },
}

pub fn run(ctx: &AppContext, args: SearchArgs) -> Result<()> {
    match args.command {
        SearchCommand::List { common } => {
            let mut client = ctx.client()?;
            let data = client.searches(&common.params())?;
            print_formatted(&data, common.format()?, SEARCH_COLUMNS, "key")
        }
        SearchCommand::Create {
            name,
            conditions_json,
            output,
        } => {
            let conditions = load_json_input(&conditions_json)?;
            zotcli_core::searches::validate_search_conditions(&conditions)?;
            let mut client = ctx.client()?;
            let response = client.create_saved_search(&name, &conditions)?;
            report_write_failures(&response)?;
            match OutputFormat::parse(&output)? {
                OutputFormat::Table => {
                    println!("Saved search '{name}' created successfully.");
                    Ok(())
                }
                OutputFormat::Keys => {
                    println!("{name}");
                    Ok(())
                }
                format => print_formatted(
                    &json!({"name": name, "status": "created successfully"}),
                    format,
                    &[],
                    "name",
                ),
            }
        }
        SearchCommand::Delete { keys, force } => {
            let description = format!("delete saved search(es) {}", keys.join(", "));
            if !ctx.confirm_destructive(&description, force)? {
                println!("Aborted.");
                return Ok(());
            }
            let mut client = ctx.client()?;
            client.delete_saved_searches(&keys)?;
            println!("Successfully deleted saved search(es): {}.", keys.join(", "));
            Ok(())
        }
    }
}
