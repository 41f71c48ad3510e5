use anyhow::Result;
use clap::{Args, Subcommand};
use zotcli_core::output::Column;

use super::{AppContext, CommonArgs, print_formatted};

const TAG_COLUMNS: &[Column] = &[
    Column::new("Tag", "tag"),
    Column::new("Type", "meta.type"),
    Column::new("Items", "meta.numItems"),
];

#[derive(Debug, Args)]
pub struct TagArgs {
    #[command(subcommand)]
    command: TagCommand,
}

#[derive(Debug, Subcommand)]
enum TagCommand {
    #[command(about = "List tags in the library")]
    List {
        #[command(flatten)]
        common: CommonArgs,
    },
    #[command(about = "List tags attached to one item")]
    Item {
        key: String,
        #[command(flatten)]
        common: CommonArgs,
    },
    #[command(about = "Delete tags from the library by name")]
    Delete {
        #[arg(required = true)]
        names: Vec<String>,
        #[arg(long, help = "Skip the confirmation prompt")]
        force: bool,
    },
}

pub fn run(ctx: &AppContext, args: TagArgs) -> Result<()> {
    match args.command {
        TagCommand::List { common } => {
            let mut client = ctx.client()?;
            let data = client.tags(&common.params())?;
            print_formatted(&data, common.format()?, TAG_COLUMNS, "tag")
        }
        TagCommand::Item { key, common } => {
            let mut client = ctx.client()?;
            let data = client.item_tags(&key, &common.params())?;
            print_formatted(&data, common.format()?, TAG_COLUMNS, "tag")
        }
        TagCommand::Delete { names, force } => {
            let description = format!("delete tag(s) {}", names.join(", "));
            if !ctx.confirm_destructive(&description, force)? {
                println!("Aborted.");
                return Ok(());
            }
            let mut client = ctx.client()?;
            client.delete_tags(&names)?;
            println!("Deleted tag(s): {}.", names.join(", "));
            Ok(())
        }
    }
}
