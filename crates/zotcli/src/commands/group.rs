use anyhow::Result;
use clap::{Args, Subcommand};
use zotcli_core::output::Column;

use super::{AppContext, CommonArgs, print_formatted};

const GROUP_COLUMNS: &[Column] = &[
    Column::new("ID", "id"),
    Column::new("Name", "data.name"),
    Column::new("Type", "data.type"),
    Column::new("Owner ID", "data.owner"),
    Column::new("Num Items", "meta.numItems"),
    Column::new("Version", "version"),
    Column::new("URL", "links.alternate.href"),
];

#[derive(Debug, Args)]
pub struct GroupArgs {
    #[command(subcommand)]
    command: GroupCommand,
}

#[derive(Debug, Subcommand)]
enum GroupCommand {
    #[command(about = "List groups the API key has access to")]
    List {
        #[command(flatten)]
        common: CommonArgs,
    },
}

pub fn run(ctx: &AppContext, args: GroupArgs) -> Result<()> {
    match args.command {
        GroupCommand::List { common } => {
            let mut client = ctx.client()?;
            let data = client.groups(&common.params())?;
            if data.as_array().is_some_and(|groups| groups.is_empty()) {
                println!(
                    "No groups found or accessible with the current API key and permissions."
                );
                return Ok(());
            }
            // Group ids live at the object root, not under data.
            print_formatted(&data, common.format()?, GROUP_COLUMNS, "id")
        }
    }
}
