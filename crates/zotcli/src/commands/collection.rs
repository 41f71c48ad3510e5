use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use serde_json::Value;
use zotcli_core::ZoteroClient;
use zotcli_core::output::Column;

use super::{AppContext, CommonArgs, print_formatted};

const COLLECTION_COLUMNS: &[Column] = &[
    Column::new("Key", "key"),
    Column::new("Name", "data.name"),
    Column::new("Parent", "data.parentCollection"),
    Column::new("Items", "meta.numItems"),
    Column::new("Version", "version"),
];

const TAG_COLUMNS: &[Column] = &[
    Column::new("Tag", "tag"),
    Column::new("Type", "meta.type"),
    Column::new("Items", "meta.numItems"),
];

#[derive(Debug, Args)]
pub struct CollectionArgs {
    #[command(subcommand)]
    command: CollectionCommand,
}

#[derive(Debug, Subcommand)]
enum CollectionCommand {
    #[command(about = "List collections")]
    List {
        #[arg(long, help = "Only top-level collections")]
        top: bool,
        #[command(flatten)]
        common: CommonArgs,
    },
    #[command(about = "Fetch collections by key")]
    Get {
        #[arg(required = true)]
        keys: Vec<String>,
        #[command(flatten)]
        common: CommonArgs,
    },
    #[command(about = "List subcollections of a collection")]
    Subcollections {
        key: String,
        #[arg(long, help = "Recurse into nested subcollections")]
        all: bool,
        #[command(flatten)]
        common: CommonArgs,
    },
    #[command(about = "List items in a collection")]
    Items {
        key: String,
        #[arg(long, help = "Only top-level items")]
        top: bool,
        #[command(flatten)]
        common: CommonArgs,
    },
    #[command(about = "List tags used within a collection")]
    Tags {
        key: String,
        #[command(flatten)]
        common: CommonArgs,
    },
    #[command(about = "Map of collection key to library version")]
    Versions {
        #[command(flatten)]
        common: CommonArgs,
    },
    #[command(about = "Create a collection")]
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, value_name = "KEY", help = "Parent collection key")]
        parent_id: Option<String>,
        #[arg(
            long,
            default_value = "json",
            value_parser = ["json", "yaml", "table", "keys"]
        )]
        output: String,
    },
    #[command(about = "Rename or move a collection")]
    Update {
        key: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_name = "KEY", help = "New parent collection key")]
        parent_id: Option<String>,
    },
    #[command(about = "Delete collections by key")]
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
        #[arg(long, help = "Skip the confirmation prompt")]
        force: bool,
    },
}

pub fn run(ctx: &AppContext, args: CollectionArgs) -> Result<()> {
    match args.command {
        CollectionCommand::List { top, common } => {
            let mut client = ctx.client()?;
            let data = if top {
                client.collections_top(&common.params())?
            } else {
                client.collections(&common.params())?
            };
            print_formatted(&data, common.format()?, COLLECTION_COLUMNS, "key")
        }
        CollectionCommand::Get { keys, common } => {
            let mut client = ctx.client()?;
            let data = fetch_many(&mut client, &keys)?;
            print_formatted(&data, common.format()?, COLLECTION_COLUMNS, "key")
        }
        CollectionCommand::Subcollections { key, all, common } => {
            let mut client = ctx.client()?;
            let data = if all {
                client.all_collections_under(&key)?
            } else {
                client.collections_sub(&key, &common.params())?
            };
            print_formatted(&data, common.format()?, COLLECTION_COLUMNS, "key")
        }
        CollectionCommand::Items { key, top, common } => {
            let mut client = ctx.client()?;
            let data = if top {
                client.collection_items_top(&key, &common.params())?
            } else {
                client.collection_items(&key, &common.params())?
            };
            print_formatted(&data, common.format()?, super::item::ITEM_COLUMNS, "key")
        }
        CollectionCommand::Tags { key, common } => {
            let mut client = ctx.client()?;
            let data = client.collection_tags(&key, &common.params())?;
            print_formatted(&data, common.format()?, TAG_COLUMNS, "tag")
        }
        CollectionCommand::Versions { common } => {
            let mut client = ctx.client()?;
            let data = client.collection_versions(&common.params())?;
            print_formatted(&data, common.format()?, &[], "key")
        }
        CollectionCommand::Create {
            name,
            parent_id,
            output,
        } => {
            let mut client = ctx.client()?;
            let payload = ZoteroClient::collection_payload(&name, parent_id.as_deref());
            let response = client.create_collections(vec![payload])?;
            report_write_failures(&response)?;
            print_formatted(
                &response,
                zotcli_core::OutputFormat::parse(&output)?,
                &[],
                "key",
            )
        }
        CollectionCommand::Update {
            key,
            name,
            parent_id,
        } => {
            if name.is_none() && parent_id.is_none() {
                bail!("nothing to update: pass --name and/or --parent-id");
            }
            let mut client = ctx.client()?;
            let collection = client.collection(&key)?;
            let mut data = collection
                .get("data")
                .cloned()
                .unwrap_or(Value::Null);
            let object = data
                .as_object_mut()
                .ok_or_else(|| anyhow::anyhow!("collection '{key}' has no data object"))?;
            if let Some(name) = name {
                object.insert("name".to_string(), Value::String(name));
            }
            if let Some(parent_id) = parent_id {
                object.insert("parentCollection".to_string(), Value::String(parent_id));
            }
            client.update_collection(&data)?;
            println!("Updated collection '{key}'.");
            Ok(())
        }
        CollectionCommand::Delete { keys, force } => {
            let description = format!("delete collection(s) {}", keys.join(", "));
            if !ctx.confirm_destructive(&description, force)? {
                println!("Aborted.");
                return Ok(());
            }
            let mut client = ctx.client()?;
            for key in &keys {
                let collection = client.collection(key)?;
                let version = collection
                    .get("version")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| {
                        anyhow::anyhow!("collection '{key}' has no version field")
                    })?;
                client.delete_collection(key, version)?;
                println!("Deleted collection '{key}'.");
            }
            Ok(())
        }
    }
}

fn fetch_many(client: &mut ZoteroClient, keys: &[String]) -> Result<Value> {
    let mut collected = Vec::with_capacity(keys.len());
    for key in keys {
        collected.push(client.collection(key)?);
    }
    Ok(Value::Array(collected))
}

pub(super) fn report_write_failures(response: &Value) -> Result<()> {
    let failures = zotcli_core::items::failed_messages(response);
    if failures.is_empty() {
        return Ok(());
    }
    for (index, message) in &failures {
        eprintln!("Failed at index {index}: {message}");
    }
    bail!("{} object(s) were rejected by the server", failures.len());
}
