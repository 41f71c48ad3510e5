use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use serde_json::Value;
use zotcli_core::ZoteroClient;
use zotcli_core::items::created_keys;
use zotcli_core::output::Column;

use super::collection::report_write_failures;
use super::{AppContext, CommonArgs, load_json_input, print_formatted};

pub(super) const ITEM_COLUMNS: &[Column] = &[
    Column::new("Key", "key"),
    Column::new("Type", "data.itemType"),
    Column::new("Title", "data.title"),
    Column::new("Date", "data.date"),
    Column::new("Version", "version"),
];

#[derive(Debug, Args)]
pub struct ItemArgs {
    #[command(subcommand)]
    command: ItemCommand,
}

#[derive(Debug, Subcommand)]
enum ItemCommand {
    #[command(about = "List items")]
    List {
        #[arg(long, help = "Only top-level items")]
        top: bool,
        #[arg(long, conflicts_with = "top", help = "List the trash instead")]
        trash: bool,
        #[command(flatten)]
        common: CommonArgs,
    },
    #[command(about = "Fetch items by key")]
    Get {
        #[arg(required = true)]
        keys: Vec<String>,
        #[command(flatten)]
        common: CommonArgs,
    },
    #[command(about = "List child items of an item")]
    Children {
        key: String,
        #[command(flatten)]
        common: CommonArgs,
    },
    #[command(about = "Map of item key to library version")]
    Versions {
        #[command(flatten)]
        common: CommonArgs,
    },
    #[command(about = "Total number of items in the library")]
    Count,
    #[command(about = "Keys deleted from the library since a version")]
    Deleted {
        #[arg(long, help = "Library version to diff against")]
        since: String,
        #[arg(
            long,
            default_value = "json",
            value_parser = ["json", "yaml", "table", "keys"]
        )]
        output: String,
    },
    #[command(about = "Create items from JSON")]
    Create {
        #[arg(
            long = "from-json",
            value_name = "JSON|PATH",
            help = "Item object/array, inline or as a file path"
        )]
        from_json: String,
        #[arg(
            long,
            value_name = "TYPE",
            help = "Start from a server-side template for this item type"
        )]
        template: Option<String>,
        #[arg(
            long,
            default_value = "json",
            value_parser = ["json", "yaml", "table", "keys"]
        )]
        output: String,
    },
    #[command(about = "Apply a JSON patch to one item")]
    Update {
        key: String,
        #[arg(long = "from-json", value_name = "JSON|PATH")]
        from_json: String,
        #[arg(
            long,
            value_name = "VERSION",
            help = "Expected item version; defaults to a fresh read"
        )]
        last_modified: Option<u64>,
    },
    #[command(about = "Move items to the trash (delete via the API)")]
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
        #[arg(long, help = "Skip the confirmation prompt")]
        force: bool,
    },
    #[command(about = "Render a bibliography for items")]
    Bib {
        #[arg(required = true)]
        keys: Vec<String>,
        #[arg(long, default_value = "bibtex", value_parser = ["bibtex", "csljson"])]
        format: String,
        #[arg(long, help = "Citation style for formatted output")]
        style: Option<String>,
    },
}

pub fn run(ctx: &AppContext, args: ItemArgs) -> Result<()> {
    match args.command {
        ItemCommand::List { top, trash, common } => {
            let mut client = ctx.client()?;
            let data = if trash {
                client.trash(&common.params())?
            } else if top {
                client.items_top(&common.params())?
            } else {
                client.items(&common.params())?
            };
            print_formatted(&data, common.format()?, ITEM_COLUMNS, "key")
        }
        ItemCommand::Get { keys, common } => {
            let mut client = ctx.client()?;
            let data = fetch_many(&mut client, &keys)?;
            print_formatted(&data, common.format()?, ITEM_COLUMNS, "key")
        }
        ItemCommand::Children { key, common } => {
            let mut client = ctx.client()?;
            let data = client.item_children(&key, &common.params())?;
            print_formatted(&data, common.format()?, ITEM_COLUMNS, "key")
        }
        ItemCommand::Versions { common } => {
            let mut client = ctx.client()?;
            let data = client.item_versions(&common.params())?;
            print_formatted(&data, common.format()?, &[], "key")
        }
        ItemCommand::Count => {
            let mut client = ctx.client()?;
            println!("{}", client.count_items()?);
            Ok(())
        }
        ItemCommand::Deleted { since, output } => {
            let mut client = ctx.client()?;
            let data = client.deleted(&since)?;
            print_formatted(&data, zotcli_core::OutputFormat::parse(&output)?, &[], "key")
        }
        ItemCommand::Create {
            from_json,
            template,
            output,
        } => {
            let input = load_json_input(&from_json)?;
            let mut client = ctx.client()?;
            let payloads = build_create_payloads(&mut client, input, template.as_deref())?;
            let response = client.create_items(payloads)?;
            report_write_failures(&response)?;
            let keys = created_keys(&response);
            if !keys.is_empty() {
                tracing::debug!(?keys, "created items");
            }
            print_formatted(
                &response,
                zotcli_core::OutputFormat::parse(&output)?,
                &[],
                "key",
            )
        }
        ItemCommand::Update {
            key,
            from_json,
            last_modified,
        } => {
            let patch = load_json_input(&from_json)?;
            if !patch.is_object() {
                bail!("item patch must be a JSON object");
            }
            let mut client = ctx.client()?;
            let version = match last_modified {
                Some(version) => version,
                None => {
                    let item = client.item(&key)?;
                    item.get("version").and_then(Value::as_u64).ok_or_else(|| {
                        anyhow::anyhow!("item '{key}' has no version field")
                    })?
                }
            };
            client.update_item(&key, &patch, version)?;
            println!("Updated item '{key}'.");
            Ok(())
        }
        ItemCommand::Delete { keys, force } => {
            let description = format!("delete item(s) {}", keys.join(", "));
            if !ctx.confirm_destructive(&description, force)? {
                println!("Aborted.");
                return Ok(());
            }
            let mut client = ctx.client()?;
            client.delete_items(&keys)?;
            println!("Deleted item(s): {}.", keys.join(", "));
            Ok(())
        }
        ItemCommand::Bib {
            keys,
            format,
            style,
        } => {
            let mut client = ctx.client()?;
            let rendered = client.items_bib(&keys, &format, style.as_deref())?;
            println!("{rendered}");
            Ok(())
        }
    }
}

fn fetch_many(client: &mut ZoteroClient, keys: &[String]) -> Result<Value> {
    let mut collected = Vec::with_capacity(keys.len());
    for key in keys {
        collected.push(client.item(key)?);
    }
    Ok(Value::Array(collected))
}

/// Normalize `item create` input into an array of item payloads, merging an
/// optional server-side template under the user's fields.
fn build_create_payloads(
    client: &mut ZoteroClient,
    input: Value,
    template: Option<&str>,
) -> Result<Vec<Value>> {
    match (input, template) {
        (Value::Array(items), None) => Ok(items),
        (Value::Array(_), Some(_)) => {
            bail!("--template only applies to a single item object, not an array")
        }
        (Value::Object(fields), Some(item_type)) => {
            let mut base = client.item_template(item_type, None)?;
            let merged = base
                .as_object_mut()
                .ok_or_else(|| anyhow::anyhow!("item template is not a JSON object"))?;
            for (key, value) in fields {
                merged.insert(key, value);
            }
            Ok(vec![base])
        }
        (object @ Value::Object(_), None) => Ok(vec![object]),
        _ => bail!("item input must be a JSON object or an array of objects"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use zotcli_core::config::ResolvedSettings;

    fn offline_client() -> ZoteroClient {
        // Template-free paths never issue a request, so a client built from
        // dummy settings is enough.
        ZoteroClient::from_settings(&ResolvedSettings {
            profile: "test".to_string(),
            library_id: Some("1".to_string()),
            library_type: "user".to_string(),
            api_key: Some("k".to_string()),
            locale: "en-US".to_string(),
            local: false,
        })
        .expect("client")
    }

    #[test]
    fn array_input_passes_through() {
        let mut client = offline_client();
        let input = json!([{"itemType": "book"}, {"itemType": "note"}]);
        let payloads = build_create_payloads(&mut client, input, None).expect("payloads");
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0]["itemType"], "book");
    }

    #[test]
    fn single_object_is_wrapped() {
        let mut client = offline_client();
        let input = json!({"itemType": "book", "title": "T"});
        let payloads = build_create_payloads(&mut client, input, None).expect("payloads");
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0]["title"], "T");
    }

    #[test]
    fn template_with_array_is_rejected() {
        let mut client = offline_client();
        let error = build_create_payloads(&mut client, json!([{}]), Some("book"))
            .expect_err("must fail");
        assert!(error.to_string().contains("--template"));
    }

    #[test]
    fn scalar_input_is_rejected() {
        let mut client = offline_client();
        assert!(build_create_payloads(&mut client, json!("text"), None).is_err());
    }
}
