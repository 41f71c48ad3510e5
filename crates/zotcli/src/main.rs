use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use zotcli_core::ZoteroError;
use zotcli_core::config::ProfileOverrides;

mod commands;

use commands::{AppContext, collection, configure, file, fulltext, group, item, search, tag};

#[derive(Debug, Parser)]
#[command(
    name = "zot",
    version,
    about = "A command line client for Zotero libraries"
)]
struct Cli {
    #[arg(long, global = true, value_name = "NAME", help = "Connection profile to use")]
    profile: Option<String>,
    #[arg(long, global = true, value_name = "ID", help = "Zotero library ID")]
    library_id: Option<String>,
    #[arg(
        long,
        global = true,
        value_parser = ["user", "group"],
        help = "Zotero library type"
    )]
    library_type: Option<String>,
    #[arg(long, global = true, value_name = "KEY", help = "Zotero API key")]
    api_key: Option<String>,
    #[arg(long, global = true, help = "Locale for API responses")]
    locale: Option<String>,
    #[arg(
        long,
        global = true,
        help = "Talk to the local Zotero instance instead of the web API"
    )]
    local: bool,
    #[arg(
        long,
        global = true,
        help = "Debug logging plus error chains for handled failures"
    )]
    debug: bool,
    #[arg(
        long,
        global = true,
        help = "Never prompt; destructive commands then require --force"
    )]
    no_interaction: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Manage connection profiles")]
    Configure(configure::ConfigureArgs),
    #[command(alias = "collections", about = "Work with collections")]
    Collection(collection::CollectionArgs),
    #[command(alias = "items", about = "Work with items")]
    Item(item::ItemArgs),
    #[command(alias = "tags", about = "Work with tags")]
    Tag(tag::TagArgs),
    #[command(alias = "searches", about = "Manage saved searches")]
    Search(search::SearchArgs),
    #[command(alias = "groups", about = "List accessible groups")]
    Group(group::GroupArgs),
    #[command(about = "Work with indexed full-text content")]
    Fulltext(fulltext::FulltextArgs),
    #[command(about = "Download and upload file attachments")]
    File(file::FileArgs),
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let ctx = AppContext {
        overrides: ProfileOverrides {
            profile: cli.profile.clone(),
            library_id: cli.library_id.clone(),
            library_type: cli.library_type.clone(),
            api_key: cli.api_key.clone(),
            locale: cli.locale.clone(),
            local: cli.local.then_some(true),
        },
        debug: cli.debug,
        no_interaction: cli.no_interaction,
    };

    let result = match cli.command {
        Commands::Configure(args) => configure::run(&ctx, args),
        Commands::Collection(args) => collection::run(&ctx, args),
        Commands::Item(args) => item::run(&ctx, args),
        Commands::Tag(args) => tag::run(&ctx, args),
        Commands::Search(args) => search::run(&ctx, args),
        Commands::Group(args) => group::run(&ctx, args),
        Commands::Fulltext(args) => fulltext::run(&ctx, args),
        Commands::File(args) => file::run(&ctx, args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            render_error(&error, cli.debug);
            ExitCode::FAILURE
        }
    }
}

fn render_error(error: &anyhow::Error, debug: bool) {
    match error.downcast_ref::<ZoteroError>() {
        Some(api_error) => eprintln!("Error: {api_error}"),
        // `:#` keeps the context chain on one line.
        None => eprintln!("Error: {error:#}"),
    }
    if debug {
        eprintln!("\n{error:?}");
    }
}

fn init_tracing(debug: bool) {
    let default_directives = if debug {
        "zotcli=debug,zotcli_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
