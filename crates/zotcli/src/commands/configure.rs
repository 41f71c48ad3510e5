use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use zotcli_core::config::{DEFAULT_LOCALE, DEFAULT_PROFILE, Profile};

use super::{AppContext, confirm};

#[derive(Debug, Args)]
pub struct ConfigureArgs {
    #[command(subcommand)]
    command: ConfigureCommand,
}

#[derive(Debug, Subcommand)]
enum ConfigureCommand {
    #[command(about = "Create or update a profile, seeded from the global connection flags")]
    Setup,
    #[command(about = "Print one profile key")]
    Get { key: String },
    #[command(about = "Set one profile key")]
    Set { key: String, value: String },
    #[command(about = "List configured profiles")]
    ListProfiles,
    #[command(about = "Print or switch the active profile")]
    CurrentProfile { name: Option<String> },
}

pub fn run(ctx: &AppContext, args: ConfigureArgs) -> Result<()> {
    match args.command {
        ConfigureCommand::Setup => run_setup(ctx),
        ConfigureCommand::Get { key } => run_get(ctx, &key),
        ConfigureCommand::Set { key, value } => run_set(ctx, &key, &value),
        ConfigureCommand::ListProfiles => run_list_profiles(ctx),
        ConfigureCommand::CurrentProfile { name } => run_current_profile(ctx, name),
    }
}

fn run_setup(ctx: &AppContext) -> Result<()> {
    let seed = Profile {
        library_id: ctx.overrides.library_id.clone(),
        library_type: ctx.overrides.library_type.clone(),
        api_key: ctx.overrides.api_key.clone(),
        locale: ctx.overrides.locale.clone(),
        local_zotero: ctx.overrides.local.unwrap_or(false),
    };
    let name = ctx
        .overrides
        .profile
        .clone()
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
    println!("Configuring profile: {name}");

    let mut store = ctx.store()?;
    let existing = store.profile(&name).unwrap_or_default();

    let profile = if ctx.no_interaction {
        // Flags only; anything not given falls back to the existing value.
        Profile {
            library_id: seed.library_id.or(existing.library_id),
            library_type: seed.library_type.or(existing.library_type),
            api_key: seed.api_key.or(existing.api_key),
            locale: seed.locale.or(existing.locale),
            local_zotero: seed.local_zotero || existing.local_zotero,
        }
    } else {
        prompt_profile(&seed, &existing)?
    };

    store.upsert_profile(&name, &profile)?;
    store.set_current_profile(&name)?;
    store.save()?;
    println!("Profile '{name}' set as the current active profile.");
    println!(
        "Configuration for profile '{name}' saved to {}.",
        store.path().display()
    );
    Ok(())
}

fn prompt_profile(seed: &Profile, existing: &Profile) -> Result<Profile> {
    let library_id = match &seed.library_id {
        Some(value) => value.clone(),
        None => prompt("Zotero Library ID", existing.library_id.as_deref())?,
    };
    let library_type = match &seed.library_type {
        Some(value) => value.clone(),
        None => loop {
            let answer = prompt(
                "Library Type (user/group)",
                existing.library_type.as_deref().or(Some("user")),
            )?;
            let normalized = answer.trim().to_lowercase();
            if normalized == "user" || normalized == "group" {
                break normalized;
            }
            eprintln!("Please answer 'user' or 'group'.");
        },
    };
    let api_key = match &seed.api_key {
        Some(value) => value.clone(),
        None => prompt("Zotero API Key", existing.api_key.as_deref())?,
    };
    let local_zotero = seed.local_zotero || confirm("Use local Zotero instance?")?;
    let locale = match &seed.locale {
        Some(value) => value.clone(),
        None => prompt(
            "Locale",
            existing.locale.as_deref().or(Some(DEFAULT_LOCALE)),
        )?,
    };

    Ok(Profile {
        library_id: non_empty(library_id),
        library_type: non_empty(library_type),
        api_key: non_empty(api_key),
        locale: non_empty(locale),
        local_zotero,
    })
}

fn run_get(ctx: &AppContext, key: &str) -> Result<()> {
    let store = ctx.store()?;
    let profile = resolve_profile_name(ctx, &store.current_profile());
    match store.get_value(&profile, key) {
        Some(value) => println!("{value}"),
        None => eprintln!("Key '{key}' not found in profile '{profile}'."),
    }
    Ok(())
}

fn run_set(ctx: &AppContext, key: &str, value: &str) -> Result<()> {
    let mut store = ctx.store()?;
    let profile = resolve_profile_name(ctx, &store.current_profile());
    store
        .set_value(&profile, key, value)
        .with_context(|| format!("cannot set '{key}' for profile '{profile}'"))?;
    store.save()?;
    println!("Set '{key}' to '{value}' for profile '{profile}'.");
    Ok(())
}

fn run_list_profiles(ctx: &AppContext) -> Result<()> {
    let store = ctx.store()?;
    let names = store.profile_names();
    let current = store.current_profile();
    if !names.contains(&current) {
        println!("* {current} (active, not explicitly configured)");
    }
    for name in names {
        if name == current {
            println!("* {name} (active)");
        } else {
            println!("  {name}");
        }
    }
    Ok(())
}

fn run_current_profile(ctx: &AppContext, name: Option<String>) -> Result<()> {
    let mut store = ctx.store()?;
    match name {
        None => println!("{}", store.current_profile()),
        Some(name) => {
            // A nonexistent profile is a handled error: message, exit 0.
            if let Err(error) = store.set_current_profile(&name) {
                eprintln!("Error: {error}");
                return Ok(());
            }
            store.save()?;
            println!("Active profile set to: {name}");
        }
    }
    Ok(())
}

fn resolve_profile_name(ctx: &AppContext, current: &str) -> String {
    ctx.overrides
        .profile
        .clone()
        .unwrap_or_else(|| current.to_string())
}

fn prompt(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(default) if !default.is_empty() => print!("{label} [{default}]: "),
        _ => print!("{label}: "),
    }
    io::stdout().flush()?;
    let mut line = String::new();
    let read = io::stdin().read_line(&mut line)?;
    if read == 0 && line.trim().is_empty() {
        bail!("input stream closed while prompting for '{label}'");
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Ok(default.unwrap_or("").to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}
