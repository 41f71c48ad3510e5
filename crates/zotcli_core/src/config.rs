use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use toml::Value;

pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_LOCALE: &str = "en-US";

/// Keys accepted inside a `[profile.<name>]` section.
pub const PROFILE_KEYS: &[&str] = &[
    "library_id",
    "library_type",
    "api_key",
    "locale",
    "local_zotero",
];

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Profile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default)]
    pub local_zotero: bool,
}

/// Connection overrides collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct ProfileOverrides {
    pub profile: Option<String>,
    pub library_id: Option<String>,
    pub library_type: Option<String>,
    pub api_key: Option<String>,
    pub locale: Option<String>,
    pub local: Option<bool>,
}

/// Fully resolved connection settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSettings {
    pub profile: String,
    pub library_id: Option<String>,
    pub library_type: String,
    pub api_key: Option<String>,
    pub locale: String,
    pub local: bool,
}

/// Profile store backed by a TOML file.
///
/// All writes go through the raw value tree so unrelated sections and
/// unknown keys survive a read-modify-write cycle.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
    root: Value,
}

/// Resolve the config file path: `ZOTCLI_CONFIG` > XDG config dir.
pub fn default_config_path() -> Result<PathBuf> {
    if let Ok(value) = env::var("ZOTCLI_CONFIG") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }
    let dirs = ProjectDirs::from("", "", "zotcli")
        .context("could not determine a config directory for this platform")?;
    Ok(dirs.config_dir().join("config.toml"))
}

impl ProfileStore {
    /// Load the store from the default location. A missing file yields an
    /// empty store with an implicit `default` profile.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path()?)
    }

    pub fn load(path: PathBuf) -> Result<Self> {
        let root = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<Value>(&content)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Value::Table(Default::default())
        };
        if root.as_table().is_none() {
            bail!("top-level TOML must be a table in {}", path.display());
        }
        Ok(Self { path, root })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Profile names, sorted, including a bare `[default]` section.
    pub fn profile_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.bare_default_table().is_some() {
            names.push(DEFAULT_PROFILE.to_string());
        }
        if let Some(profiles) = self.root.get("profile").and_then(Value::as_table) {
            for (name, value) in profiles {
                if value.is_table() {
                    names.push(name.clone());
                }
            }
        }
        names.sort();
        names.dedup();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profile_table(name).is_some()
    }

    /// Look up one profile. A bare `[default]` section wins over
    /// `[profile.default]` when both exist.
    pub fn profile(&self, name: &str) -> Option<Profile> {
        let table = self.profile_table(name)?;
        Value::Table(table.clone()).try_into().ok()
    }

    pub fn current_profile(&self) -> String {
        self.root
            .get("zotcli")
            .and_then(|section| section.get("current_profile"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_PROFILE)
            .to_string()
    }

    pub fn set_current_profile(&mut self, name: &str) -> Result<()> {
        if !self.contains(name) {
            bail!("Profile '{name}' does not exist.");
        }
        let section = self.section_mut("zotcli")?;
        section.insert(
            "current_profile".to_string(),
            Value::String(name.to_string()),
        );
        Ok(())
    }

    /// Create or replace a profile's known keys, leaving unknown keys in the
    /// section untouched.
    pub fn upsert_profile(&mut self, name: &str, profile: &Profile) -> Result<()> {
        let rendered =
            Value::try_from(profile.clone()).context("failed to serialize profile")?;
        let rendered = rendered
            .as_table()
            .context("profile did not serialize to a table")?
            .clone();
        let table = self.profile_table_mut(name)?;
        for key in PROFILE_KEYS {
            match rendered.get(*key) {
                Some(value) => {
                    table.insert((*key).to_string(), value.clone());
                }
                None => {
                    table.remove(*key);
                }
            }
        }
        Ok(())
    }

    /// Read a single key as display text. Booleans render as `true`/`false`.
    pub fn get_value(&self, profile: &str, key: &str) -> Option<String> {
        let table = self.profile_table(profile)?;
        let value = table.get(key)?;
        Some(match value {
            Value::String(text) => text.clone(),
            Value::Boolean(flag) => flag.to_string(),
            Value::Integer(number) => number.to_string(),
            other => other.to_string(),
        })
    }

    /// Set a single known key, parsing `local_zotero` as a boolean and
    /// validating `library_type`.
    pub fn set_value(&mut self, profile: &str, key: &str, raw: &str) -> Result<()> {
        if !PROFILE_KEYS.contains(&key) {
            bail!(
                "Unknown profile key '{key}' (expected one of: {})",
                PROFILE_KEYS.join(", ")
            );
        }
        let value = match key {
            "local_zotero" => Value::Boolean(parse_bool(raw)?),
            "library_type" => {
                let normalized = raw.trim().to_lowercase();
                if normalized != "user" && normalized != "group" {
                    bail!("library_type must be 'user' or 'group', got '{raw}'");
                }
                Value::String(normalized)
            }
            _ => Value::String(raw.to_string()),
        };
        let table = self.profile_table_mut(profile)?;
        table.insert(key.to_string(), value);
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let parent = self
            .path
            .parent()
            .with_context(|| format!("config path has no parent: {}", self.path.display()))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
        let rendered =
            toml::to_string_pretty(&self.root).context("failed to serialize config TOML")?;
        fs::write(&self.path, rendered)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }

    /// Resolve connection settings: CLI flags > environment > profile > defaults.
    pub fn resolve_settings(&self, overrides: &ProfileOverrides) -> ResolvedSettings {
        let profile_name = overrides
            .profile
            .clone()
            .unwrap_or_else(|| self.current_profile());
        let profile = self.profile(&profile_name).unwrap_or_default();

        let local = overrides
            .local
            .unwrap_or(profile.local_zotero);
        let library_type = overrides
            .library_type
            .clone()
            .or_else(|| env_value("ZOTERO_LIBRARY_TYPE"))
            .or(profile.library_type)
            .unwrap_or_else(|| "user".to_string());

        ResolvedSettings {
            profile: profile_name,
            library_id: overrides
                .library_id
                .clone()
                .or_else(|| env_value("ZOTERO_LIBRARY_ID"))
                .or(profile.library_id),
            // The local HTTP server only exposes the user library.
            library_type: if local {
                "user".to_string()
            } else {
                library_type
            },
            api_key: overrides
                .api_key
                .clone()
                .or_else(|| env_value("ZOTERO_API_KEY"))
                .or(profile.api_key),
            locale: overrides
                .locale
                .clone()
                .or(profile.locale)
                .unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            local,
        }
    }

    fn bare_default_table(&self) -> Option<&toml::value::Table> {
        self.root.get(DEFAULT_PROFILE).and_then(Value::as_table)
    }

    fn profile_table(&self, name: &str) -> Option<&toml::value::Table> {
        if name == DEFAULT_PROFILE
            && let Some(table) = self.bare_default_table()
        {
            return Some(table);
        }
        self.root
            .get("profile")?
            .get(name)?
            .as_table()
    }

    fn profile_table_mut(&mut self, name: &str) -> Result<&mut toml::value::Table> {
        if name == DEFAULT_PROFILE && self.bare_default_table().is_some() {
            return self
                .root
                .as_table_mut()
                .and_then(|root| root.get_mut(DEFAULT_PROFILE))
                .and_then(Value::as_table_mut)
                .context("[default] must be a table");
        }
        let profiles = self.section_mut("profile")?;
        let entry = profiles
            .entry(name.to_string())
            .or_insert_with(|| Value::Table(Default::default()));
        entry
            .as_table_mut()
            .with_context(|| format!("[profile.{name}] must be a table"))
    }

    fn section_mut(&mut self, name: &str) -> Result<&mut toml::value::Table> {
        let root = self
            .root
            .as_table_mut()
            .context("top-level TOML must be a table")?;
        let entry = root
            .entry(name.to_string())
            .or_insert_with(|| Value::Table(Default::default()));
        entry
            .as_table_mut()
            .with_context(|| format!("[{name}] must be a table"))
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean value, got '{other}'"),
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_with(content: &str) -> (tempfile::TempDir, ProfileStore) {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, content).expect("write config");
        let store = ProfileStore::load(path).expect("load store");
        (temp, store)
    }

    #[test]
    fn missing_file_yields_empty_store() {
        let store =
            ProfileStore::load(PathBuf::from("/nonexistent/zotcli/config.toml")).expect("load");
        assert!(store.profile_names().is_empty());
        assert_eq!(store.current_profile(), "default");
        assert!(store.profile("default").is_none());
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[profile.broken\napi_key = \"oops\"").expect("write");
        let error = ProfileStore::load(path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn parses_profile_sections_and_pointer() {
        let (_dir, store) = store_with(
            r#"
[zotcli]
current_profile = "work"

[profile.work]
library_id = "12345"
library_type = "group"
api_key = "k-work"
locale = "de-DE"
local_zotero = false

[profile.home]
library_id = "99"
library_type = "user"
api_key = "k-home"
"#,
        );
        assert_eq!(store.profile_names(), vec!["home", "work"]);
        assert_eq!(store.current_profile(), "work");
        let work = store.profile("work").expect("work profile");
        assert_eq!(work.library_id.as_deref(), Some("12345"));
        assert_eq!(work.library_type.as_deref(), Some("group"));
        assert_eq!(work.locale.as_deref(), Some("de-DE"));
        assert!(!work.local_zotero);
    }

    #[test]
    fn bare_default_section_wins_over_profile_default() {
        let (_dir, store) = store_with(
            r#"
[default]
library_id = "bare"

[profile.default]
library_id = "nested"
"#,
        );
        let profile = store.profile("default").expect("default profile");
        assert_eq!(profile.library_id.as_deref(), Some("bare"));
        assert_eq!(store.profile_names(), vec!["default"]);
    }

    #[test]
    fn set_current_profile_rejects_unknown_names() {
        let (_dir, mut store) = store_with("[profile.alpha]\napi_key = \"k\"\n");
        let error = store
            .set_current_profile("nonexistent")
            .expect_err("must fail");
        assert!(error.to_string().contains("does not exist"));
        store.set_current_profile("alpha").expect("set current");
        assert_eq!(store.current_profile(), "alpha");
    }

    #[test]
    fn writes_preserve_unrelated_sections() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "[paths]\ncache = \"/tmp/zot\"\n\n[profile.alpha]\napi_key = \"old\"\ncustom_note = \"keep me\"\n",
        )
        .expect("write config");

        let mut store = ProfileStore::load(path.clone()).expect("load");
        store.set_value("alpha", "api_key", "new").expect("set");
        store.save().expect("save");

        let reloaded = ProfileStore::load(path).expect("reload");
        assert_eq!(
            reloaded.get_value("alpha", "api_key").as_deref(),
            Some("new")
        );
        assert_eq!(
            reloaded.get_value("alpha", "custom_note").as_deref(),
            Some("keep me")
        );
        assert_eq!(
            reloaded
                .root
                .get("paths")
                .and_then(|paths| paths.get("cache"))
                .and_then(Value::as_str),
            Some("/tmp/zot")
        );
    }

    #[test]
    fn set_value_validates_keys_and_booleans() {
        let (_dir, mut store) = store_with("[profile.alpha]\n");
        assert!(store.set_value("alpha", "bogus", "x").is_err());
        assert!(store.set_value("alpha", "library_type", "shelf").is_err());

        store.set_value("alpha", "local_zotero", "1").expect("set");
        assert_eq!(
            store.get_value("alpha", "local_zotero").as_deref(),
            Some("true")
        );
        store
            .set_value("alpha", "local_zotero", "no")
            .expect("set again");
        assert_eq!(
            store.get_value("alpha", "local_zotero").as_deref(),
            Some("false")
        );
    }

    #[test]
    fn upsert_profile_round_trips() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let mut store = ProfileStore::load(path.clone()).expect("load");
        store
            .upsert_profile(
                "research",
                &Profile {
                    library_id: Some("777".to_string()),
                    library_type: Some("user".to_string()),
                    api_key: Some("secret".to_string()),
                    locale: Some("en-GB".to_string()),
                    local_zotero: true,
                },
            )
            .expect("upsert");
        store.set_current_profile("research").expect("set current");
        store.save().expect("save");

        let reloaded = ProfileStore::load(path).expect("reload");
        let profile = reloaded.profile("research").expect("profile");
        assert_eq!(profile.library_id.as_deref(), Some("777"));
        assert!(profile.local_zotero);
        assert_eq!(reloaded.current_profile(), "research");
    }

    #[test]
    fn resolve_settings_prefers_overrides_over_profile() {
        let (_dir, store) = store_with(
            r#"
[zotcli]
current_profile = "alpha"

[profile.alpha]
library_id = "111"
library_type = "group"
api_key = "profile-key"
locale = "fr-FR"
"#,
        );
        let settings = store.resolve_settings(&ProfileOverrides {
            library_id: Some("222".to_string()),
            api_key: Some("flag-key".to_string()),
            ..Default::default()
        });
        assert_eq!(settings.profile, "alpha");
        assert_eq!(settings.library_id.as_deref(), Some("222"));
        assert_eq!(settings.library_type, "group");
        assert_eq!(settings.api_key.as_deref(), Some("flag-key"));
        assert_eq!(settings.locale, "fr-FR");
        assert!(!settings.local);
    }

    #[test]
    fn local_mode_forces_user_library() {
        let (_dir, store) = store_with(
            "[profile.alpha]\nlibrary_type = \"group\"\nlocal_zotero = true\nlibrary_id = \"5\"\n",
        );
        let settings = store.resolve_settings(&ProfileOverrides {
            profile: Some("alpha".to_string()),
            ..Default::default()
        });
        assert!(settings.local);
        assert_eq!(settings.library_type, "user");
    }

    #[test]
    fn defaults_apply_for_unconfigured_profile() {
        let (_dir, store) = store_with("");
        let settings = store.resolve_settings(&ProfileOverrides::default());
        assert_eq!(settings.profile, "default");
        assert_eq!(settings.locale, DEFAULT_LOCALE);
        assert!(!settings.local);
    }
}
