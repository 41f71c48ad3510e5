use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command wired to an isolated config file, with any ambient Zotero
/// credentials stripped.
fn zot(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("zot").expect("binary");
    cmd.env("ZOTCLI_CONFIG", config)
        .env_remove("ZOTERO_API_KEY")
        .env_remove("ZOTERO_LIBRARY_ID")
        .env_remove("ZOTERO_LIBRARY_TYPE")
        .env_remove("ZOTERO_API_BASE_URL");
    cmd
}

fn temp_config() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.toml");
    (dir, path)
}

fn setup_profile(config: &Path, name: &str, library_id: &str) {
    zot(config)
        .args([
            "configure",
            "setup",
            "--no-interaction",
            "--profile",
            name,
            "--library-id",
            library_id,
            "--library-type",
            "user",
            "--api-key",
            &format!("key-{name}"),
            "--locale",
            "en-GB",
        ])
        .assert()
        .success();
}

#[test]
fn help_shows_usage() {
    let (_dir, config) = temp_config();
    zot(&config)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: zot"))
        .stdout(predicate::str::contains(
            "A command line client for Zotero libraries",
        ));
}

#[test]
fn list_profiles_without_config_shows_implicit_default() {
    let (_dir, config) = temp_config();
    zot(&config)
        .args(["configure", "list-profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "* default (active, not explicitly configured)",
        ));
}

#[test]
fn current_profile_without_config_is_default() {
    let (_dir, config) = temp_config();
    zot(&config)
        .args(["configure", "current-profile"])
        .assert()
        .success()
        .stdout(predicate::str::diff("default\n"));
}

#[test]
fn setup_writes_profile_section_and_pointer() {
    let (_dir, config) = temp_config();
    zot(&config)
        .args([
            "configure",
            "setup",
            "--no-interaction",
            "--profile",
            "testprofile",
            "--library-id",
            "test_library_id",
            "--library-type",
            "user",
            "--api-key",
            "test_api_key",
            "--locale",
            "en-GB",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuring profile: testprofile"))
        .stdout(predicate::str::contains(
            "Configuration for profile 'testprofile' saved",
        ));

    let content = fs::read_to_string(&config).expect("config written");
    let parsed: toml::Value = toml::from_str(&content).expect("valid TOML");
    let profile = &parsed["profile"]["testprofile"];
    assert_eq!(profile["library_id"].as_str(), Some("test_library_id"));
    assert_eq!(profile["library_type"].as_str(), Some("user"));
    assert_eq!(profile["api_key"].as_str(), Some("test_api_key"));
    assert_eq!(profile["locale"].as_str(), Some("en-GB"));
    assert_eq!(profile["local_zotero"].as_bool(), Some(false));
    assert_eq!(
        parsed["zotcli"]["current_profile"].as_str(),
        Some("testprofile")
    );
}

#[test]
fn set_and_get_round_trip() {
    let (_dir, config) = temp_config();
    setup_profile(&config, "myprof", "test_id");

    zot(&config)
        .args(["configure", "set", "library_id", "new_lib_id", "--profile", "myprof"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Set 'library_id' to 'new_lib_id' for profile 'myprof'",
        ));

    zot(&config)
        .args(["configure", "get", "library_id", "--profile", "myprof"])
        .assert()
        .success()
        .stdout(predicate::str::diff("new_lib_id\n"));
}

#[test]
fn local_zotero_values_parse_as_booleans() {
    let (_dir, config) = temp_config();
    setup_profile(&config, "myprof", "id");

    zot(&config)
        .args(["configure", "set", "local_zotero", "true", "--profile", "myprof"])
        .assert()
        .success();
    zot(&config)
        .args(["configure", "get", "local_zotero", "--profile", "myprof"])
        .assert()
        .success()
        .stdout(predicate::str::diff("true\n"));

    zot(&config)
        .args(["configure", "set", "local_zotero", "0", "--profile", "myprof"])
        .assert()
        .success();
    zot(&config)
        .args(["configure", "get", "local_zotero", "--profile", "myprof"])
        .assert()
        .success()
        .stdout(predicate::str::diff("false\n"));
}

#[test]
fn get_missing_key_is_handled_with_exit_zero() {
    let (_dir, config) = temp_config();
    setup_profile(&config, "another", "id");

    zot(&config)
        .args(["configure", "get", "non_existent_key", "--profile", "another"])
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "Key 'non_existent_key' not found in profile 'another'",
        ));
}

#[test]
fn set_rejects_unknown_keys() {
    let (_dir, config) = temp_config();
    setup_profile(&config, "p", "id");

    zot(&config)
        .args(["configure", "set", "bogus_key", "x", "--profile", "p"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Unknown profile key 'bogus_key'"));
}

#[test]
fn list_profiles_marks_the_active_one() {
    let (_dir, config) = temp_config();
    setup_profile(&config, "test1", "id1");
    setup_profile(&config, "test2", "id2");

    zot(&config)
        .args(["configure", "current-profile", "test1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Active profile set to: test1"));

    zot(&config)
        .args(["configure", "list-profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* test1 (active)"))
        .stdout(predicate::str::contains("  test2"));
}

#[test]
fn switching_to_missing_profile_is_handled_and_keeps_current() {
    let (_dir, config) = temp_config();
    setup_profile(&config, "prof1", "id1");
    setup_profile(&config, "prof2", "id2");

    // prof2 was configured last, so it is current.
    zot(&config)
        .args(["configure", "current-profile"])
        .assert()
        .success()
        .stdout(predicate::str::diff("prof2\n"));

    zot(&config)
        .args(["configure", "current-profile", "prof1"])
        .assert()
        .success();

    zot(&config)
        .args(["configure", "current-profile", "nonexistent"])
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "Profile 'nonexistent' does not exist",
        ));

    zot(&config)
        .args(["configure", "current-profile"])
        .assert()
        .success()
        .stdout(predicate::str::diff("prof1\n"));
}

#[test]
fn writes_preserve_foreign_sections() {
    let (_dir, config) = temp_config();
    fs::write(
        &config,
        "[paths]\ncache = \"/tmp/zot-cache\"\n\n[profile.alpha]\napi_key = \"old\"\n",
    )
    .expect("seed config");

    zot(&config)
        .args(["configure", "set", "api_key", "new", "--profile", "alpha"])
        .assert()
        .success();

    let content = fs::read_to_string(&config).expect("config");
    let parsed: toml::Value = toml::from_str(&content).expect("valid TOML");
    assert_eq!(parsed["paths"]["cache"].as_str(), Some("/tmp/zot-cache"));
    assert_eq!(parsed["profile"]["alpha"]["api_key"].as_str(), Some("new"));
}

#[test]
fn unknown_output_format_is_a_usage_error() {
    let (_dir, config) = temp_config();
    zot(&config)
        .args(["item", "list", "--output", "bogus"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn top_and_trash_are_mutually_exclusive() {
    let (_dir, config) = temp_config();
    zot(&config)
        .args(["item", "list", "--top", "--trash"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn missing_credentials_fail_before_any_request() {
    let (_dir, config) = temp_config();
    zot(&config)
        .args(["item", "list"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Library ID is not configured"));
}

#[test]
fn missing_api_key_is_reported_when_library_id_is_present() {
    let (_dir, config) = temp_config();
    zot(&config)
        .args(["--library-id", "123", "item", "list"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("API Key is not configured"));
}

#[test]
fn no_interaction_refuses_destructive_commands_without_force() {
    let (_dir, config) = temp_config();
    zot(&config)
        .args(["--no-interaction", "tag", "delete", "obsolete-tag"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn invalid_item_json_fails_without_credentials() {
    let (_dir, config) = temp_config();
    zot(&config)
        .args(["item", "create", "--from-json", "{not json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not valid JSON"));
}

#[test]
fn search_conditions_are_validated_for_shape() {
    let (_dir, config) = temp_config();
    zot(&config)
        .args([
            "search",
            "create",
            "--name",
            "my-search",
            "--conditions-json",
            r#"[{"condition": "title", "operator": "contains"}]"#,
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("missing 'value'"));
}

#[test]
fn group_alias_resolves_to_the_same_command() {
    let (_dir, config) = temp_config();
    zot(&config)
        .args(["groups", "list"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Library ID is not configured"));
}
