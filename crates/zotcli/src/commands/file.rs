use std::env;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use zotcli_core::ZoteroError;
use zotcli_core::files::{ManifestEntry, UploadReport, UploadStatus};

use super::{AppContext, load_json_input};

#[derive(Debug, Args)]
pub struct FileArgs {
    #[command(subcommand)]
    command: FileCommand,
}

#[derive(Debug, Subcommand)]
enum FileCommand {
    #[command(about = "Download a file attachment")]
    Download {
        item_key: String,
        #[arg(
            short = 'o',
            long,
            value_name = "PATH",
            help = "Target directory or file path; defaults to the current \
                    directory with the original filename"
        )]
        output: Option<PathBuf>,
    },
    #[command(about = "Upload files as new attachments")]
    Upload {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
        #[arg(long, value_name = "KEY", help = "Item to attach the files to")]
        parent_item_id: Option<String>,
        #[arg(
            long,
            value_name = "NAME",
            help = "Filename to use in Zotero; single-file uploads only"
        )]
        filename: Option<String>,
    },
    #[command(name = "upload-batch", about = "Upload files from a JSON manifest")]
    UploadBatch {
        #[arg(long = "json", value_name = "PATH", help = "Path to the manifest file")]
        manifest: PathBuf,
    },
}

pub fn run(ctx: &AppContext, args: FileArgs) -> Result<()> {
    match args.command {
        FileCommand::Download { item_key, output } => {
            let (dir, filename) = resolve_download_target(output)?;
            let mut client = ctx.client()?;
            match client.download_attachment(&item_key, &dir, filename) {
                Ok(path) => {
                    println!("File downloaded to: {}", path.display());
                    Ok(())
                }
                Err(error) => {
                    if matches!(error, ZoteroError::NotFound { .. }) {
                        eprintln!(
                            "Hint: ensure '{item_key}' is the key of an attachment item, \
                             not its parent item."
                        );
                    }
                    Err(error.into())
                }
            }
        }
        FileCommand::Upload {
            paths,
            parent_item_id,
            filename,
        } => {
            for path in &paths {
                if !path.is_file() {
                    bail!("local file not found: {}", path.display());
                }
            }
            if filename.is_some() && paths.len() > 1 {
                eprintln!(
                    "Warning: --filename is ignored when uploading multiple files; \
                     original filenames will be used."
                );
            }
            let files = paths
                .iter()
                .enumerate()
                .map(|(index, path)| {
                    let display = if index == 0 && paths.len() == 1 {
                        filename.clone()
                    } else {
                        None
                    };
                    (display, path.clone())
                })
                .collect::<Vec<_>>();
            let mut client = ctx.client()?;
            let report = client.upload_new_attachments(&files, parent_item_id.as_deref())?;
            print_report(&report);
            Ok(())
        }
        FileCommand::UploadBatch { manifest } => {
            let manifest_path = manifest.to_string_lossy().to_string();
            let parsed = load_json_input(&manifest_path)?;
            let entries: Vec<ManifestEntry> = serde_json::from_value(parsed)
                .map_err(|error| anyhow::anyhow!("invalid manifest: {error}"))?;
            if entries.is_empty() {
                println!("No valid attachments to upload after processing manifest.");
                return Ok(());
            }
            let mut client = ctx.client()?;
            let report = client.upload_from_manifest(&entries)?;
            print_report(&report);
            Ok(())
        }
    }
}

fn resolve_download_target(output: Option<PathBuf>) -> Result<(PathBuf, Option<String>)> {
    let cwd = env::current_dir()?;
    match output {
        None => Ok((cwd, None)),
        Some(path) => {
            if path.is_dir() {
                return Ok((path, None));
            }
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().to_string());
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => cwd,
            };
            Ok((dir, filename))
        }
    }
}

fn print_report(report: &UploadReport) {
    println!("Upload results:");
    for outcome in &report.results {
        let key = outcome.key.as_deref().unwrap_or("-");
        match outcome.status {
            UploadStatus::Uploaded => {
                println!("  Successfully uploaded: {} (Key: {key})", outcome.filename);
            }
            UploadStatus::Unchanged => {
                println!(
                    "  File for {} was unchanged on the server (Key: {key}).",
                    outcome.filename
                );
            }
            UploadStatus::Failed => {
                eprintln!(
                    "  Failed to upload: {}. Reason: {}",
                    outcome.filename,
                    outcome.detail.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_output_downloads_into_cwd() {
        let (dir, filename) = resolve_download_target(None).expect("target");
        assert_eq!(dir, env::current_dir().expect("cwd"));
        assert!(filename.is_none());
    }

    #[test]
    fn directory_output_keeps_original_filename() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (dir, filename) =
            resolve_download_target(Some(temp.path().to_path_buf())).expect("target");
        assert_eq!(dir, temp.path());
        assert!(filename.is_none());
    }

    #[test]
    fn file_output_splits_into_dir_and_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        let target = temp.path().join("renamed.pdf");
        let (dir, filename) = resolve_download_target(Some(target)).expect("target");
        assert_eq!(dir, temp.path());
        assert_eq!(filename.as_deref(), Some("renamed.pdf"));
    }

    #[test]
    fn bare_filename_lands_in_cwd() {
        let (dir, filename) =
            resolve_download_target(Some(PathBuf::from("renamed.pdf"))).expect("target");
        assert_eq!(dir, env::current_dir().expect("cwd"));
        assert_eq!(filename.as_deref(), Some("renamed.pdf"));
    }
}
