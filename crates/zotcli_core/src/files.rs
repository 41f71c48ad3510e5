use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::ZoteroClient;
use crate::error::{Result, ZoteroError};
use crate::items::created_keys;

/// One entry of a batch-upload manifest.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub local_path: String,
    pub zotero_filename: Option<String>,
    pub parent_item_id: Option<String>,
    pub existing_attachment_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Uploaded,
    Unchanged,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub filename: String,
    pub key: Option<String>,
    pub status: UploadStatus,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadReport {
    pub uploaded: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub results: Vec<UploadOutcome>,
}

impl UploadReport {
    fn record(&mut self, outcome: UploadOutcome) {
        match outcome.status {
            UploadStatus::Uploaded => self.uploaded += 1,
            UploadStatus::Unchanged => self.unchanged += 1,
            UploadStatus::Failed => self.failed += 1,
        }
        self.results.push(outcome);
    }
}

impl ZoteroClient {
    /// Download an attachment's file into `dir`.
    ///
    /// Without an explicit filename the attachment item's stored filename is
    /// used, falling back to its title and finally the key.
    pub fn download_attachment(
        &mut self,
        key: &str,
        dir: &Path,
        filename: Option<String>,
    ) -> Result<PathBuf> {
        let filename = match filename {
            Some(filename) => filename,
            None => {
                let item = self.item(key)?;
                attachment_filename(&item, key)
            }
        };
        let url = self.library_path(&format!("/items/{key}/file"));
        let response = self.get_raw(&url)?;
        let bytes = response.bytes()?;
        fs::create_dir_all(dir)?;
        let target = dir.join(filename);
        fs::write(&target, &bytes)?;
        Ok(target)
    }

    /// Upload a local file as the stored file of an existing attachment
    /// item, using the authorize / upload / register protocol.
    pub fn upload_attachment_file(
        &mut self,
        item_key: &str,
        local_path: &Path,
        display_filename: Option<&str>,
    ) -> Result<UploadStatus> {
        let bytes = fs::read(local_path)?;
        let digest = format!("{:x}", md5::compute(&bytes));
        let filename = display_filename
            .map(ToString::to_string)
            .or_else(|| {
                local_path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
            })
            .ok_or_else(|| {
                ZoteroError::InvalidInput(format!(
                    "cannot derive a filename from {}",
                    local_path.display()
                ))
            })?;
        let mtime_ms = fs::metadata(local_path)?
            .modified()
            .ok()
            .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
            .map(|duration| duration.as_millis().min(u128::from(u64::MAX)) as u64)
            .unwrap_or(0);

        // The conditional header must match the file currently on the
        // server: If-Match with its md5 when one exists, If-None-Match
        // otherwise.
        let item = self.item(item_key)?;
        let existing_md5 = item
            .get("data")
            .and_then(|data| data.get("md5"))
            .and_then(Value::as_str)
            .map(ToString::to_string);
        let if_none_match = existing_md5.is_none();

        let url = self.library_path(&format!("/items/{item_key}/file"));
        let form = vec![
            ("md5".to_string(), digest),
            ("filename".to_string(), filename),
            ("filesize".to_string(), bytes.len().to_string()),
            ("mtime".to_string(), mtime_ms.to_string()),
        ];
        let authorization: Value = self
            .post_form(&url, &form, existing_md5.clone(), if_none_match)?
            .json()?;

        if authorization.get("exists").and_then(Value::as_u64) == Some(1) {
            return Ok(UploadStatus::Unchanged);
        }

        let upload_url = required_str(&authorization, "url")?;
        let content_type = required_str(&authorization, "contentType")?;
        let prefix = required_str(&authorization, "prefix")?;
        let suffix = required_str(&authorization, "suffix")?;
        let upload_key = required_str(&authorization, "uploadKey")?;

        let mut body = Vec::with_capacity(prefix.len() + bytes.len() + suffix.len());
        body.extend_from_slice(prefix.as_bytes());
        body.extend_from_slice(&bytes);
        body.extend_from_slice(suffix.as_bytes());
        self.post_external(&upload_url, body, &content_type)?;

        let register = vec![("upload".to_string(), upload_key)];
        self.post_form(&url, &register, existing_md5, if_none_match)?;
        Ok(UploadStatus::Uploaded)
    }

    /// Create attachment items for local files and upload their content.
    /// `files` pairs an optional display name with a path.
    pub fn upload_new_attachments(
        &mut self,
        files: &[(Option<String>, PathBuf)],
        parent: Option<&str>,
    ) -> Result<UploadReport> {
        let mut report = UploadReport::default();
        for (display_name, path) in files {
            let filename = display_name
                .clone()
                .or_else(|| {
                    path.file_name()
                        .map(|name| name.to_string_lossy().to_string())
                })
                .unwrap_or_else(|| path.display().to_string());
            match self.create_and_upload(&filename, path, parent) {
                Ok((key, status)) => report.record(UploadOutcome {
                    filename,
                    key: Some(key),
                    status,
                    detail: None,
                }),
                Err(error) => report.record(UploadOutcome {
                    filename,
                    key: None,
                    status: UploadStatus::Failed,
                    detail: Some(error.to_string()),
                }),
            }
        }
        Ok(report)
    }

    /// Drive a batch manifest: existing attachment keys get a plain upload,
    /// the rest get a fresh attachment item first.
    pub fn upload_from_manifest(&mut self, entries: &[ManifestEntry]) -> Result<UploadReport> {
        let mut report = UploadReport::default();
        for entry in entries {
            let path = PathBuf::from(&entry.local_path);
            let filename = entry
                .zotero_filename
                .clone()
                .or_else(|| {
                    path.file_name()
                        .map(|name| name.to_string_lossy().to_string())
                })
                .unwrap_or_else(|| entry.local_path.clone());
            if !path.is_file() {
                report.record(UploadOutcome {
                    filename,
                    key: entry.existing_attachment_key.clone(),
                    status: UploadStatus::Failed,
                    detail: Some(format!("local file not found: {}", entry.local_path)),
                });
                continue;
            }

            let result = match &entry.existing_attachment_key {
                Some(key) => self
                    .upload_attachment_file(key, &path, Some(&filename))
                    .map(|status| (key.clone(), status)),
                None => self.create_and_upload(&filename, &path, entry.parent_item_id.as_deref()),
            };
            match result {
                Ok((key, status)) => report.record(UploadOutcome {
                    filename,
                    key: Some(key),
                    status,
                    detail: None,
                }),
                Err(error) => report.record(UploadOutcome {
                    filename,
                    key: entry.existing_attachment_key.clone(),
                    status: UploadStatus::Failed,
                    detail: Some(error.to_string()),
                }),
            }
        }
        Ok(report)
    }

    fn create_and_upload(
        &mut self,
        filename: &str,
        path: &Path,
        parent: Option<&str>,
    ) -> Result<(String, UploadStatus)> {
        let mut template = self.item_template("attachment", Some("imported_file"))?;
        if let Some(object) = template.as_object_mut() {
            object.insert("title".to_string(), Value::String(filename.to_string()));
            object.insert("filename".to_string(), Value::String(filename.to_string()));
            if let Some(parent) = parent {
                object.insert("parentItem".to_string(), Value::String(parent.to_string()));
            }
        }
        let response = self.create_items(vec![template])?;
        let key = created_keys(&response).into_iter().next().ok_or_else(|| {
            ZoteroError::InvalidInput(format!(
                "server did not return a key for new attachment '{filename}'"
            ))
        })?;
        let status = self.upload_attachment_file(&key, path, Some(filename))?;
        Ok((key, status))
    }
}

fn attachment_filename(item: &Value, key: &str) -> String {
    item.get("data")
        .and_then(|data| {
            data.get("filename")
                .or_else(|| data.get("title"))
                .and_then(Value::as_str)
        })
        .filter(|name| !name.trim().is_empty())
        .map(ToString::to_string)
        .unwrap_or_else(|| key.to_string())
}

fn required_str(value: &Value, field: &str) -> Result<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| {
            ZoteroError::InvalidInput(format!(
                "upload authorization response is missing '{field}'"
            ))
        })
}
