use serde_json::Value;

use crate::client::{SearchParams, ZoteroClient};
use crate::error::{Result, ZoteroError};

/// Most keys the write API accepts per multi-object request.
pub const MAX_WRITE_BATCH: usize = 50;

impl ZoteroClient {
    pub fn items(&mut self, params: &SearchParams) -> Result<Value> {
        let path = self.library_path("/items");
        self.get_json(&path, params)
    }

    pub fn items_top(&mut self, params: &SearchParams) -> Result<Value> {
        let path = self.library_path("/items/top");
        self.get_json(&path, params)
    }

    pub fn trash(&mut self, params: &SearchParams) -> Result<Value> {
        let path = self.library_path("/items/trash");
        self.get_json(&path, params)
    }

    pub fn item(&mut self, key: &str) -> Result<Value> {
        let path = self.library_path(&format!("/items/{key}"));
        self.get_json(&path, &SearchParams::default())
    }

    pub fn item_children(&mut self, key: &str, params: &SearchParams) -> Result<Value> {
        let path = self.library_path(&format!("/items/{key}/children"));
        self.get_json(&path, params)
    }

    /// Keys of objects deleted from the library since a version.
    pub fn deleted(&mut self, since: &str) -> Result<Value> {
        let path = self.library_path("/deleted");
        let params = SearchParams {
            since: Some(since.to_string()),
            ..Default::default()
        };
        self.get_json(&path, &params)
    }

    /// Map of item key to library version.
    pub fn item_versions(&mut self, params: &SearchParams) -> Result<Value> {
        let path = self.library_path("/items");
        self.get_json(&path, &params.clone().with_format("versions"))
    }

    /// Total number of items, read from the `Total-Results` header of a
    /// one-item page.
    pub fn count_items(&mut self) -> Result<u64> {
        let path = self.library_path("/items");
        let params = SearchParams {
            limit: Some(1),
            ..Default::default()
        };
        self.get_json(&path, &params)?;
        self.last_total_results().ok_or_else(|| {
            ZoteroError::InvalidInput("server did not report a result count".to_string())
        })
    }

    /// New-object template for an item type, optionally with an attachment
    /// link mode. Library independent.
    pub fn item_template(&mut self, item_type: &str, link_mode: Option<&str>) -> Result<Value> {
        let mut path = self.global_path(&format!("/items/new?itemType={item_type}"));
        if let Some(link_mode) = link_mode {
            path.push_str(&format!("&linkMode={link_mode}"));
        }
        self.get_json(&path, &SearchParams::default())
    }

    pub fn create_items(&mut self, payloads: Vec<Value>) -> Result<Value> {
        if payloads.len() > MAX_WRITE_BATCH {
            return Err(ZoteroError::InvalidInput(format!(
                "at most {MAX_WRITE_BATCH} items per create request, got {}",
                payloads.len()
            )));
        }
        let path = self.library_path("/items");
        self.post_json(&path, &Value::Array(payloads), None)
    }

    /// Partial update of one item. `version` guards against lost writes.
    pub fn update_item(&mut self, key: &str, patch: &Value, version: u64) -> Result<()> {
        let path = self.library_path(&format!("/items/{key}"));
        self.patch_json(&path, patch, version)
    }

    pub fn delete_item(&mut self, key: &str, version: u64) -> Result<()> {
        let path = self.library_path(&format!("/items/{key}"));
        self.delete(&path, Vec::new(), version)
    }

    pub fn delete_items(&mut self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        if keys.len() > MAX_WRITE_BATCH {
            return Err(ZoteroError::InvalidInput(format!(
                "at most {MAX_WRITE_BATCH} items per delete request, got {}",
                keys.len()
            )));
        }
        let version = self.ensure_library_version()?;
        let path = self.library_path("/items");
        self.delete(
            &path,
            vec![("itemKey".to_string(), keys.join(","))],
            version,
        )
    }

    /// Bibliography passthrough: the server renders, we relay the text.
    pub fn items_bib(
        &mut self,
        keys: &[String],
        format: &str,
        style: Option<&str>,
    ) -> Result<String> {
        let path = self.library_path("/items");
        let locale = self.locale().to_string();
        let params = SearchParams {
            item_keys: Some(keys.join(",")),
            format: Some(format.to_string()),
            style: style.map(ToString::to_string),
            locale: Some(locale),
            ..Default::default()
        };
        self.get_text(&path, &params)
    }
}

/// Pull the created object keys out of a write response
/// (`{"success": {"0": "KEY"}, ...}`), in index order.
pub fn created_keys(response: &Value) -> Vec<String> {
    let mut indexed = response
        .get("success")
        .and_then(Value::as_object)
        .map(|success| {
            success
                .iter()
                .filter_map(|(index, key)| {
                    Some((index.parse::<usize>().ok()?, key.as_str()?.to_string()))
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, key)| key).collect()
}

/// Failure messages from a write response, keyed by input index.
pub fn failed_messages(response: &Value) -> Vec<(String, String)> {
    response
        .get("failed")
        .and_then(Value::as_object)
        .map(|failed| {
            failed
                .iter()
                .map(|(index, entry)| {
                    let message = entry
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string();
                    (index.clone(), message)
                })
                .collect()
        })
        .unwrap_or_default()
}
