use serde_json::Value;

use crate::client::{SearchParams, ZoteroClient};
use crate::error::{Result, ZoteroError};

/// Most tag names the API deletes per request.
pub const MAX_TAG_DELETE_BATCH: usize = 50;

impl ZoteroClient {
    pub fn tags(&mut self, params: &SearchParams) -> Result<Value> {
        let path = self.library_path("/tags");
        self.get_json(&path, params)
    }

    pub fn item_tags(&mut self, key: &str, params: &SearchParams) -> Result<Value> {
        let path = self.library_path(&format!("/items/{key}/tags"));
        self.get_json(&path, params)
    }

    /// Delete up to [`MAX_TAG_DELETE_BATCH`] tags in one versioned call.
    /// Names are joined with `||` per the API's delete syntax.
    pub fn delete_tags(&mut self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        if names.len() > MAX_TAG_DELETE_BATCH {
            return Err(ZoteroError::InvalidInput(format!(
                "at most {MAX_TAG_DELETE_BATCH} tags per delete request, got {}",
                names.len()
            )));
        }
        let version = self.ensure_library_version()?;
        let path = self.library_path("/tags");
        self.delete(
            &path,
            vec![("tag".to_string(), names.join("||"))],
            version,
        )
    }
}
