use serde_json::Value;

use crate::client::{SearchParams, ZoteroClient};
use crate::error::{Result, ZoteroError};

impl ZoteroClient {
    /// Indexed full-text content for an attachment item.
    pub fn fulltext_item(&mut self, key: &str) -> Result<Value> {
        let path = self.library_path(&format!("/items/{key}/fulltext"));
        self.get_json(&path, &SearchParams::default())
    }

    /// Items whose full-text changed since a library version: a map of item
    /// key to the version the content was set at.
    pub fn new_fulltext(&mut self, since: &str) -> Result<Value> {
        let path = self.library_path("/fulltext");
        let params = SearchParams {
            since: Some(since.to_string()),
            ..Default::default()
        };
        self.get_json(&path, &params)
    }

    /// Store full-text content for an attachment item.
    pub fn set_fulltext(&mut self, key: &str, payload: &Value) -> Result<()> {
        validate_fulltext_payload(payload)?;
        let path = self.library_path(&format!("/items/{key}/fulltext"));
        self.put_json(&path, payload, None)
    }
}

/// A full-text payload needs `content` plus page counts (for PDFs) or char
/// counts (for text documents).
pub fn validate_fulltext_payload(payload: &Value) -> Result<()> {
    let object = payload.as_object().ok_or_else(|| {
        ZoteroError::InvalidInput("full-text payload must be a JSON object".to_string())
    })?;
    if !object.contains_key("content") {
        return Err(ZoteroError::InvalidInput(
            "full-text payload must have a 'content' key".to_string(),
        ));
    }
    let has_pages = object.contains_key("indexedPages") && object.contains_key("totalPages");
    let has_chars = object.contains_key("indexedChars") && object.contains_key("totalChars");
    if !has_pages && !has_chars {
        return Err(ZoteroError::InvalidInput(
            "full-text payload needs ('indexedPages' & 'totalPages') or \
             ('indexedChars' & 'totalChars')"
                .to_string(),
        ));
    }
    Ok(())
}
