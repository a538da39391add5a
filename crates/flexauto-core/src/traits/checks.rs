//! HTTP check services. Each implementation de-duplicates internally, so
//! repeated calls only report items not seen before.

use async_trait::async_trait;

use crate::error::Result;

/// Latest-upload check for a video channel.
#[async_trait]
pub trait VideoCheck: Send + Sync {
    /// URL of a newly seen upload, or `None` when nothing new.
    async fn check_new_video(&self, channel_id: &str, api_key: &str) -> Result<Option<String>>;
}

/// New-release check for a movie catalog.
#[async_trait]
pub trait CatalogCheck: Send + Sync {
    /// Up to 10 formatted, newly seen entries, or `None` when nothing new.
    async fn check_new_titles(
        &self,
        genre: &str,
        period: &str,
        region: &str,
        api_key: &str,
    ) -> Result<Option<Vec<String>>>;
}
