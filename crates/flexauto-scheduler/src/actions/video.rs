use crate::actions::resolve_api_key;
use crate::block::{ActionResult, BlockHeader};
use crate::services::Services;

/// Checks a channel for a new upload (`ChannelId`, optional `ApiKey`).
///
/// A new upload records its URL; nothing new is a successful step with no
/// value.
#[derive(Debug)]
pub struct VideoCheckAction {
    pub header: BlockHeader,
}

impl VideoCheckAction {
    pub fn new(header: BlockHeader) -> Self {
        Self { header }
    }

    pub async fn execute(&self, services: &Services) -> ActionResult {
        let Some(channel_id) = self.header.param("ChannelId").map(str::trim) else {
            return ActionResult::failed("Channel id is not set");
        };
        let stored = services.settings().await.and_then(|s| s.youtube_api_key);
        let Some(api_key) = resolve_api_key(&self.header, stored) else {
            return ActionResult::failed("YouTube API key is not set");
        };

        match services.video.check_new_video(channel_id, &api_key).await {
            Ok(Some(url)) => {
                tracing::info!("📺 New video on {channel_id}: {url}");
                ActionResult::value(url)
            }
            Ok(None) => ActionResult::ok(),
            Err(e) => ActionResult::failed(format!("Video check failed: {e}")),
        }
    }
}
