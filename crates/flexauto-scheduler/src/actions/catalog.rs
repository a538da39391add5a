use crate::actions::resolve_api_key;
use crate::block::{ActionResult, BlockHeader};
use crate::services::Services;

/// Checks the movie catalog for new releases.
///
/// Parameters: `Genre`, `Period` (`Day`, `Week`, `Month`; default `Week`),
/// `Region` (default `UA`) and an optional `ApiKey`. New titles are recorded
/// as a list.
#[derive(Debug)]
pub struct CatalogCheckAction {
    pub header: BlockHeader,
}

impl CatalogCheckAction {
    pub fn new(header: BlockHeader) -> Self {
        Self { header }
    }

    pub async fn execute(&self, services: &Services) -> ActionResult {
        let Some(genre) = self.header.param("Genre").map(str::trim) else {
            return ActionResult::failed("Genre is not set");
        };
        let period = self.header.param("Period").unwrap_or("Week").trim();
        let region = self.header.param("Region").unwrap_or("UA").trim();
        let stored = services.settings().await.and_then(|s| s.tmdb_api_key);
        let Some(api_key) = resolve_api_key(&self.header, stored) else {
            return ActionResult::failed("TMDb API key is not set");
        };

        match services
            .catalog
            .check_new_titles(genre, period, region, &api_key)
            .await
        {
            Ok(Some(titles)) if !titles.is_empty() => {
                tracing::info!("🎬 {} new {genre} title(s)", titles.len());
                ActionResult::value(titles)
            }
            Ok(_) => ActionResult::ok(),
            Err(e) => ActionResult::failed(format!("Catalog check failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockValue;
    use crate::testing::Fakes;

    #[tokio::test]
    async fn test_records_list() {
        let fakes = Fakes::new();
        fakes.push_titles(Some(vec!["A (2026-01-01)".into(), "B (2026-01-02)".into()]));
        let action = CatalogCheckAction::new(
            BlockHeader::new("TMDbCheck")
                .with_param("Genre", "Comedy")
                .with_param("ApiKey", "k"),
        );
        let result = action.execute(&fakes.services()).await;
        assert_eq!(
            result,
            ActionResult::Success(Some(BlockValue::List(vec![
                "A (2026-01-01)".into(),
                "B (2026-01-02)".into()
            ])))
        );
    }

    #[tokio::test]
    async fn test_missing_genre() {
        let fakes = Fakes::new();
        let action = CatalogCheckAction::new(BlockHeader::new("TMDbCheck").with_param("ApiKey", "k"));
        assert!(!action.execute(&fakes.services()).await.is_success());
    }
}
