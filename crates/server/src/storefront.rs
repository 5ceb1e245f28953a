use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use smsdesk_core::config::PricingConfig;
use smsdesk_core::errors::PricingError;
use smsdesk_core::pricing::{ProductListing, ProductSearch};
use tracing::debug;

/// Storefront product search over the shop's predictive-search JSON
/// endpoint (`/search/suggest.json`).
pub struct StorefrontSearch {
    client: Client,
    base_url: String,
    max_results: usize,
}

#[derive(Debug, Default, Deserialize)]
struct SuggestResponse {
    #[serde(default)]
    resources: SuggestResources,
}

#[derive(Debug, Default, Deserialize)]
struct SuggestResources {
    #[serde(default)]
    results: SuggestResults,
}

#[derive(Debug, Default, Deserialize)]
struct SuggestResults {
    #[serde(default)]
    products: Vec<SuggestProduct>,
}

#[derive(Debug, Deserialize)]
struct SuggestProduct {
    #[serde(default)]
    title: String,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl StorefrontSearch {
    pub fn new(config: &PricingConfig) -> Result<Self, PricingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.search_timeout_secs))
            .build()
            .map_err(|error| PricingError::Search {
                term: String::new(),
                message: format!("http client unavailable: {error}"),
            })?;

        Ok(Self {
            client,
            base_url: config.storefront_url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
        })
    }

    fn absolute(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else if let Some(rest) = href.strip_prefix("//") {
            format!("https://{rest}")
        } else {
            format!("{}/{}", self.base_url, href.trim_start_matches('/'))
        }
    }

    fn listings(&self, response: SuggestResponse) -> Vec<ProductListing> {
        response
            .resources
            .results
            .products
            .into_iter()
            .filter_map(|product| {
                let title = product.title.trim().to_string();
                let price = product.price.map(|price| price.trim().to_string())?;
                if title.is_empty() || price.is_empty() {
                    return None;
                }

                Some(ProductListing {
                    title,
                    price: if price.starts_with('$') { price } else { format!("${price}") },
                    image: product.image.as_deref().map(|image| self.absolute(image)),
                    link: product.url.as_deref().map(|url| self.absolute(url)),
                })
            })
            .take(self.max_results)
            .collect()
    }
}

#[async_trait]
impl ProductSearch for StorefrontSearch {
    async fn search(&self, term: &str) -> Result<Vec<ProductListing>, PricingError> {
        let failure = |message: String| PricingError::Search { term: term.to_string(), message };
        let limit = self.max_results.to_string();

        let response = self
            .client
            .get(format!("{}/search/suggest.json", self.base_url))
            .query(&[
                ("q", term),
                ("resources[type]", "product"),
                ("resources[limit]", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|error| failure(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failure(format!("storefront returned {status}")));
        }

        let payload: SuggestResponse =
            response.json().await.map_err(|error| failure(error.to_string()))?;
        let listings = self.listings(payload);

        debug!(
            event_name = "pricing.storefront_searched",
            term = %term,
            results = listings.len(),
            "storefront search completed"
        );
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use smsdesk_core::config::AppConfig;

    use super::{StorefrontSearch, SuggestResponse};

    fn search(max_results: usize) -> StorefrontSearch {
        let mut config = AppConfig::default().pricing;
        config.storefront_url = "https://shop.example.com/".to_string();
        config.max_results = max_results;
        StorefrontSearch::new(&config).expect("client builds")
    }

    fn parse(raw: &str) -> SuggestResponse {
        serde_json::from_str(raw).expect("valid suggest json")
    }

    #[test]
    fn suggest_products_become_listings_with_absolute_links() {
        let payload = parse(
            r#"{"resources":{"results":{"products":[
                {"title":"Classic Mug","price":"14.00","url":"/products/classic-mug?_pos=1",
                 "image":"//cdn.example.com/mug.png"},
                {"title":"Travel Mug","price":"$19.50","url":"https://shop.example.com/products/travel"}
            ]}}}"#,
        );

        let listings = search(5).listings(payload);

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].price, "$14.00");
        assert_eq!(
            listings[0].link.as_deref(),
            Some("https://shop.example.com/products/classic-mug?_pos=1")
        );
        assert_eq!(listings[0].image.as_deref(), Some("https://cdn.example.com/mug.png"));
        assert_eq!(listings[1].price, "$19.50");
        assert_eq!(listings[1].image, None);
    }

    #[test]
    fn untitled_or_unpriced_products_are_skipped_and_results_capped() {
        let payload = parse(
            r#"{"resources":{"results":{"products":[
                {"title":"","price":"10.00"},
                {"title":"No price"},
                {"title":"A","price":"1.00"},
                {"title":"B","price":"2.00"},
                {"title":"C","price":"3.00"}
            ]}}}"#,
        );

        let titles =
            search(2).listings(payload).into_iter().map(|listing| listing.title).collect::<Vec<_>>();

        assert_eq!(titles, vec!["A", "B"]);
    }

    #[test]
    fn empty_payload_yields_no_listings() {
        assert!(search(5).listings(parse("{}")).is_empty());
    }
}
