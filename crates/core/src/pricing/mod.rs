//! Product price lookups with time-bounded memoization.
//!
//! A lookup for one product type fans out into one storefront search per
//! synonym term (see [`SynonymCatalog`]); the raw listings are then folded
//! into a [`PricingResult`] and cached by [`PricingCache`].

pub mod cache;
pub mod price;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::PricingError;

pub use cache::{PricingCache, DEFAULT_PRICING_TTL_SECS};
pub use price::parse_price;

pub const SAMPLE_PRODUCT_LIMIT: usize = 3;

/// One product as returned by a storefront search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductListing {
    pub title: String,
    pub price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: Decimal,
    pub max: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleProduct {
    pub title: String,
    pub price: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingResult {
    pub product_type: String,
    pub available: bool,
    pub product_count: usize,
    pub price_range: Option<PriceRange>,
    pub sample_products: Vec<SampleProduct>,
}

impl PricingResult {
    /// Folds raw listings into a result: duplicates by title are dropped
    /// (first occurrence wins) and only positive, parseable prices feed the
    /// range. Listings with unparseable prices still count as products.
    pub fn from_listings(product_type: &str, listings: Vec<ProductListing>) -> Self {
        let mut seen_titles = HashSet::new();
        let unique = listings
            .into_iter()
            .filter(|listing| seen_titles.insert(listing.title.clone()))
            .collect::<Vec<_>>();

        let prices = unique.iter().filter_map(|listing| parse_price(&listing.price));
        let price_range = prices.fold(None, |range: Option<PriceRange>, price| match range {
            None => Some(PriceRange { min: price, max: price }),
            Some(range) => Some(PriceRange { min: range.min.min(price), max: range.max.max(price) }),
        });

        let sample_products = unique
            .iter()
            .take(SAMPLE_PRODUCT_LIMIT)
            .map(|listing| SampleProduct { title: listing.title.clone(), price: listing.price.clone() })
            .collect();

        Self {
            product_type: product_type.to_string(),
            available: !unique.is_empty(),
            product_count: unique.len(),
            price_range,
            sample_products,
        }
    }

    /// Short plain-text summary suitable for an SMS or a prompt.
    pub fn summary(&self) -> String {
        if !self.available {
            return format!("No {} products are listed right now.", self.product_type);
        }

        match &self.price_range {
            Some(range) if range.min == range.max => format!(
                "{} {} products listed at ${}.",
                self.product_count, self.product_type, range.min
            ),
            Some(range) => format!(
                "{} {} products listed from ${} to ${}.",
                self.product_count, self.product_type, range.min, range.max
            ),
            None => format!(
                "{} {} products listed; prices vary.",
                self.product_count, self.product_type
            ),
        }
    }
}

/// A single storefront search.
#[async_trait]
pub trait ProductSearch: Send + Sync {
    async fn search(&self, term: &str) -> Result<Vec<ProductListing>, PricingError>;
}

/// Resolves every listing relevant to a product type.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn lookup(&self, product_type: &str) -> Result<Vec<ProductListing>, PricingError>;
}

pub fn default_synonyms() -> BTreeMap<String, Vec<String>> {
    [
        ("t-shirt", ["custom t-shirt", "printed t-shirt"]),
        ("hoodie", ["custom hoodie", "printed hoodie"]),
        ("mug", ["custom mug", "personalized mug"]),
        ("sweatshirt", ["custom sweatshirt", "printed sweatshirt"]),
    ]
    .into_iter()
    .map(|(product_type, terms)| {
        (product_type.to_string(), terms.iter().map(|term| term.to_string()).collect())
    })
    .collect()
}

/// Issues one search per synonym term of a product type. Unknown product
/// types are searched verbatim. Any failing search fails the lookup so that
/// a partial result is never cached.
pub struct SynonymCatalog {
    search: Arc<dyn ProductSearch>,
    synonyms: BTreeMap<String, Vec<String>>,
}

impl SynonymCatalog {
    pub fn new(search: Arc<dyn ProductSearch>, synonyms: BTreeMap<String, Vec<String>>) -> Self {
        Self { search, synonyms }
    }

    pub fn with_default_synonyms(search: Arc<dyn ProductSearch>) -> Self {
        Self::new(search, default_synonyms())
    }

    pub fn terms_for(&self, product_type: &str) -> Vec<String> {
        let key = product_type.trim().to_lowercase();
        self.synonyms.get(&key).cloned().unwrap_or_else(|| vec![product_type.trim().to_string()])
    }

    pub fn product_types(&self) -> impl Iterator<Item = &str> {
        self.synonyms.keys().map(String::as_str)
    }
}

#[async_trait]
impl ProductCatalog for SynonymCatalog {
    async fn lookup(&self, product_type: &str) -> Result<Vec<ProductListing>, PricingError> {
        let mut listings = Vec::new();
        for term in self.terms_for(product_type) {
            listings.extend(self.search.search(&term).await?);
        }
        Ok(listings)
    }
}
