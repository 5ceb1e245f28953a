//! Core of the SMS support desk: conversation memory, pricing lookups and
//! the configuration and error types shared by the other crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;
pub mod redact;
pub mod session;

pub use config::{AppConfig, ConfigError, LoadOptions};
pub use domain::conversation::{
    Conversation, ConversationLookup, ConversationMetadata, CustomerId, Message, MessageId,
    MessageRole,
};
pub use errors::{ApplicationError, InterfaceError, PricingError};
pub use pricing::{
    PriceRange, PricingCache, PricingResult, ProductCatalog, ProductListing, ProductSearch,
    SynonymCatalog,
};
pub use session::{
    ConversationRecord, RecordMessage, SearchHit, SessionConfig, SessionStats, SessionStore,
    DEFAULT_CONTEXT_WINDOW,
};
