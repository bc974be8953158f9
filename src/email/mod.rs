pub mod common;
pub mod normalizer;

// Re-export commonly used items
pub use common::{NormalizedRecord, RawMessage};
pub use normalizer::{
    clean_body, extract_sender_address, normalize, normalize_date, ContentNormalizer,
};
