// Fusion Module - identity resolution and per-row merging
//
// Query → (search → resolve → fetch) per source → merged EnrichedRow

pub mod identity_cache;
pub mod identity_resolver;
pub mod normalize;
pub mod row_enricher;

pub use identity_cache::IdentityCache;
pub use identity_resolver::{AmbiguityReason, IdentityResolver, Resolution, ResolverPolicy};
pub use row_enricher::RowEnricher;
