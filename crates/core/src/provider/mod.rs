//! Release providers: the trait the engine searches through, per-provider
//! policy, and the Jackett adapter.

mod jackett;
mod policy;
mod rate_limiter;
mod types;

pub use jackett::JackettProvider;
pub use policy::{ProviderPolicy, ProviderType, SearchMode};
pub use rate_limiter::{RateLimiter, TokenBucket};
pub use types::{Provider, ProviderError, SearchRequest};
