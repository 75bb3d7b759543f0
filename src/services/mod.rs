pub mod identity;
pub mod metrics;
pub mod orchestrator;
pub mod prompt_composer;
pub mod quota_store;
pub mod upstream;
pub mod usage_gate;

pub use identity::{GoogleIdentityResolver, IdentityResolver};
pub use metrics::*;
pub use orchestrator::*;
pub use quota_store::*;
pub use upstream::{ProviderKind, TextGenerator, UpstreamClient};
pub use usage_gate::{count_words, DenyReason, GateDecision};
