//! Batch enhancement: dedup, cache, group, dispatch, retry, parse.
//!
//! [`EnhancementPipeline`] is the entry point; the submodules are public so
//! their pieces can be tested and reused on their own.

pub mod cache;
pub mod dedup;
pub mod dispatch;
pub mod grouping;
pub mod hasher;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod retry;

pub use cache::{CacheKey, ContentCache};
pub use dedup::{Deduplicated, UniqueItem};
pub use dispatch::{BatchDispatcher, DispatchOutcome};
pub use grouping::{
    BatchGroup, GroupPlan, SkipFilter, TrivialInputFilter, estimate_tokens, group_by_token_counts,
    plan_groups,
};
pub use hasher::SemanticHash;
pub use parser::{extract_json_array, parse_batch_response};
pub use pipeline::{EnhanceRequest, EnhancementPipeline, EnhancementStats};
pub use prompt::{build_batch_prompt, render_item_prompt};
pub use retry::RetryController;
