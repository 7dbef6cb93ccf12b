//! Rule set compilation and matching engine.
//!
//! This module is the *core* of the crate: everything between "here is an
//! ordered list of `Rule`s" and "this buffer has been rewritten". Rule text
//! never reaches it; rules arrive fully resolved (see `notation.rs` for one
//! producer).
//!
//! ## How the parts work together
//!
//! ```text
//! rules (in priority order)
//!     │  RuleSet::add_rule                (rule_set.rs)
//!     ▼
//! RuleSet::freeze ──▶ masking::find_masked (masking.rs)
//!     │             └─ MaskedRule error if a rule can never fire
//!     ▼
//! DispatchIndex (256 buckets) + max_context_length
//!     │
//!     ▼
//! Matcher::transliterate(buffer, position, incremental)   (matcher.rs)
//!   - bucket lookup for the char at the cursor
//!   - first non-mismatching candidate decides
//!   - replace / halt on partial / copy through
//!     │
//!     ▼
//! PassMetrics (optional)                  (metrics.rs)
//! ```
//!
//! The compile step runs once; the matcher runs once per one-shot pass or
//! once per incremental input chunk against the same frozen set.
//!
//! ## Responsibilities by module
//!
//! - `rule_set.rs`: owns rules in declaration order, freeze/reset lifecycle,
//!   dispatch index, maximum context length.
//! - `masking.rs`: conservative unreachable-rule detection.
//! - `matcher.rs`: the scan loop, per-rule matching, partial-match protocol,
//!   step budget.
//! - `metrics.rs`: opt-in counters for a pass or a whole run.
//!
//! ## Debugging
//!
//! The engine emits `tracing` events: `debug` when a set is frozen or a masked
//! rule is rejected, `trace` per replacement and per partial-match halt, and
//! `warn` when a step budget runs out. The `translit` binary reads its filter
//! from `TRANSLIT_LOG`.

#[path = "engine/masking.rs"]
mod masking;
#[path = "engine/matcher.rs"]
mod matcher;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/rule_set.rs"]
mod rule_set;


pub use matcher::{DEFAULT_STEP_BUDGET_FACTOR, Matcher};
pub use metrics::{PassMetrics, RunMetrics, RunResult};
pub use rule_set::{BUCKET_COUNT, DispatchIndex, RuleId, RuleSet, bucket_of};
