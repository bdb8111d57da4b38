//! Benchmark execution engine

pub mod harness;
pub mod rate_limiter;
pub mod record;

pub use harness::{
    ConsoleProgress, Harness, HarnessConfig, HarnessError, NoOpProgress, ProgressCallback,
    RunSummary,
};
pub use rate_limiter::{RateLimitGuard, RateLimiter};
pub use record::{CallKey, ResponseRecord};
