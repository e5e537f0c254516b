//! Service layer
//!
//! Services contain the worker's business logic: handling a claimed job and
//! caching the pages it fetches.
//!
//! The handler is trait-based so the browser automation can be swapped in
//! and tests can script outcomes.

mod handler;
mod page_cache;

// Re-export traits
pub use handler::JobHandler;

// Re-export implementations
pub use handler::{HandlerContext, LoggingHandler, Outcome};
pub use page_cache::PageCache;
