//! HTTP surface of the proxy.
//!
//! Handlers translate a route into either an upstream fetch (through the
//! shared [`NormalizingFetcher`](crate::fetcher::NormalizingFetcher)) or a
//! query against the in-memory candidate index, then wrap the result in the
//! `{ok, data}` envelope.
//!
//! ```text
//! request ─► router (CORS, trace) ─► handler ─┬─► fetcher ─► cache / upstream ─► adapter
//!                                             └─► candidate index
//! ```

pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
