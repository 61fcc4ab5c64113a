//! Service support library: logging bootstrap, stack wiring and the HTTP API.

pub mod bootstrap;
mod logging;
pub mod search_handler;
pub mod server;
pub mod status;

pub use bootstrap::{BuildOptions, BuildOutcome, build_index, index_options, open_retriever};
pub use logging::{init_tracing, init_tracing_with_config};
pub use search_handler::{RetrieverSearchHandler, SearchError, SearchHandler};
pub use server::{router, serve};
