//! Network surfaces of transitrack.
//!
//! Two independent listeners share the same ingest pipeline: the HTTP
//! API for request/response submissions and queries, and the live TCP
//! channel for streamed reports and dashboard fan-out.

pub mod http;
pub mod live;

pub use http::{spawn_http_server, HttpServerHandle};
pub use live::{ConnectionManager, ConnectionState, LiveServer};
