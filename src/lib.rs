//! # stringsvc
//!
//! A small HTTP microservice (uppercase a string, ask Claude a question)
//! built from composable, instrumented endpoints.
//!
//! ## The model
//!
//! Business logic lives in an [`Endpoint`]: an async
//! `(Context, Req) -> Result<Resp, BoxError>`. Cross-cutting behaviour lives
//! in [`Middleware`]: `Endpoint -> Endpoint`. Stacks are composed once at
//! startup and shared by every request.
//!
//! ```text
//!   HTTP ──► json_handler ──► tracing ──► metrics ──► logging ──► base endpoint ──► StringService
//!                 ▲               │           │           │
//!                 │               └── span    └── count,  └── one log line
//!          status + JSON                          latency,
//!                                                 errors
//! ```
//!
//! The middlewares talk only to capabilities, a [`Counter`]/[`Histogram`]
//! pair and a [`Tracer`], so tests plug in in-memory doubles and the binary
//! plugs in Prometheus and OpenTelemetry.
//!
//! ## Quick start
//!
//! ```rust
//! use stringsvc::middleware::{chain, layer, Logging};
//! use stringsvc::{BoxError, Context, Endpoint, Middleware};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let upper = Endpoint::new(|_ctx, s: String| async move { Ok::<_, BoxError>(s.to_uppercase()) });
//! let logged = chain(Logging, []).wrap(upper);
//!
//! let ctx = Context::background().with_request_meta("POST", "/uppercase");
//! assert_eq!(logged.call(ctx, "abc".into()).await.unwrap(), "ABC");
//! # }
//! ```

mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod health;
pub mod instrument;
pub mod middleware;
pub mod proxy;
pub mod recorder;
pub mod service;
pub mod telemetry;
pub mod trace;
pub mod transport;

pub use context::{Context, RequestMeta};
pub use endpoint::Endpoint;
pub use error::{BoxError, Error};
pub use handler::Handler;
pub use instrument::{Instrument, InstrumentedStringService};
pub use middleware::{chain, Chain, Middleware};
pub use recorder::{Counter, Gauge, Histogram, LabelValues, Metrics};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::{shutdown_signal, Server};
pub use service::{StringService, StringSvc};
pub use trace::{Span, TraceAttributes, Tracer};
