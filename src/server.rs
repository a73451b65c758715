//! HTTP server and graceful shutdown.
//!
//! On SIGTERM or Ctrl-C the server:
//! 1. stops accepting new connections,
//! 2. tells every open connection to finish its in-flight request and close
//!    (idle keep-alive connections close immediately),
//! 3. waits for them up to the configured shutdown timeout, then aborts
//!    whatever is left and returns.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::router::{Route, Router};

/// Default upper bound on the drain phase.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// A bound HTTP/1.1 + HTTP/2 server.
pub struct Server {
    listener: TcpListener,
    addr: SocketAddr,
    shutdown_timeout: Duration,
}

impl Server {
    /// Binds `addr`. Port 0 picks a free port; see [`Server::local_addr`].
    pub async fn bind(addr: SocketAddr) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr, shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT })
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves `router` until SIGTERM or Ctrl-C, then drains.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Serves `router` until `signal` resolves, then drains.
    pub async fn serve_with_shutdown(
        self,
        router: Router,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let router = Arc::new(router);
        let graceful = GracefulShutdown::new();
        let mut tasks = tokio::task::JoinSet::new();

        info!(addr = %self.addr, "stringsvc listening");

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Checked first so a signal stops accepting even under load.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = self.listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let svc = service_fn(move |req| dispatch(Arc::clone(&router), req));
                    let conn = ConnBuilder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(stream), svc)
                        .into_owned();
                    let conn = graceful.watch(conn);

                    tasks.spawn(async move {
                        if let Err(e) = conn.await {
                            debug!(%peer, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(self.listener);

        if tokio::time::timeout(self.shutdown_timeout, graceful.shutdown()).await.is_err() {
            warn!(
                remaining = tasks.len(),
                timeout = ?self.shutdown_timeout,
                "drain timed out, aborting remaining connections"
            );
        }
        tasks.shutdown().await;

        info!("stringsvc stopped");
        Ok(())
    }
}

/// Routes one request and produces one response. Never fails: every problem
/// becomes a status code.
async fn dispatch(
    router: Arc<Router>,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let response = match router.lookup(&method, &path) {
        Route::Found(handler) => match Request::from_hyper(req).await {
            Ok(req) => handler.call(req).await,
            Err(e) => {
                debug!(%method, %path, "reading request body: {e}");
                Response::status(StatusCode::BAD_REQUEST)
            }
        },
        Route::MethodNotAllowed => Response::status(StatusCode::METHOD_NOT_ALLOWED),
        Route::NotFound => Response::status(StatusCode::NOT_FOUND),
    };

    Ok(response.into_inner())
}

/// Resolves on the first SIGTERM or Ctrl-C. A signal that cannot be
/// installed is logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("installing Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("installing SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = sigterm => {}
    }
}
