//! HTTP server.
//!
//! Accepts TCP connections, serves HTTP/1.1 (and HTTP/2 when enabled) with
//! hyper, and feeds each request through the [`Gateway`]. One task per
//! connection; each request runs under the configured timeout. On shutdown
//! the accept loop stops, open connections are asked to finish their
//! in-flight requests, and the server waits up to the drain window.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use portico_core::GatewayError;
use portico_middleware::{RequestContext, Response, ResponseExt};
use portico_telemetry::metrics::{record_request, InFlightGuard};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::gateway::Gateway;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

const UNMATCHED_ROUTE_GROUP: &str = "unmatched";

/// Serves a [`Gateway`] over HTTP.
#[derive(Debug, Clone)]
pub struct Server {
    gateway: Gateway,
    request_timeout: Duration,
    shutdown_timeout: Duration,
    keep_alive: bool,
    http2: bool,
    max_connections: usize,
}

impl Server {
    /// Creates a server using the gateway's server settings.
    #[must_use]
    pub fn new(gateway: Gateway) -> Self {
        let config = gateway.config();
        Self {
            request_timeout: config.request_timeout(),
            shutdown_timeout: config.shutdown_timeout(),
            keep_alive: config.server.keep_alive_secs.is_some(),
            http2: config.server.http2_enabled,
            max_connections: config.server.max_connections as usize,
            gateway,
        }
    }

    /// The configured listen address.
    pub fn addr(&self) -> Result<SocketAddr, ServerError> {
        let addr = &self.gateway.config().server.http_addr;
        addr.parse().map_err(|_| ServerError::InvalidAddress { addr: addr.clone() })
    }

    /// Binds the configured address and serves until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured address and serves until `shutdown` fires.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve(listener, shutdown).await;
        Ok(())
    }

    /// Serves connections from an already bound listener until `shutdown`
    /// fires, then drains.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) {
        let local_addr = listener.local_addr().ok();
        info!(addr = ?local_addr, http2 = self.http2, "gateway listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();
        let permits = Arc::new(Semaphore::new(server.max_connections));

        loop {
            let permit = tokio::select! {
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                () = shutdown.wait() => break,
            };

            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        let server = Arc::clone(&server);
                        let guard = tracker.track();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            server.serve_connection(stream, remote, shutdown).await;
                            drop(guard);
                            drop(permit);
                        });
                    }
                    Err(e) => warn!(error = %e, "failed to accept connection"),
                },
                () = shutdown.wait() => break,
            }
        }

        info!(
            connections = tracker.active(),
            drain_secs = server.shutdown_timeout.as_secs(),
            "shutting down, draining connections"
        );
        if tokio::time::timeout(server.shutdown_timeout, tracker.drained())
            .await
            .is_err()
        {
            warn!(connections = tracker.active(), "drain window elapsed with open connections");
        }
        info!("gateway stopped");
    }

    async fn serve_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote: SocketAddr,
        shutdown: ShutdownSignal,
    ) {
        let io = TokioIo::new(stream);
        let server = Arc::clone(&self);
        let service = service_fn(move |request: http::Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle(request).await) }
        });

        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder.http1().keep_alive(self.keep_alive);
        if !self.http2 {
            builder = builder.http1_only();
        }

        let mut connection = pin!(builder.serve_connection(io, service));
        let mut draining = false;
        let result = loop {
            tokio::select! {
                result = connection.as_mut() => break result,
                () = shutdown.wait(), if !draining => {
                    debug!(%remote, "finishing in-flight requests before close");
                    connection.as_mut().graceful_shutdown();
                    draining = true;
                }
            }
        };
        if let Err(e) = result {
            debug!(%remote, error = %e, "connection closed with error");
        }
    }

    async fn handle(&self, request: http::Request<Incoming>) -> Response {
        let _in_flight = InFlightGuard::new();
        let started = Instant::now();
        let mut ctx = RequestContext::new();

        let outcome = tokio::time::timeout(self.request_timeout, async {
            let request = collect(request).await?;
            Ok::<_, GatewayError>(self.gateway.process(&mut ctx, request).await)
        })
        .await;

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                warn!(request_id = %ctx.request_id(), error = %error, "failed to read request body");
                Response::envelope(&error, false)
            }
            Err(_) => {
                let error = GatewayError::timeout(format!(
                    "request exceeded {}ms",
                    self.request_timeout.as_millis()
                ));
                warn!(
                    request_id = %ctx.request_id(),
                    stage = ctx.current_stage().unwrap_or("-"),
                    "request timed out"
                );
                Response::envelope(&error, false)
            }
        };

        let route_group = ctx.route().map_or(UNMATCHED_ROUTE_GROUP, |route| route.group());
        record_request(route_group, response.status().as_u16(), started.elapsed());
        response
    }
}

async fn collect(request: http::Request<Incoming>) -> Result<portico_middleware::Request, GatewayError> {
    let (parts, body) = request.into_parts();
    let bytes: Bytes = body
        .collect()
        .await
        .map_err(|e| GatewayError::bad_request(format!("failed to read request body: {e}")))?
        .to_bytes();
    Ok(http::Request::from_parts(parts, Full::new(bytes)))
}
