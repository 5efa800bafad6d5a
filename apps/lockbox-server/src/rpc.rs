//! The framed RPC surface.
//!
//! One length-prefixed frame carries one request envelope; the response goes
//! back on the same connection in order. Private methods pass through the
//! same authorization gate as the HTTP surface, with the token taken from
//! the envelope. With TLS configured, the acceptor wraps every connection
//! before the first frame is read.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;

use lockbox_proto::{
    read_frame, write_frame, ErrorCode, FrameError, RpcMethod, RpcRequest, RpcResponse,
};

use crate::error::ServiceError;
use crate::handlers;
use crate::metrics;
use crate::server::{AuthPrincipal, LockboxServer};

#[derive(Clone)]
pub struct RpcConfig {
    /// Per-request execution deadline. Hitting it aborts the outstanding
    /// store call and rolls back its transaction.
    pub request_timeout: Duration,
    pub write_timeout: Duration,
    /// Connections with no frame for this long are closed.
    pub idle_timeout: Duration,
}

/// Build a TLS acceptor from PEM cert/key files.
pub fn tls_acceptor(
    cert_path: &Path,
    key_path: &Path,
) -> Result<TlsAcceptor, Box<dyn std::error::Error + Send + Sync>> {
    use tokio_rustls::rustls;

    let mut cert_reader = std::io::BufReader::new(std::fs::File::open(cert_path)?);
    let certs = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err("no certificates found in TLS cert file".into());
    }

    let mut key_reader = std::io::BufReader::new(std::fs::File::open(key_path)?);
    let key = rustls_pemfile::private_key(&mut key_reader)?
        .ok_or("no private key found in TLS key file")?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Accept loop. Returns once a shutdown is signalled and every in-flight
/// connection has finished; the caller bounds that drain with the shutdown
/// deadline.
pub async fn serve(
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    server: Arc<LockboxServer>,
    config: RpcConfig,
    shutdown: broadcast::Sender<()>,
) -> std::io::Result<()> {
    let mut accept_shutdown = shutdown.subscribe();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };

                let server = server.clone();
                let config = config.clone();
                let conn_shutdown = shutdown.subscribe();
                let tls = tls.clone();
                connections.spawn(async move {
                    let result = match tls {
                        Some(acceptor) => match acceptor.accept(stream).await {
                            Ok(stream) => {
                                handle_connection(stream, server, config, conn_shutdown).await
                            }
                            Err(e) => {
                                tracing::warn!(peer = %peer, error = %e, "TLS handshake failed");
                                return;
                            }
                        },
                        None => handle_connection(stream, server, config, conn_shutdown).await,
                    };
                    if let Err(e) = result {
                        tracing::debug!(peer = %peer, error = %e, "connection closed with error");
                    }
                });
            }
            _ = accept_shutdown.recv() => break,
        }
    }

    while connections.join_next().await.is_some() {}
    Ok(())
}

async fn handle_connection<S>(
    mut stream: S,
    server: Arc<LockboxServer>,
    config: RpcConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), FrameError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    loop {
        let frame = tokio::select! {
            read = timeout(config.idle_timeout, read_frame(&mut stream)) => match read {
                Ok(Ok(Some(frame))) => frame,
                Ok(Ok(None)) => return Ok(()),
                Ok(Err(e)) => return Err(e),
                Err(_) => return Ok(()),
            },
            _ = shutdown.recv() => return Ok(()),
        };

        let response = match serde_json::from_slice::<RpcRequest>(&frame) {
            Ok(request) => {
                let id = request.id;
                match timeout(config.request_timeout, dispatch(&server, request)).await {
                    Ok(response) => response,
                    Err(_) => {
                        RpcResponse::err(id, ErrorCode::Internal, "request deadline exceeded")
                    }
                }
            }
            Err(e) => RpcResponse::err(
                0,
                ErrorCode::InvalidArgument,
                format!("malformed envelope: {e}"),
            ),
        };

        let bytes = serde_json::to_vec(&response).map_err(|e| {
            FrameError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        match timeout(config.write_timeout, write_frame(&mut stream, &bytes)).await {
            Ok(result) => result?,
            Err(_) => return Ok(()),
        }
    }
}

async fn dispatch(server: &LockboxServer, request: RpcRequest) -> RpcResponse {
    let started = Instant::now();
    let id = request.id;
    let operation = operation_name(request.method);

    let result = route(server, request).await;
    metrics::record_request("rpc", operation, started);

    match result {
        Ok(body) => RpcResponse::ok(id, body),
        Err(err) => {
            metrics::record_error("rpc", operation, err.tag());
            RpcResponse::err(id, err.rpc_code(), err.to_string())
        }
    }
}

async fn route(server: &LockboxServer, request: RpcRequest) -> Result<Value, ServiceError> {
    let principal = if request.method.is_public() {
        None
    } else {
        Some(server.authenticate(request.token.as_deref())?)
    };
    let body = request.body;

    match request.method {
        RpcMethod::Register => to_body(handlers::auth::register(server, parse(body)?).await?),
        RpcMethod::Login => to_body(handlers::auth::login(server, parse(body)?).await?),
        RpcMethod::RefreshToken => {
            to_body(handlers::auth::refresh_token(server, parse(body)?).await?)
        }
        RpcMethod::OtpEnroll => to_body(handlers::otp::enroll(parse(body)?)?),
        RpcMethod::OtpGenerate => to_body(handlers::otp::generate(parse(body)?)?),
        RpcMethod::ListEntries => {
            let principal = required(principal)?;
            to_body(handlers::entries::list_entries(server, &principal, parse(body)?).await?)
        }
        RpcMethod::CreateEntry => {
            let principal = required(principal)?;
            to_body(handlers::entries::create_entry(server, &principal, parse(body)?).await?)
        }
        RpcMethod::GetEntry => {
            let principal = required(principal)?;
            to_body(handlers::entries::get_entry(server, &principal, parse(body)?).await?)
        }
        RpcMethod::UpdateEntry => {
            let principal = required(principal)?;
            to_body(handlers::entries::update_entry(server, &principal, parse(body)?).await?)
        }
        RpcMethod::DeleteEntry => {
            let principal = required(principal)?;
            to_body(handlers::entries::delete_entry(server, &principal, parse(body)?).await?)
        }
        RpcMethod::SyncChanges => {
            let principal = required(principal)?;
            to_body(handlers::sync::sync_changes(server, &principal, parse(body)?).await?)
        }
    }
}

fn operation_name(method: RpcMethod) -> &'static str {
    match method {
        RpcMethod::Register => "register",
        RpcMethod::Login => "login",
        RpcMethod::RefreshToken => "refresh_token",
        RpcMethod::OtpEnroll => "otp_enroll",
        RpcMethod::OtpGenerate => "otp_generate",
        RpcMethod::ListEntries => "list_entries",
        RpcMethod::CreateEntry => "create_entry",
        RpcMethod::GetEntry => "get_entry",
        RpcMethod::UpdateEntry => "update_entry",
        RpcMethod::DeleteEntry => "delete_entry",
        RpcMethod::SyncChanges => "sync_changes",
    }
}

fn parse<T: DeserializeOwned>(body: Value) -> Result<T, ServiceError> {
    serde_json::from_value(body)
        .map_err(|e| ServiceError::invalid(format!("invalid request body: {e}")))
}

fn to_body<T: Serialize>(value: T) -> Result<Value, ServiceError> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, "failed to serialize response body");
        ServiceError::Internal
    })
}

fn required(principal: Option<AuthPrincipal>) -> Result<AuthPrincipal, ServiceError> {
    principal.ok_or(ServiceError::Unauthenticated("user not authenticated"))
}
