use std::{pin, task};

use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};

use super::endpoint::{Endpoint, EndpointKind};

/// A bidirectional byte stream to the engine, regardless of how it was reached.
pub trait EngineIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> EngineIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub type EngineStream = TokioIo<Box<dyn EngineIo>>;

/// Opens a fresh stream to an [`Endpoint`], either over its Unix socket or TCP.
#[derive(Debug, Clone, Default)]
pub struct EndpointConnector;

impl tower::Service<Endpoint> for EndpointConnector {
    type Response = EngineStream;

    type Error = std::io::Error;

    type Future = pin::Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut task::Context<'_>) -> task::Poll<Result<(), Self::Error>> {
        task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, endpoint: Endpoint) -> Self::Future {
        Box::pin(async move {
            log::trace!("Connecting to {endpoint}...");
            let stream: Box<dyn EngineIo> = match endpoint.kind() {
                EndpointKind::UnixSocket(path) => connect_unix(path).await?,
                EndpointKind::Tcp(address) => {
                    let stream = tokio::net::TcpStream::connect(address.as_str()).await?;
                    stream.set_nodelay(true)?;
                    Box::new(stream)
                }
            };
            log::trace!("Connected to {endpoint}.");

            Ok(TokioIo::new(stream))
        })
    }
}

#[cfg(unix)]
async fn connect_unix(path: &std::path::Path) -> std::io::Result<Box<dyn EngineIo>> {
    let stream = tokio::net::UnixStream::connect(path).await?;
    Ok(Box::new(stream))
}

#[cfg(not(unix))]
async fn connect_unix(path: &std::path::Path) -> std::io::Result<Box<dyn EngineIo>> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("unix sockets are unsupported on this platform: {}", path.display()),
    ))
}
