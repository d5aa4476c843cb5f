//! gRPC server implementation.

use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server;
use tracing::{error, info};

use super::proto::loginguard::v1::login_guard_server::LoginGuardServer;
use super::service::LoginGuardServiceImpl;
use crate::error::{LoginGuardError, Result};
use crate::ratelimit::LoginRateLimiter;

/// gRPC server for the login guard service.
pub struct GrpcServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The rate limiter shared with the sweeper
    rate_limiter: Arc<LoginRateLimiter>,
}

impl GrpcServer {
    /// Create a new gRPC server around a shared rate limiter.
    pub fn new(addr: SocketAddr, rate_limiter: Arc<LoginRateLimiter>) -> Self {
        Self { addr, rate_limiter }
    }

    /// The address the server binds to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the gRPC server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        let service = LoginGuardServiceImpl::new(self.rate_limiter);

        info!(
            addr = %self.addr,
            "Starting gRPC server for LoginGuard"
        );

        Server::builder()
            .add_service(LoginGuardServer::new(service))
            .serve_with_shutdown(self.addr, signal)
            .await
            .map_err(|e| {
                error!(error = %e, "gRPC server failed");
                LoginGuardError::Grpc(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::grpc::proto::loginguard::v1::{CheckRequest, RecordFailureRequest};
    use crate::grpc::{LoginGuardClient, Subject};

    #[test]
    fn test_server_creation() {
        let addr: SocketAddr = "127.0.0.1:50051".parse().unwrap();
        let server = GrpcServer::new(addr, Arc::new(LoginRateLimiter::default()));
        assert_eq!(server.addr(), addr);
    }

    #[tokio::test]
    async fn test_server_round_trip_and_shutdown() {
        let addr: SocketAddr = "127.0.0.1:18961".parse().unwrap();
        let limiter = Arc::new(LoginRateLimiter::default());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let server = GrpcServer::new(addr, limiter.clone());
        let handle = tokio::spawn(server.serve_with_shutdown(async {
            let _ = rx.await;
        }));

        // Wait for the listener to come up.
        let mut client = None;
        for _ in 0..50 {
            match LoginGuardClient::connect(format!("http://{}", addr)).await {
                Ok(c) => {
                    client = Some(c);
                    break;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
        let mut client = client.expect("server did not start");

        let subject = Subject {
            identifier: "192.0.2.1:carol".to_string(),
            ..Default::default()
        };
        client
            .record_failure(RecordFailureRequest {
                subject: Some(subject.clone()),
            })
            .await
            .unwrap();
        let status = client
            .check(CheckRequest {
                subject: Some(subject),
            })
            .await
            .unwrap()
            .into_inner()
            .status
            .unwrap();

        assert_eq!(status.remaining, 4);
        assert_eq!(limiter.attempt_count("192.0.2.1:carol"), Some(1));

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
