//! gRPC surface for the login rate limiter.

mod server;
mod service;

pub use server::GrpcServer;
pub use service::LoginGuardServiceImpl;

// Include the generated protobuf code
pub mod proto {
    pub mod loginguard {
        pub mod v1 {
            tonic::include_proto!("loginguard.v1");
        }
    }
}

// Re-export commonly used types
pub use proto::loginguard::v1::{
    login_guard_client::LoginGuardClient, login_guard_server::LoginGuardServer, Subject,
};
