//! Loginguard - Login Attempt Rate Limiting Service
//!
//! This crate tracks failed login attempts per client identifier, locks the
//! identifier out once a threshold is reached, and suggests a progressive
//! delay between retries. It can be embedded as a library or run as a gRPC
//! sidecar next to an authentication handler.

pub mod config;
pub mod error;
pub mod grpc;
pub mod identity;
pub mod ratelimit;
pub mod telemetry;
