//! Login guard service implementation.

use std::sync::Arc;
use std::time::Duration;
use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status};
use tracing::{debug, info, instrument};

use super::proto::loginguard::v1::{
    evaluate_response::Outcome, login_guard_server::LoginGuard, CheckRequest, CheckResponse,
    EvaluateRequest, EvaluateResponse, Header, ProgressiveDelayRequest,
    ProgressiveDelayResponse, RateLimitStatus as StatusMessage, RecordFailureRequest,
    RecordFailureResponse, ResetRequest, ResetResponse, StatsRequest, StatsResponse, Subject,
};

use crate::error::{LoginGuardError, Result};
use crate::identity::{client_ip, login_identifier};
use crate::ratelimit::{Decision, LoginRateLimiter, RateLimitStatus};

/// Implementation of the LoginGuard gRPC interface.
pub struct LoginGuardServiceImpl {
    /// The rate limiter instance
    rate_limiter: Arc<LoginRateLimiter>,
}

impl LoginGuardServiceImpl {
    /// Create a new LoginGuardServiceImpl with the given rate limiter.
    pub fn new(rate_limiter: Arc<LoginRateLimiter>) -> Self {
        Self { rate_limiter }
    }
}

/// Work out the rate limit identifier a request refers to.
///
/// An explicit identifier wins. Otherwise the client address is read from the
/// subject's headers, or from the call metadata when the subject carries none.
fn resolve_identifier(subject: Option<Subject>, metadata: &MetadataMap) -> Result<String> {
    let subject = subject
        .ok_or_else(|| LoginGuardError::InvalidSubject("subject is required".into()))?;

    // Explicit identifiers are opaque keys and are not normalized.
    if !subject.identifier.is_empty() {
        return Ok(subject.identifier);
    }

    if subject.username.is_empty() {
        return Err(LoginGuardError::InvalidSubject(
            "either identifier or username is required".into(),
        ));
    }

    let ip = if subject.headers.is_empty() {
        client_ip(metadata)
    } else {
        client_ip(&subject.headers)
    };
    Ok(login_identifier(&ip, &subject.username))
}

fn to_proto_duration(duration: Duration) -> prost_types::Duration {
    prost_types::Duration {
        seconds: duration.as_secs() as i64,
        nanos: duration.subsec_nanos() as i32,
    }
}

fn to_status_message(identifier: &str, status: &RateLimitStatus) -> StatusMessage {
    StatusMessage {
        identifier: identifier.to_string(),
        is_limited: status.is_limited,
        remaining: status.remaining,
        limit: status.limit,
        reset_time_ms: status.reset_time_ms as i64,
        retry_after: status
            .retry_after_secs
            .map(|secs| to_proto_duration(Duration::from_secs(secs))),
        headers: status
            .headers()
            .into_iter()
            .map(|(name, value)| Header {
                name: name.to_string(),
                value,
            })
            .collect(),
    }
}

#[tonic::async_trait]
impl LoginGuard for LoginGuardServiceImpl {
    /// Decide whether a login attempt may proceed, must wait, or is blocked.
    #[instrument(skip(self, request))]
    async fn evaluate(
        &self,
        request: Request<EvaluateRequest>,
    ) -> std::result::Result<Response<EvaluateResponse>, Status> {
        let (metadata, _, req) = request.into_parts();
        let identifier = resolve_identifier(req.subject, &metadata)?;

        let decision = self.rate_limiter.evaluate(&identifier);
        let outcome = match &decision {
            Decision::Allowed(_) => Outcome::Allowed,
            Decision::Delayed { .. } => Outcome::Delayed,
            Decision::Blocked { .. } => Outcome::Blocked,
        };

        if decision.is_blocked() {
            info!(
                identifier = %identifier,
                retry_after = ?decision.status().retry_after_secs,
                "Login attempt blocked"
            );
        } else {
            debug!(
                identifier = %identifier,
                outcome = ?outcome,
                delay_ms = decision.delay().as_millis() as u64,
                "Login attempt evaluated"
            );
        }

        let delay = match &decision {
            Decision::Delayed { delay, .. } => Some(to_proto_duration(*delay)),
            _ => None,
        };

        Ok(Response::new(EvaluateResponse {
            outcome: outcome.into(),
            status: Some(to_status_message(&identifier, decision.status())),
            delay,
        }))
    }

    /// Report the current rate limit status without recording anything.
    #[instrument(skip(self, request))]
    async fn check(
        &self,
        request: Request<CheckRequest>,
    ) -> std::result::Result<Response<CheckResponse>, Status> {
        let (metadata, _, req) = request.into_parts();
        let identifier = resolve_identifier(req.subject, &metadata)?;

        let status = self.rate_limiter.check(&identifier);
        debug!(
            identifier = %identifier,
            is_limited = status.is_limited,
            remaining = status.remaining,
            "Rate limit checked"
        );

        Ok(Response::new(CheckResponse {
            status: Some(to_status_message(&identifier, &status)),
        }))
    }

    /// Record a failed credential check.
    #[instrument(skip(self, request))]
    async fn record_failure(
        &self,
        request: Request<RecordFailureRequest>,
    ) -> std::result::Result<Response<RecordFailureResponse>, Status> {
        let (metadata, _, req) = request.into_parts();
        let identifier = resolve_identifier(req.subject, &metadata)?;

        self.rate_limiter.record_attempt(&identifier);
        debug!(identifier = %identifier, "Failed login recorded");

        Ok(Response::new(RecordFailureResponse { identifier }))
    }

    /// Clear recorded failures after a successful login.
    #[instrument(skip(self, request))]
    async fn reset(
        &self,
        request: Request<ResetRequest>,
    ) -> std::result::Result<Response<ResetResponse>, Status> {
        let (metadata, _, req) = request.into_parts();
        let identifier = resolve_identifier(req.subject, &metadata)?;

        self.rate_limiter.reset(&identifier);
        debug!(identifier = %identifier, "Login attempts reset");

        Ok(Response::new(ResetResponse { identifier }))
    }

    /// Suggested wait before verifying the next attempt.
    #[instrument(skip(self, request))]
    async fn get_progressive_delay(
        &self,
        request: Request<ProgressiveDelayRequest>,
    ) -> std::result::Result<Response<ProgressiveDelayResponse>, Status> {
        let (metadata, _, req) = request.into_parts();
        let identifier = resolve_identifier(req.subject, &metadata)?;

        let delay = self.rate_limiter.progressive_delay(&identifier);

        Ok(Response::new(ProgressiveDelayResponse {
            identifier,
            delay: Some(to_proto_duration(delay)),
        }))
    }

    /// Tracked and blocked identifier counts.
    async fn get_stats(
        &self,
        _request: Request<StatsRequest>,
    ) -> std::result::Result<Response<StatsResponse>, Status> {
        let stats = self.rate_limiter.stats();

        Ok(Response::new(StatsResponse {
            total_tracked: stats.total_tracked as u64,
            blocked_count: stats.blocked_count as u64,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    fn service() -> (LoginGuardServiceImpl, Arc<LoginRateLimiter>) {
        let rate_limiter = Arc::new(LoginRateLimiter::default());
        (LoginGuardServiceImpl::new(rate_limiter.clone()), rate_limiter)
    }

    fn user_subject(username: &str, forwarded_for: &str) -> Option<Subject> {
        let mut headers = HashMap::new();
        headers.insert("x-forwarded-for".to_string(), forwarded_for.to_string());
        Some(Subject {
            identifier: String::new(),
            username: username.to_string(),
            headers,
        })
    }

    fn id_subject(identifier: &str) -> Option<Subject> {
        Some(Subject {
            identifier: identifier.to_string(),
            ..Default::default()
        })
    }

    async fn evaluate(service: &LoginGuardServiceImpl, identifier: &str) -> EvaluateResponse {
        service
            .evaluate(Request::new(EvaluateRequest {
                subject: id_subject(identifier),
            }))
            .await
            .unwrap()
            .into_inner()
    }

    #[test]
    fn test_resolve_explicit_identifier() {
        let id = resolve_identifier(id_subject("1.2.3.4:bob"), &MetadataMap::new()).unwrap();
        assert_eq!(id, "1.2.3.4:bob");

        let id = resolve_identifier(id_subject(" 1.2.3.4:bob "), &MetadataMap::new()).unwrap();
        assert_eq!(id, " 1.2.3.4:bob ");
    }

    #[tokio::test]
    async fn test_padded_identifier_is_a_separate_bucket() {
        let (service, _) = service();
        for _ in 0..5 {
            assert_ok!(
                service
                    .record_failure(Request::new(RecordFailureRequest {
                        subject: id_subject(" a"),
                    }))
                    .await
            );
        }

        let padded = evaluate(&service, " a").await;
        assert_eq!(padded.outcome, i32::from(Outcome::Blocked));

        let plain = evaluate(&service, "a").await;
        assert_eq!(plain.outcome, i32::from(Outcome::Allowed));
    }

    #[test]
    fn test_resolve_from_subject_headers() {
        let id = resolve_identifier(
            user_subject("alice", "203.0.113.5, 10.0.0.1"),
            &MetadataMap::new(),
        )
        .unwrap();
        assert_eq!(id, "203.0.113.5:alice");
    }

    #[test]
    fn test_resolve_falls_back_to_metadata() {
        let mut metadata = MetadataMap::new();
        metadata.insert("x-real-ip", "198.51.100.9".parse().unwrap());
        let subject = Some(Subject {
            username: "dave".to_string(),
            ..Default::default()
        });

        let id = resolve_identifier(subject, &metadata).unwrap();
        assert_eq!(id, "198.51.100.9:dave");
    }

    #[test]
    fn test_resolve_unknown_client() {
        let subject = Some(Subject {
            username: "erin".to_string(),
            ..Default::default()
        });
        let id = resolve_identifier(subject, &MetadataMap::new()).unwrap();
        assert_eq!(id, "unknown:erin");
    }

    #[tokio::test]
    async fn test_missing_subject_rejected() {
        let (service, _) = service();

        let result = service
            .check(Request::new(CheckRequest { subject: None }))
            .await;
        let status = assert_err!(result);
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_empty_subject_rejected() {
        let (service, _) = service();

        let result = service
            .record_failure(Request::new(RecordFailureRequest {
                subject: Some(Subject::default()),
            }))
            .await;
        let status = assert_err!(result);
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_failures_lead_to_block() {
        let (service, rate_limiter) = service();

        for _ in 0..5 {
            assert_ok!(
                service
                    .record_failure(Request::new(RecordFailureRequest {
                        subject: user_subject("bob", "1.2.3.4"),
                    }))
                    .await
            );
        }
        assert_eq!(rate_limiter.attempt_count("1.2.3.4:bob"), Some(5));

        let response = service
            .check(Request::new(CheckRequest {
                subject: id_subject("1.2.3.4:bob"),
            }))
            .await
            .unwrap()
            .into_inner();
        let status = response.status.unwrap();

        assert!(status.is_limited);
        assert_eq!(status.remaining, 0);
        assert_eq!(status.identifier, "1.2.3.4:bob");
        let retry_after = status.retry_after.unwrap();
        assert!(retry_after.seconds >= 1799 && retry_after.seconds <= 1800);
        assert!(status.headers.iter().any(|h| h.name == "Retry-After"));

        let stats = service
            .get_stats(Request::new(StatsRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(stats.total_tracked, 1);
        assert_eq!(stats.blocked_count, 1);
    }

    #[tokio::test]
    async fn test_evaluate_outcomes() {
        let (service, rate_limiter) = service();

        let response = evaluate(&service, "id").await;
        assert_eq!(response.outcome, i32::from(Outcome::Allowed));
        assert!(response.delay.is_none());

        rate_limiter.record_attempt("id");
        let response = evaluate(&service, "id").await;
        assert_eq!(response.outcome, i32::from(Outcome::Delayed));
        assert_eq!(response.delay.unwrap().seconds, 1);

        for _ in 0..4 {
            rate_limiter.record_attempt("id");
        }
        let response = evaluate(&service, "id").await;
        assert_eq!(response.outcome, i32::from(Outcome::Blocked));
        assert!(response.status.unwrap().is_limited);
    }

    #[tokio::test]
    async fn test_reset_and_delay() {
        let (service, rate_limiter) = service();
        rate_limiter.record_attempt("id");
        rate_limiter.record_attempt("id");

        let delay = service
            .get_progressive_delay(Request::new(ProgressiveDelayRequest {
                subject: id_subject("id"),
            }))
            .await
            .unwrap()
            .into_inner()
            .delay
            .unwrap();
        assert_eq!(delay.seconds, 2);

        let response = service
            .reset(Request::new(ResetRequest {
                subject: id_subject("id"),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.identifier, "id");
        assert_eq!(rate_limiter.attempt_count("id"), None);
    }
}
