//! Waiting for a new policy to become attachable
//!
//! IAM is eventually consistent: a policy returned by CreatePolicy may not
//! be attachable by a dependent for several seconds. Deploy blocks here so
//! that dependents created afterwards can rely on it.

use crate::config::{PropagationConfig, PropagationMode};
use declarative::{ApplyContext, LifecycleError};
use iamkit::{Client, Operation};
use std::time::Instant;

/// Block until `arn` is considered visible, per `settings`.
///
/// Honors the context's cancellation token and deadline in addition to
/// the configured timeout.
pub(crate) fn wait_until_attachable(
    client: &Client,
    settings: &PropagationConfig,
    resource: &str,
    arn: &str,
    ctx: &ApplyContext,
) -> Result<(), LifecycleError> {
    match settings.mode {
        PropagationMode::Fixed => {
            log::debug!("{resource}: waiting {:?} for propagation", settings.fixed_delay());
            ctx.pause(resource, settings.fixed_delay())
        }
        PropagationMode::Poll => {
            poll(client, settings, resource, arn, ctx)?;
            let settle = settings.settle_delay();
            if !settle.is_zero() {
                ctx.pause(resource, settle)?;
            }
            Ok(())
        }
    }
}

fn poll(
    client: &Client,
    settings: &PropagationConfig,
    resource: &str,
    arn: &str,
    ctx: &ApplyContext,
) -> Result<(), LifecycleError> {
    let started = Instant::now();
    let bound = settings.timeout();
    let mut confirmations = 0;

    loop {
        ctx.checkpoint(resource, started)?;

        let visible = client
            .policy_exists(arn)
            .map_err(|e| LifecycleError::remote(resource, Operation::GetPolicy.as_str(), e))?;

        if visible {
            confirmations += 1;
            if confirmations >= settings.required_confirmations {
                log::debug!(
                    "{resource}: visible after {:?} ({confirmations} consecutive reads)",
                    started.elapsed()
                );
                return Ok(());
            }
        } else {
            confirmations = 0;
        }

        let left = bound.saturating_sub(started.elapsed());
        if left.is_zero() {
            return Err(LifecycleError::Timeout {
                resource: resource.to_string(),
                waited: started.elapsed(),
            });
        }
        ctx.pause(resource, settings.poll_interval().min(left))?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{CancelToken, ErrorKind, NoProgress};
    use iamkit::RetryConfig;
    use iamkit::backend::memory::MemoryBackend;
    use std::sync::Arc;
    use std::time::Duration;

    fn client(backend: &Arc<MemoryBackend>) -> Client {
        Client::with_backend(Box::new(backend.clone())).with_retry_config(RetryConfig::no_retry())
    }

    fn polling(timeout_secs: u64, confirmations: u32) -> PropagationConfig {
        PropagationConfig {
            mode: PropagationMode::Poll,
            poll_interval_ms: 1,
            timeout_secs,
            required_confirmations: confirmations,
            settle_delay_ms: 0,
            fixed_delay_secs: 0,
        }
    }

    #[test]
    fn test_poll_waits_out_visibility_lag() {
        let backend = Arc::new(MemoryBackend::new().with_visibility_lag(3));
        let client = client(&backend);
        let policy = client
            .create_policy("app", "/", &serde_json::json!({}))
            .unwrap();
        let mut progress = NoProgress;
        let ctx = ApplyContext::new(&mut progress);

        wait_until_attachable(&client, &polling(5, 2), "app", &policy.arn, &ctx).unwrap();

        // three unseen reads, then two confirmations
        assert_eq!(backend.calls_for(Operation::GetPolicy).len(), 5);
    }

    #[test]
    fn test_poll_times_out_when_never_visible() {
        let backend = Arc::new(MemoryBackend::new());
        let client = client(&backend);
        let mut progress = NoProgress;
        let ctx = ApplyContext::new(&mut progress);

        let err = wait_until_attachable(
            &client,
            &polling(0, 1),
            "app",
            "arn:aws:iam::123456789012:policy/app",
            &ctx,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_poll_honors_context_deadline() {
        let backend = Arc::new(MemoryBackend::new());
        let client = client(&backend);
        let mut progress = NoProgress;
        let ctx = ApplyContext::new(&mut progress).with_timeout(Duration::from_millis(20));

        let started = Instant::now();
        let err = wait_until_attachable(
            &client,
            &polling(60, 1),
            "app",
            "arn:aws:iam::123456789012:policy/app",
            &ctx,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_fixed_delay_honors_cancel() {
        let backend = Arc::new(MemoryBackend::new());
        let client = client(&backend);
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut progress = NoProgress;
        let ctx = ApplyContext::new(&mut progress).with_cancel(cancel);
        let settings = PropagationConfig {
            mode: PropagationMode::Fixed,
            fixed_delay_secs: 15,
            ..PropagationConfig::default()
        };

        let err = wait_until_attachable(&client, &settings, "app", "arn", &ctx).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_read_errors_are_remote_failures() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail(
            Operation::GetPolicy,
            "An error occurred (AccessDenied) when calling the GetPolicy operation",
        );
        let client = client(&backend);
        let mut progress = NoProgress;
        let ctx = ApplyContext::new(&mut progress);

        let err = wait_until_attachable(&client, &polling(5, 1), "app", "arn", &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteOperation);
    }
}
