//! Reconcile a set of declared policies against a state file
//!
//! Every declared instance gets one reconcile pass; instances present in
//! the state file but no longer declared are destroyed. Failures are
//! logged and counted, and the remaining instances still run.

use crate::policy::{IamPolicy, PolicyInputs, PolicyInstance};
use crate::state::StateFile;
use declarative::{
    ApplyContext, Constructable, InstanceId, ReconcileSummary, destroy, reconcile,
};
use std::collections::BTreeSet;

/// Run one pass over `declared`, updating `states` in place.
///
/// The caller saves `states` afterwards; it reflects every resource that
/// exists remotely, including ones created by a pass that later failed.
pub fn apply(
    policy: &IamPolicy,
    declared: Vec<(InstanceId, PolicyInputs)>,
    states: &mut StateFile<PolicyInstance>,
    ctx: &mut ApplyContext,
) -> ReconcileSummary {
    let mut summary = ReconcileSummary::default();
    let declared_ids: BTreeSet<InstanceId> = declared.iter().map(|(id, _)| id.clone()).collect();

    for (id, inputs) in declared {
        let mut state = match policy.construct(inputs, &id) {
            Ok(state) => state,
            Err(e) => {
                log::error!("{id}: {e}");
                summary.failed += 1;
                continue;
            }
        };

        let previous = states.get(&id).cloned();
        let result = reconcile(policy, &mut state, previous.as_ref(), ctx);

        match &result {
            Ok(_) => states.record(id, state),
            Err(e) => {
                log::error!("{}: {e}", state.name);
                // Unchanged identity means nothing remote moved; keep the old record
                let previous_id = previous.as_ref().and_then(PolicyInstance::arn);
                if state.arn() != previous_id {
                    states.record(id, state);
                }
            }
        }
        summary.record(&result);
    }

    let stale: Vec<InstanceId> = states
        .instances
        .keys()
        .filter(|id| !declared_ids.contains(*id))
        .cloned()
        .collect();

    for id in stale {
        let Some(previous) = states.get(&id).cloned() else {
            continue;
        };
        let result = destroy(policy, &previous, ctx);
        match &result {
            Ok(_) => {
                states.forget(&id);
            }
            Err(e) => log::error!("{}: {e}", previous.name),
        }
        summary.record(&result);
    }

    log::info!(
        "{} change(s) over {} instance(s), {} failed",
        summary.total_changes(),
        summary.total(),
        summary.failed
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PolicyConfig, PropagationConfig, RetrySettings};
    use declarative::NoProgress;
    use iamkit::Operation;
    use iamkit::backend::memory::MemoryBackend;
    use serde_json::json;
    use std::sync::Arc;

    fn component(backend: &Arc<MemoryBackend>) -> IamPolicy {
        let config = PolicyConfig {
            propagation: PropagationConfig {
                poll_interval_ms: 1,
                timeout_secs: 5,
                required_confirmations: 1,
                ..PropagationConfig::default()
            },
            retry: RetrySettings {
                max_attempts: 1,
                ..RetrySettings::default()
            },
            ..PolicyConfig::default()
        };
        IamPolicy::with_backend(Box::new(backend.clone()), config).unwrap()
    }

    fn declared(id: &str, name: &str) -> (InstanceId, PolicyInputs) {
        (
            InstanceId::new(id),
            PolicyInputs::new(json!({"Version": "2012-10-17", "Statement": []})).with_name(name),
        )
    }

    #[test]
    fn test_creates_then_leaves_unchanged() {
        let backend = Arc::new(MemoryBackend::new());
        let policy = component(&backend);
        let mut states = StateFile::default();
        let mut progress = NoProgress;
        let mut ctx = ApplyContext::new(&mut progress);

        let first = apply(
            &policy,
            vec![declared("a", "pa"), declared("b", "pb")],
            &mut states,
            &mut ctx,
        );
        assert_eq!(first.created, 2);
        assert!(first.is_success());
        assert_eq!(states.instances.len(), 2);

        let second = apply(
            &policy,
            vec![declared("a", "pa"), declared("b", "pb")],
            &mut states,
            &mut ctx,
        );
        assert_eq!(second.unchanged, 2);
        assert_eq!(second.total_changes(), 0);
        assert_eq!(backend.policy_count(), 2);
    }

    #[test]
    fn test_undeclared_instances_are_destroyed() {
        let backend = Arc::new(MemoryBackend::new());
        let policy = component(&backend);
        let mut states = StateFile::default();
        let mut progress = NoProgress;
        let mut ctx = ApplyContext::new(&mut progress);

        apply(
            &policy,
            vec![declared("a", "pa"), declared("b", "pb")],
            &mut states,
            &mut ctx,
        );
        let summary = apply(&policy, vec![declared("a", "pa")], &mut states, &mut ctx);

        assert_eq!(summary.removed, 1);
        assert_eq!(summary.unchanged, 1);
        assert!(states.get(&InstanceId::new("b")).is_none());
        assert_eq!(backend.policy_count(), 1);
    }

    #[test]
    fn test_failures_are_counted_and_do_not_stop_others() {
        let backend = Arc::new(MemoryBackend::new());
        let policy = component(&backend);
        let mut states = StateFile::default();
        let mut progress = NoProgress;
        let mut ctx = ApplyContext::new(&mut progress);
        let missing_document = (InstanceId::new("c"), PolicyInputs::default());

        let summary = apply(
            &policy,
            vec![missing_document, declared("a", "pa")],
            &mut states,
            &mut ctx,
        );

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.created, 1);
        assert!(!summary.is_success());
        assert!(states.get(&InstanceId::new("c")).is_none());
    }

    #[test]
    fn test_failed_replace_records_removal() {
        let backend = Arc::new(MemoryBackend::new());
        let policy = component(&backend);
        let mut states = StateFile::default();
        let mut progress = NoProgress;
        let mut ctx = ApplyContext::new(&mut progress);

        apply(&policy, vec![declared("a", "p1")], &mut states, &mut ctx);
        backend.fail_times(
            Operation::CreatePolicy,
            "An error occurred (AccessDenied) when calling the CreatePolicy operation",
            1,
        );

        let failed = apply(&policy, vec![declared("a", "p2")], &mut states, &mut ctx);
        assert_eq!(failed.failed, 1);
        let recorded = states.get(&InstanceId::new("a")).unwrap();
        assert_eq!(recorded.name, "p2");
        assert!(recorded.remote_id.is_none());

        let retried = apply(&policy, vec![declared("a", "p2")], &mut states, &mut ctx);
        assert_eq!(retried.created, 1);
        assert_eq!(backend.policy_count(), 1);
    }

    #[test]
    fn test_failed_remove_keeps_previous_record() {
        let backend = Arc::new(MemoryBackend::new());
        let policy = component(&backend);
        let mut states = StateFile::default();
        let mut progress = NoProgress;
        let mut ctx = ApplyContext::new(&mut progress);

        apply(&policy, vec![declared("a", "p1")], &mut states, &mut ctx);
        let before = states.get(&InstanceId::new("a")).cloned().unwrap();
        backend.fail(
            Operation::DeletePolicy,
            "An error occurred (AccessDenied) when calling the DeletePolicy operation",
        );

        let summary = apply(&policy, vec![declared("a", "p2")], &mut states, &mut ctx);

        assert_eq!(summary.failed, 1);
        assert_eq!(states.get(&InstanceId::new("a")), Some(&before));
    }
}
