//! Policy removal: release every attachment, then delete
//!
//! A managed policy cannot be deleted while anything is attached to it, so
//! removal lists the attached groups, roles and users, detaches all of them
//! concurrently, and only deletes once every detach has succeeded.

use declarative::{DependentFailure, LifecycleError, run_concurrently};
use iamkit::{Client, EntityKind, Operation};

/// How a removal finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cleanup {
    /// The policy was deleted after releasing `detached` entities
    Deleted { detached: usize },
    /// The provider reported the policy missing; nothing left to do
    AlreadyGone,
}

/// Detach `arn` from every entity and delete it.
///
/// `resource` names the policy in errors.
pub(crate) fn delete_policy(
    client: &Client,
    resource: &str,
    arn: &str,
    jobs: usize,
) -> Result<Cleanup, LifecycleError> {
    let entities = match client.list_entities_for_policy(arn) {
        Ok(entities) => entities,
        Err(e) if e.is_already_gone() => {
            log::debug!("{resource}: listing attachments found no policy: {e}");
            return Ok(Cleanup::AlreadyGone);
        }
        Err(e) => {
            return Err(LifecycleError::remote(
                resource,
                Operation::ListEntitiesForPolicy.as_str(),
                e,
            ));
        }
    };

    let targets: Vec<(EntityKind, String)> = entities
        .iter()
        .map(|(kind, name)| (kind, name.to_string()))
        .collect();

    if !targets.is_empty() {
        log::debug!("{resource}: detaching {} entities", targets.len());
    }

    let results = run_concurrently(&targets, jobs, |(kind, name)| {
        client.detach(*kind, arn, name)
    });

    let failures: Vec<DependentFailure> = targets
        .iter()
        .zip(results)
        .filter_map(|((kind, name), result)| {
            result.err().map(|e| DependentFailure {
                entity: format!("{kind} {name}"),
                error: e.to_string(),
            })
        })
        .collect();

    if !failures.is_empty() {
        return Err(LifecycleError::Dependents {
            resource: resource.to_string(),
            failures,
        });
    }

    match client.delete_policy(arn) {
        Ok(()) => Ok(Cleanup::Deleted {
            detached: targets.len(),
        }),
        Err(e) if e.is_already_gone() => {
            log::debug!("{resource}: policy already deleted: {e}");
            Ok(Cleanup::AlreadyGone)
        }
        Err(e) => Err(LifecycleError::remote(
            resource,
            Operation::DeletePolicy.as_str(),
            e,
        )),
    }
}
