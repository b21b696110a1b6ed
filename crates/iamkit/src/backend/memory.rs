//! In-memory IAM account.
//!
//! Behaves like the provider for the operations the [`Backend`] trait covers:
//! names are unique, attached policies cannot be deleted, and missing
//! entities produce not-found errors. Every call is recorded so tests can
//! assert on ordering, and failures can be injected per operation.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{CreatePolicyRequest, EntityKind, Operation, Policy, PolicyEntities};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A call made against the backend, in the order it was received.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreatePolicy { name: String },
    GetPolicy { arn: String },
    ListEntitiesForPolicy { arn: String },
    Detach {
        kind: EntityKind,
        arn: String,
        entity: String,
    },
    DeletePolicy { arn: String },
}

impl Call {
    /// The operation this call invoked.
    pub fn operation(&self) -> Operation {
        match self {
            Call::CreatePolicy { .. } => Operation::CreatePolicy,
            Call::GetPolicy { .. } => Operation::GetPolicy,
            Call::ListEntitiesForPolicy { .. } => Operation::ListEntitiesForPolicy,
            Call::Detach { kind, .. } => kind.detach_operation(),
            Call::DeletePolicy { .. } => Operation::DeletePolicy,
        }
    }
}

#[derive(Debug)]
struct Fault {
    operation: Operation,
    entity: Option<String>,
    message: String,
    remaining: Option<u32>,
}

#[derive(Debug)]
struct StoredPolicy {
    policy: Policy,
    document: String,
    attached: BTreeMap<EntityKind, BTreeSet<String>>,
}

impl StoredPolicy {
    fn entities(&self) -> PolicyEntities {
        let names = |kind: EntityKind| -> Vec<String> {
            self.attached
                .get(&kind)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default()
        };
        PolicyEntities {
            groups: names(EntityKind::Group),
            roles: names(EntityKind::Role),
            users: names(EntityKind::User),
        }
    }

    fn is_attached(&self) -> bool {
        self.attached.values().any(|set| !set.is_empty())
    }
}

#[derive(Debug, Default)]
struct State {
    policies: BTreeMap<String, StoredPolicy>,
    calls: Vec<Call>,
    faults: Vec<Fault>,
    unseen_reads: HashMap<String, u32>,
}

/// Backend that keeps policies in process memory.
#[derive(Debug)]
pub struct MemoryBackend {
    account_id: String,
    visibility_lag: u32,
    state: Mutex<State>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create an empty account.
    pub fn new() -> Self {
        Self {
            account_id: "123456789012".to_string(),
            visibility_lag: 0,
            state: Mutex::new(State::default()),
        }
    }

    /// Make newly created policies invisible to the first `reads` `get_policy` calls.
    pub fn with_visibility_lag(mut self, reads: u32) -> Self {
        self.visibility_lag = reads;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn arn_for(&self, path: &str, name: &str) -> String {
        format!("arn:aws:iam::{}:policy{}{}", self.account_id, path, name)
    }

    /// Seed an existing policy without recording a call. Returns its ARN.
    pub fn add_policy(&self, name: &str, document: &str) -> String {
        let arn = self.arn_for("/", name);
        self.lock().policies.insert(
            arn.clone(),
            StoredPolicy {
                policy: Policy {
                    name: name.to_string(),
                    arn: arn.clone(),
                    path: "/".to_string(),
                },
                document: document.to_string(),
                attached: BTreeMap::new(),
            },
        );
        arn
    }

    /// Attach a policy to an entity without recording a call.
    pub fn attach(&self, kind: EntityKind, arn: &str, entity: &str) -> Result<()> {
        let mut state = self.lock();
        let stored = state
            .policies
            .get_mut(arn)
            .ok_or_else(|| not_attachable(arn))?;
        stored
            .attached
            .entry(kind)
            .or_default()
            .insert(entity.to_string());
        Ok(())
    }

    /// Fail every call to `operation` with a provider-style `message`.
    pub fn fail(&self, operation: Operation, message: &str) {
        self.push_fault(operation, None, message, None);
    }

    /// Fail the next `times` calls to `operation`.
    pub fn fail_times(&self, operation: Operation, message: &str, times: u32) {
        self.push_fault(operation, None, message, Some(times));
    }

    /// Fail every call to `operation` that targets `entity`.
    pub fn fail_entity(&self, operation: Operation, entity: &str, message: &str) {
        self.push_fault(operation, Some(entity.to_string()), message, None);
    }

    fn push_fault(
        &self,
        operation: Operation,
        entity: Option<String>,
        message: &str,
        remaining: Option<u32>,
    ) {
        self.lock().faults.push(Fault {
            operation,
            entity,
            message: message.to_string(),
            remaining,
        });
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Calls received for one operation.
    pub fn calls_for(&self, operation: Operation) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .cloned()
            .collect()
    }

    /// Whether a policy with this ARN exists.
    pub fn contains(&self, arn: &str) -> bool {
        self.lock().policies.contains_key(arn)
    }

    /// The stored document text of a policy.
    pub fn document(&self, arn: &str) -> Option<String> {
        self.lock().policies.get(arn).map(|p| p.document.clone())
    }

    /// Number of policies in the account.
    pub fn policy_count(&self) -> usize {
        self.lock().policies.len()
    }

    /// Entities currently attached to a policy.
    pub fn attachments(&self, arn: &str) -> Option<PolicyEntities> {
        self.lock().policies.get(arn).map(StoredPolicy::entities)
    }
}

/// Record `call` and return an injected error if one matches.
fn enter(state: &mut State, call: Call, entity: Option<&str>) -> Result<()> {
    let operation = call.operation();
    state.calls.push(call);

    let position = state.faults.iter().position(|f| {
        f.operation == operation
            && f.remaining != Some(0)
            && f.entity.as_deref().is_none_or(|e| Some(e) == entity)
    });

    if let Some(index) = position {
        let fault = &mut state.faults[index];
        if let Some(remaining) = fault.remaining.as_mut() {
            *remaining -= 1;
        }
        return Err(Error::from_aws_output(&fault.message, entity));
    }
    Ok(())
}

fn not_attachable(arn: &str) -> Error {
    Error::NotFound {
        message: format!("Policy {arn} does not exist or is not attachable."),
    }
}

impl Backend for MemoryBackend {
    fn create_policy(&self, request: &CreatePolicyRequest) -> Result<Policy> {
        let mut state = self.lock();
        enter(
            &mut state,
            Call::CreatePolicy {
                name: request.name.clone(),
            },
            Some(&request.name),
        )?;

        if serde_json::from_str::<serde_json::Value>(&request.document).is_err() {
            return Err(Error::InvalidInput {
                message: "MalformedPolicyDocument: syntax errors in policy".to_string(),
            });
        }

        if state
            .policies
            .values()
            .any(|p| p.policy.name == request.name)
        {
            return Err(Error::AlreadyExists {
                name: request.name.clone(),
            });
        }

        let arn = self.arn_for(&request.path, &request.name);
        let policy = Policy {
            name: request.name.clone(),
            arn: arn.clone(),
            path: request.path.clone(),
        };
        state.policies.insert(
            arn.clone(),
            StoredPolicy {
                policy: policy.clone(),
                document: request.document.clone(),
                attached: BTreeMap::new(),
            },
        );
        if self.visibility_lag > 0 {
            state.unseen_reads.insert(arn, self.visibility_lag);
        }
        Ok(policy)
    }

    fn get_policy(&self, arn: &str) -> Result<Policy> {
        let mut state = self.lock();
        enter(
            &mut state,
            Call::GetPolicy {
                arn: arn.to_string(),
            },
            None,
        )?;

        if let Some(remaining) = state.unseen_reads.get_mut(arn) {
            *remaining -= 1;
            if *remaining == 0 {
                state.unseen_reads.remove(arn);
            }
            return Err(Error::NotFound {
                message: format!("Policy {arn} was not found."),
            });
        }

        state
            .policies
            .get(arn)
            .map(|p| p.policy.clone())
            .ok_or_else(|| Error::NotFound {
                message: format!("Policy {arn} was not found."),
            })
    }

    fn list_entities_for_policy(&self, arn: &str) -> Result<PolicyEntities> {
        let mut state = self.lock();
        enter(
            &mut state,
            Call::ListEntitiesForPolicy {
                arn: arn.to_string(),
            },
            None,
        )?;

        state
            .policies
            .get(arn)
            .map(StoredPolicy::entities)
            .ok_or_else(|| not_attachable(arn))
    }

    fn detach_group_policy(&self, arn: &str, group: &str) -> Result<()> {
        self.detach_entity(EntityKind::Group, arn, group)
    }

    fn detach_role_policy(&self, arn: &str, role: &str) -> Result<()> {
        self.detach_entity(EntityKind::Role, arn, role)
    }

    fn detach_user_policy(&self, arn: &str, user: &str) -> Result<()> {
        self.detach_entity(EntityKind::User, arn, user)
    }

    fn delete_policy(&self, arn: &str) -> Result<()> {
        let mut state = self.lock();
        enter(
            &mut state,
            Call::DeletePolicy {
                arn: arn.to_string(),
            },
            None,
        )?;

        let stored = state.policies.get(arn).ok_or_else(|| not_attachable(arn))?;
        if stored.is_attached() {
            return Err(Error::Conflict {
                message: "DeleteConflict: Cannot delete a policy attached to entities."
                    .to_string(),
            });
        }
        state.policies.remove(arn);
        Ok(())
    }
}

impl MemoryBackend {
    fn detach_entity(&self, kind: EntityKind, arn: &str, entity: &str) -> Result<()> {
        let mut state = self.lock();
        enter(
            &mut state,
            Call::Detach {
                kind,
                arn: arn.to_string(),
                entity: entity.to_string(),
            },
            Some(entity),
        )?;

        let stored = state
            .policies
            .get_mut(arn)
            .ok_or_else(|| not_attachable(arn))?;
        let removed = stored
            .attached
            .get_mut(&kind)
            .is_some_and(|set| set.remove(entity));
        if !removed {
            return Err(Error::NotFound {
                message: format!("NoSuchEntity: Policy {arn} was not found on {kind} {entity}."),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str) -> CreatePolicyRequest {
        CreatePolicyRequest {
            name: name.to_string(),
            path: "/".to_string(),
            document: r#"{"Version":"2012-10-17","Statement":[]}"#.to_string(),
        }
    }

    #[test]
    fn test_create_and_get() {
        let backend = MemoryBackend::new();
        let policy = backend.create_policy(&request("app")).unwrap();

        assert_eq!(policy.arn, "arn:aws:iam::123456789012:policy/app");
        assert_eq!(backend.get_policy(&policy.arn).unwrap(), policy);
        assert_eq!(
            backend.calls(),
            vec![
                Call::CreatePolicy { name: "app".into() },
                Call::GetPolicy {
                    arn: policy.arn.clone()
                },
            ]
        );
    }

    #[test]
    fn test_create_duplicate_name() {
        let backend = MemoryBackend::new();
        backend.create_policy(&request("app")).unwrap();
        let err = backend.create_policy(&request("app")).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[test]
    fn test_create_rejects_malformed_document() {
        let backend = MemoryBackend::new();
        let mut req = request("app");
        req.document = "{not json".to_string();
        let err = backend.create_policy(&req).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
        assert_eq!(backend.policy_count(), 0);
    }

    #[test]
    fn test_visibility_lag() {
        let backend = MemoryBackend::new().with_visibility_lag(2);
        let policy = backend.create_policy(&request("app")).unwrap();

        assert!(backend.get_policy(&policy.arn).is_err());
        assert!(backend.get_policy(&policy.arn).is_err());
        assert!(backend.get_policy(&policy.arn).is_ok());
    }

    #[test]
    fn test_delete_attached_policy_conflicts() {
        let backend = MemoryBackend::new();
        let arn = backend.add_policy("app", "{}");
        backend.attach(EntityKind::Role, &arn, "lambda").unwrap();

        let err = backend.delete_policy(&arn).unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));

        backend.detach_role_policy(&arn, "lambda").unwrap();
        backend.delete_policy(&arn).unwrap();
        assert!(!backend.contains(&arn));
    }

    #[test]
    fn test_delete_missing_policy_is_already_gone() {
        let backend = MemoryBackend::new();
        let err = backend
            .delete_policy("arn:aws:iam::123456789012:policy/missing")
            .unwrap_err();
        assert!(err.is_already_gone());
    }

    #[test]
    fn test_detach_not_attached() {
        let backend = MemoryBackend::new();
        let arn = backend.add_policy("app", "{}");
        let err = backend.detach_user_policy(&arn, "alice").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_fail_times() {
        let backend = MemoryBackend::new();
        backend.fail_times(Operation::CreatePolicy, "Throttling: Rate exceeded", 1);

        let err = backend.create_policy(&request("app")).unwrap_err();
        assert!(err.is_retryable());
        assert!(backend.create_policy(&request("app")).is_ok());
    }

    #[test]
    fn test_fail_entity_only_matches_that_entity() {
        let backend = MemoryBackend::new();
        let arn = backend.add_policy("app", "{}");
        backend.attach(EntityKind::Role, &arn, "a").unwrap();
        backend.attach(EntityKind::Role, &arn, "b").unwrap();
        backend.fail_entity(Operation::DetachRolePolicy, "a", "AccessDenied");

        assert!(backend.detach_role_policy(&arn, "a").is_err());
        assert!(backend.detach_role_policy(&arn, "b").is_ok());
        assert_eq!(
            backend.attachments(&arn).unwrap().roles,
            vec!["a".to_string()]
        );
    }

    #[test]
    fn test_list_entities() {
        let backend = MemoryBackend::new();
        let arn = backend.add_policy("app", "{}");
        backend.attach(EntityKind::Group, &arn, "admins").unwrap();
        backend.attach(EntityKind::User, &arn, "alice").unwrap();

        let entities = backend.list_entities_for_policy(&arn).unwrap();
        assert_eq!(entities.groups, vec!["admins".to_string()]);
        assert!(entities.roles.is_empty());
        assert_eq!(entities.users, vec!["alice".to_string()]);
    }
}
