//! AWS IAM managed policy component
//!
//! [`IamPolicy`] implements the full lifecycle contract for one managed
//! policy:
//! - construct: validate inputs, derive `policy-<instanceId>` when unnamed
//! - hydrate: carry the ARN over from the previous pass
//! - decide: a new name or a new document replaces the policy, since IAM
//!   has no in-place update for either
//! - deploy: create, then wait for the policy to become attachable
//! - remove: detach from every group, role and user, then delete
//! - info: `{ title: name, type: "AwsIamPolicy", data: { arn } }`

mod cleanup;
mod propagation;

use crate::config::PolicyConfig;
use cleanup::Cleanup;
use declarative::{
    ApplyContext, ComponentKind, ConfigChange, Constructable, Decision, Declared, Deployable,
    Describable, Hydratable, InfoRecord, InstanceId, LifecycleError, Removable, decide,
};
use iamkit::backend::Backend;
use iamkit::{Client, Operation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind name reported by `info`
pub const KIND: &str = "AwsIamPolicy";

/// What the caller declares for one policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyInputs {
    #[serde(default, alias = "policyName")]
    pub name: Option<String>,
    #[serde(default)]
    pub document: Option<Value>,
}

impl PolicyInputs {
    pub fn new(document: Value) -> Self {
        Self {
            name: None,
            document: Some(document),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// One pass's state for a policy; persisted by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyInstance {
    pub name: String,
    pub document: Value,
    /// ARN, present once the policy has been created
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "arn")]
    pub remote_id: Option<String>,
}

impl PolicyInstance {
    pub fn arn(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }
}

/// Name used when the caller does not supply one
pub fn default_name(instance_id: &InstanceId) -> String {
    format!("policy-{instance_id}")
}

/// Lifecycle handler for IAM managed policies
pub struct IamPolicy {
    client: Client,
    config: PolicyConfig,
}

impl IamPolicy {
    /// Create a handler around `client`, applying the configured retry policy.
    ///
    /// Fails with a configuration error if `config` does not validate.
    pub fn new(client: Client, config: PolicyConfig) -> Result<Self, LifecycleError> {
        config
            .validate()
            .map_err(|e| LifecycleError::configuration(format!("{e:#}")))?;
        let client = client.with_retry_config(config.retry.to_retry_config());
        Ok(Self { client, config })
    }

    pub fn with_backend(
        backend: Box<dyn Backend>,
        config: PolicyConfig,
    ) -> Result<Self, LifecycleError> {
        Self::new(Client::with_backend(backend), config)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }
}

impl ComponentKind for IamPolicy {
    type State = PolicyInstance;

    fn kind(&self) -> &'static str {
        KIND
    }
}

impl Constructable for IamPolicy {
    type Inputs = PolicyInputs;

    fn construct(
        &self,
        inputs: PolicyInputs,
        instance_id: &InstanceId,
    ) -> Result<PolicyInstance, LifecycleError> {
        let document = match inputs.document {
            Some(Value::Null) | None => {
                return Err(LifecycleError::configuration(format!(
                    "policy document is required for instance {instance_id}"
                )));
            }
            Some(document) => document,
        };

        let name = inputs
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| default_name(instance_id));

        Ok(PolicyInstance {
            name,
            document,
            remote_id: None,
        })
    }
}

impl Hydratable for IamPolicy {
    fn hydrate(&self, state: &mut PolicyInstance, previous: Option<&PolicyInstance>) {
        state.remote_id = previous.and_then(|p| p.remote_id.clone());
    }
}

impl Deployable for IamPolicy {
    fn should_deploy(&self, state: &PolicyInstance, previous: Option<&PolicyInstance>) -> Decision {
        // A previous pass that never got an ARN created nothing
        let previous = previous.filter(|p| p.remote_id.is_some());
        decide(
            Declared::new(&state.name, &state.document),
            previous.map(|p| Declared::new(&p.name, &p.document)),
            ConfigChange::Replace,
        )
    }

    fn deploy(
        &self,
        state: &mut PolicyInstance,
        ctx: &mut ApplyContext,
    ) -> Result<(), LifecycleError> {
        ctx.log(&format!("Creating Policy: {}", state.name));
        state.remote_id = None;

        let policy = self
            .client
            .create_policy(&state.name, &self.config.path, &state.document)
            .map_err(|e| LifecycleError::remote(&state.name, Operation::CreatePolicy.as_str(), e))?;

        // Recorded before waiting so a failed wait still leaves the ARN on state
        state.remote_id = Some(policy.arn.clone());

        ctx.log(&format!(
            "Policy '{}' created with arn: '{}'",
            state.name, policy.arn
        ));

        propagation::wait_until_attachable(
            &self.client,
            &self.config.propagation,
            &state.name,
            &policy.arn,
            ctx,
        )
    }
}

impl Removable for IamPolicy {
    fn remove(&self, state: &PolicyInstance, ctx: &mut ApplyContext) -> Result<(), LifecycleError> {
        let Some(arn) = state.arn() else {
            log::debug!("{}: never deployed, nothing to remove", state.name);
            return Ok(());
        };

        ctx.log(&format!("Removing Policy: {}", state.name));

        match cleanup::delete_policy(&self.client, &state.name, arn, self.config.detach_jobs)? {
            Cleanup::Deleted { detached } => {
                log::debug!("{}: deleted after detaching {detached} entities", state.name);
            }
            Cleanup::AlreadyGone => {
                log::debug!("{}: {arn} was already removed", state.name);
            }
        }

        ctx.log(&format!("Policy '{}' removed.", state.name));
        Ok(())
    }
}

impl Describable for IamPolicy {
    fn info(&self, state: &PolicyInstance) -> InfoRecord {
        InfoRecord {
            title: state.name.clone(),
            kind: KIND.to_string(),
            data: serde_json::json!({ "arn": state.remote_id }),
        }
    }
}
