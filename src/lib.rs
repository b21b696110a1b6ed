//! # aws-iam-policy
//!
//! Declarative lifecycle component for AWS IAM managed policies.
//!
//! An orchestrator drives one [`IamPolicy`] handler through each pass:
//!
//! ```no_run
//! use aws_iam_policy::{IamPolicy, PolicyConfig, PolicyInputs, StateFile};
//! use declarative::{ApplyContext, Constructable, InstanceId, LogProgress, reconcile};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let policy = IamPolicy::new(iamkit::Client::new()?, PolicyConfig::default())?;
//! let state_path = Path::new(".state/policies.json");
//! let mut states: StateFile = StateFile::load(state_path)?;
//!
//! let id = InstanceId::new("a1b2");
//! let inputs = PolicyInputs::new(serde_json::json!({
//!     "Version": "2012-10-17",
//!     "Statement": [{"Effect": "Allow", "Action": "s3:GetObject", "Resource": "*"}]
//! }));
//! let mut state = policy.construct(inputs, &id)?;
//!
//! let mut progress = LogProgress;
//! let mut ctx = ApplyContext::new(&mut progress);
//! reconcile(&policy, &mut state, states.get(&id), &mut ctx)?;
//!
//! states.record(id, state);
//! states.save(state_path)?;
//! # Ok(())
//! # }
//! ```
//!
//! [`apply()`] runs that loop over a whole set of declared policies and
//! destroys the ones that are no longer declared.

pub mod apply;
pub mod config;
pub mod policy;
pub mod state;

pub use apply::apply;
pub use config::{PolicyConfig, PropagationConfig, PropagationMode, RetrySettings};
pub use policy::{IamPolicy, KIND, PolicyInputs, PolicyInstance, default_name};
pub use state::StateFile;
