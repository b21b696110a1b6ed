//! Capability traits for declarative components
//!
//! A component manages one kind of remote resource. Rather than layering
//! behavior through a base type, each lifecycle step is its own trait and a
//! resource kind implements all five on a handler type. The handler holds
//! whatever it needs to talk to the provider (a client, settings); the
//! per-pass data lives in [`ComponentKind::State`], which the orchestrator
//! persists between passes.

use crate::context::ApplyContext;
use crate::diff::Decision;
use crate::error::LifecycleError;
use crate::types::{InfoRecord, InstanceId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// Identity of a component kind and the shape of its instance state
pub trait ComponentKind: Send + Sync {
    /// Declared inputs plus resolved remote identity for one instance
    type State: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync;

    /// Kind name reported in `info`, e.g. "AwsIamPolicy"
    fn kind(&self) -> &'static str;
}

/// Build fresh instance state from caller inputs
pub trait Constructable: ComponentKind {
    type Inputs;

    /// Validate inputs and compute defaults.
    ///
    /// `instance_id` is assigned once per logical instance by the
    /// orchestrator; defaults derived from it are stable across passes.
    fn construct(
        &self,
        inputs: Self::Inputs,
        instance_id: &InstanceId,
    ) -> Result<Self::State, LifecycleError>;
}

/// Carry observed remote identity over from the previous pass
pub trait Hydratable: ComponentKind {
    /// Copy resolved remote fields from `previous`; never declared inputs.
    ///
    /// With no `previous`, remote fields must end up unset: the driver calls
    /// `hydrate(state, None)` after removing the resource they named.
    fn hydrate(&self, state: &mut Self::State, previous: Option<&Self::State>);
}

/// Decide on and perform creation
pub trait Deployable: ComponentKind {
    /// Compare declared inputs with the previous pass. Pure.
    fn should_deploy(&self, state: &Self::State, previous: Option<&Self::State>) -> Decision;

    /// Create the remote resource and record its identity on `state`.
    ///
    /// Must not return until the resource is usable by dependents.
    fn deploy(&self, state: &mut Self::State, ctx: &mut ApplyContext)
    -> Result<(), LifecycleError>;
}

/// Tear down the remote resource
pub trait Removable: ComponentKind {
    /// Remove the resource `state` refers to. A state with no remote
    /// identity, or a resource that is already gone, is a successful no-op.
    fn remove(&self, state: &Self::State, ctx: &mut ApplyContext) -> Result<(), LifecycleError>;
}

/// Project state into a display record
pub trait Describable: ComponentKind {
    /// Pure projection; never fails
    fn info(&self, state: &Self::State) -> InfoRecord;
}

/// A component implementing the full lifecycle contract
pub trait Component: Constructable + Hydratable + Deployable + Removable + Describable {}

impl<T> Component for T where T: Constructable + Hydratable + Deployable + Removable + Describable {}
