//! # Declarative
//!
//! A framework for the lifecycle of declaratively managed remote resources.
//!
//! A component manages one remote resource inside a larger graph. Each pass
//! the orchestrator constructs fresh state from the declared inputs, hydrates
//! it from the previous pass, asks the component what to do, and then
//! deploys or removes before persisting the state for next time.
//!
//! ## Core Concepts
//!
//! - **Component**: a handler implementing the five capability traits
//!   ([`Constructable`], [`Hydratable`], [`Deployable`], [`Removable`],
//!   [`Describable`])
//! - **State**: the serializable per-instance data (declared inputs plus
//!   resolved remote identity)
//! - **Decision**: `NoOp`, `Deploy` or `Replace`, computed by [`decide`]
//! - **ApplyContext**: progress sink, deadline and cancellation for a pass
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{reconcile, ApplyContext, InstanceId, LogProgress};
//!
//! let component = MyComponent::new(client);
//! let mut state = component.construct(inputs, &InstanceId::new("a1b2"))?;
//!
//! let mut progress = LogProgress;
//! let mut ctx = ApplyContext::new(&mut progress).with_timeout(Duration::from_secs(120));
//! let outcome = reconcile(&component, &mut state, previous.as_ref(), &mut ctx)?;
//! // persist `state` as the next pass's `previous`
//! ```
//!
//! ## Provider Traits
//!
//! - [`ProgressCallback`]: receives decisions, messages and outcomes
//! - [`CancelToken`]: lets the caller stop a pass that is waiting on the provider

pub mod component;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod types;

// Re-export main types at crate root
pub use component::{
    Component, ComponentKind, Constructable, Deployable, Describable, Hydratable, Removable,
};
pub use context::{ApplyContext, CancelToken, LogProgress, NoProgress, ProgressCallback};
pub use diff::{ConfigChange, Decision, Declared, decide};
pub use error::{DependentFailure, ErrorKind, LifecycleError};
pub use executor::{destroy, reconcile, run_concurrently};
pub use types::{InfoRecord, InstanceId, Outcome, ReconcileSummary};
