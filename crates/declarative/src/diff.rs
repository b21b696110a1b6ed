//! Decision procedure for a single instance

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a reconcile pass must do for one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    /// Inputs are unchanged; leave the remote resource alone
    NoOp,
    /// Create the resource (first deploy, or an in-place redeploy)
    Deploy,
    /// Remove the previous resource, then create a new one
    Replace,
}

impl Decision {
    /// Check if the decision calls the provider at all
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoOp)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NoOp => "no-op",
            Self::Deploy => "deploy",
            Self::Replace => "replace",
        };
        f.write_str(label)
    }
}

/// How a resource kind handles a change to its non-identity inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigChange {
    /// The provider can apply the new inputs to the existing resource
    Redeploy,
    /// The resource is immutable once created; the old one must be removed first
    Replace,
}

/// The parts of an instance that drive the decision
#[derive(Debug, Clone, Copy)]
pub struct Declared<'a, T> {
    /// Remote identity (e.g. the resource name); cannot change in place
    pub identity: &'a str,
    /// Everything else that was declared, compared by value
    pub inputs: &'a T,
}

impl<'a, T> Declared<'a, T> {
    pub fn new(identity: &'a str, inputs: &'a T) -> Self {
        Self { identity, inputs }
    }
}

/// Decide what to do with `current` given the previous pass.
///
/// Rules, in order:
/// 1. identity changed → `Replace`
/// 2. no previous pass → `Deploy`
/// 3. inputs differ → `Deploy` or `Replace` per `on_change`
/// 4. otherwise → `NoOp`
pub fn decide<T: PartialEq>(
    current: Declared<'_, T>,
    previous: Option<Declared<'_, T>>,
    on_change: ConfigChange,
) -> Decision {
    let Some(previous) = previous else {
        return Decision::Deploy;
    };

    if previous.identity != current.identity {
        return Decision::Replace;
    }

    if previous.inputs != current.inputs {
        return match on_change {
            ConfigChange::Redeploy => Decision::Deploy,
            ConfigChange::Replace => Decision::Replace,
        };
    }

    Decision::NoOp
}
