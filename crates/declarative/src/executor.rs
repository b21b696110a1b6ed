//! Execution engine - runs one reconcile pass and fans out independent work

use crate::component::Component;
use crate::context::ApplyContext;
use crate::diff::Decision;
use crate::error::LifecycleError;
use crate::types::Outcome;
use rayon::prelude::*;

/// Reconcile one instance against its previous pass.
///
/// Hydrates `state` from `previous`, decides, and then:
/// - `NoOp`: returns without calling the provider
/// - `Deploy`: deploys `state`
/// - `Replace`: removes `previous` first (full cleanup), then deploys `state`
///
/// `state` is updated in place and is what the caller persists for the next
/// pass. On error it still reflects anything that was created, and never
/// carries the identity of a resource this pass removed.
pub fn reconcile<C: Component>(
    component: &C,
    state: &mut C::State,
    previous: Option<&C::State>,
    ctx: &mut ApplyContext,
) -> Result<Outcome, LifecycleError> {
    component.hydrate(state, previous);

    let decision = component.should_deploy(state, previous);
    let title = component.info(state).title;
    ctx.progress.on_decision(&title, decision);

    let outcome = match decision {
        Decision::NoOp => Outcome::Unchanged,
        Decision::Deploy => {
            component.deploy(state, ctx)?;
            Outcome::Created
        }
        Decision::Replace => {
            if let Some(previous) = previous {
                component.remove(previous, ctx)?;
                // the hydrated identity now names a deleted resource
                component.hydrate(state, None);
            }
            component.deploy(state, ctx)?;
            Outcome::Replaced
        }
    };

    ctx.progress.on_complete(&title, outcome);
    Ok(outcome)
}

/// Remove an instance that is no longer declared.
pub fn destroy<C: Component>(
    component: &C,
    previous: &C::State,
    ctx: &mut ApplyContext,
) -> Result<Outcome, LifecycleError> {
    let title = component.info(previous).title;
    component.remove(previous, ctx)?;
    ctx.progress.on_complete(&title, Outcome::Removed);
    Ok(Outcome::Removed)
}

/// Run `op` over every item, up to `jobs` at a time, and wait for all of them.
///
/// Every item is attempted regardless of other failures. Results come back
/// in item order.
pub fn run_concurrently<T, E, F>(items: &[T], jobs: usize, op: F) -> Vec<Result<(), E>>
where
    T: Sync,
    E: Send,
    F: Fn(&T) -> Result<(), E> + Sync,
{
    if jobs <= 1 || items.len() <= 1 {
        return items.iter().map(&op).collect();
    }

    match rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.min(items.len()))
        .build()
    {
        Ok(pool) => pool.install(|| items.par_iter().map(&op).collect()),
        Err(e) => {
            log::warn!("Failed to create thread pool, running sequentially: {e}");
            items.iter().map(&op).collect()
        }
    }
}
