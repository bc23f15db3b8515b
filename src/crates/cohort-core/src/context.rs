//! Run-scoped context handed to every node
//!
//! A [`RunContext`] identifies one execution of a compiled graph. It carries
//! the thread identifier that external collaborators use to correlate
//! persisted output, and a [`RunScope`] that owns the per-run supervisor
//! visit counters. Cloning a context shares its scope; [`RunContext::child`]
//! starts a nested run with the same thread identifier and the same scope, so
//! a team supervisor keeps its counts across re-entries within one run.

use crate::supervisor::VisitCounter;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Mutable bookkeeping owned by a single run
#[derive(Debug, Default)]
pub struct RunScope {
    visits: Mutex<HashMap<Uuid, VisitCounter>>,
}

impl RunScope {
    /// Run `f` against the visit counter of the supervisor identified by `owner`
    pub fn with_visits<R>(&self, owner: Uuid, f: impl FnOnce(&mut VisitCounter) -> R) -> R {
        let mut visits = self.visits.lock();
        f(visits.entry(owner).or_default())
    }

    /// Snapshot of a supervisor's counter, empty if it never routed in this run
    pub fn visits(&self, owner: Uuid) -> VisitCounter {
        self.visits.lock().get(&owner).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct RunContext {
    thread_id: Option<String>,
    run_id: Uuid,
    depth: usize,
    scope: Arc<RunScope>,
}

impl RunContext {
    pub fn new(thread_id: Option<String>) -> Self {
        Self {
            thread_id,
            run_id: Uuid::new_v4(),
            depth: 0,
            scope: Arc::new(RunScope::default()),
        }
    }

    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self::new(Some(thread_id.into()))
    }

    /// Context without a thread identifier; collaborators fall back to local output
    pub fn standalone() -> Self {
        Self::new(None)
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Nesting level; 0 for a top-level run
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn scope(&self) -> &RunScope {
        &self.scope
    }

    /// Context for a nested run: same thread and scope, new run id
    pub fn child(&self) -> Self {
        Self {
            thread_id: self.thread_id.clone(),
            run_id: Uuid::new_v4(),
            depth: self.depth + 1,
            scope: Arc::clone(&self.scope),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::standalone()
    }
}
