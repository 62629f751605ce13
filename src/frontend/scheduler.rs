//! Scheduling contract
//!
//! A stage gate that cannot be satisfied yet returns `NeedsGoal` naming the
//! goal that would satisfy it. `require` turns that signal into work: it asks
//! the scheduler to attempt the goal and retries, or, when the goal is already
//! being produced further up the stack, records a concurrent dependency and
//! falls back to a possibly stale result.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::frontend::source::SourceFile;
use crate::types::{ClassId, Stage, TypeSystem};
use crate::utils::{Error, Result};

/// A source compilation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub(crate) u32);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job{}", self.0)
    }
}

/// A unit of work the scheduler can attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Goal {
    /// Class shells of a job exist and are installed
    TypesInitialized(JobId),
    /// A class has reached a completion stage
    Class { class: ClassId, stage: Stage },
}

impl Goal {
    pub fn class(class: ClassId, stage: Stage) -> Self {
        Self::Class { class, stage }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypesInitialized(job) => write!(f, "TypesInitialized({})", job),
            Self::Class { class, stage } => write!(f, "{}({})", stage, class),
        }
    }
}

/// Signal that a goal must be reached before the caller can proceed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeedsGoal {
    pub goal: Goal,
}

impl NeedsGoal {
    pub fn new(goal: Goal) -> Self {
        Self { goal }
    }

    pub fn stage(class: ClassId, stage: Stage) -> Self {
        Self::new(Goal::class(class, stage))
    }
}

impl fmt::Display for NeedsGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.goal)
    }
}

/// The operations the type system needs from a goal scheduler
pub trait Scheduler {
    /// Try to reach `goal`; `Ok(false)` means not yet
    fn attempt_goal(&self, ts: &TypeSystem, goal: &Goal) -> Result<bool>;

    /// `goal` cannot run before `prerequisite`; rejects cycles
    fn add_prerequisite_dependency(&self, goal: &Goal, prerequisite: &Goal) -> Result<()>;

    /// `goal` and `other` may complete in the same pass
    fn add_concurrent_dependency(&self, goal: &Goal, other: &Goal);

    /// Innermost goal being run
    fn current_goal(&self) -> Option<Goal>;

    /// Whether `goal` is being run somewhere up the stack
    fn is_producing(&self, goal: &Goal) -> bool;

    fn reached(&self, ts: &TypeSystem, goal: &Goal) -> bool;

    /// Job for a source file, created on first request
    fn load_source(&self, source: &Rc<SourceFile>) -> JobId;

    fn source_has_job(&self, source: &SourceFile) -> bool;
}

/// Run `attempt`, scheduling whatever goals it reports missing
pub fn require<T>(ts: &TypeSystem, mut attempt: impl FnMut() -> Result<T>) -> Result<T> {
    drive(ts, &mut attempt, None::<fn() -> T>)
}

/// Like [`require`], but a self-dependency yields `stale()` instead of failing
pub fn require_or_stale<T>(
    ts: &TypeSystem,
    mut attempt: impl FnMut() -> Result<T>,
    stale: impl FnOnce() -> T,
) -> Result<T> {
    drive(ts, &mut attempt, Some(stale))
}

fn drive<T, S: FnOnce() -> T>(
    ts: &TypeSystem,
    attempt: &mut dyn FnMut() -> Result<T>,
    mut stale: Option<S>,
) -> Result<T> {
    let scheduler = ts.scheduler();
    let mut attempted = HashSet::new();
    loop {
        let need = match attempt() {
            Err(Error::MissingDependency(need)) => need,
            other => return other,
        };
        let goal = need.goal;

        if scheduler.is_producing(&goal) {
            if let Some(current) = scheduler.current_goal() {
                scheduler.add_concurrent_dependency(&current, &goal);
            }
            log::debug!("{} is already in progress; using current state", goal);
            return match stale.take() {
                Some(stale) => Ok(stale()),
                None => Err(Error::MissingDependency(need)),
            };
        }

        if !attempted.insert(goal) {
            return Err(Error::CyclicDependency(format!("{} was reached but is still missing", goal)));
        }
        if let Some(current) = scheduler.current_goal() {
            scheduler.add_prerequisite_dependency(&current, &goal)?;
        }
        if !scheduler.attempt_goal(ts, &goal)? {
            return Err(Error::MissingDependency(need));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_display() {
        let goal = Goal::class(ClassId(4), Stage::MembersAdded);
        assert_eq!(goal.to_string(), "MembersAdded(#4)");
        assert_eq!(Goal::TypesInitialized(JobId(2)).to_string(), "TypesInitialized(job2)");
        let err: Error = NeedsGoal::new(goal).into();
        assert_eq!(err.missing_dependency().map(|n| n.goal), Some(goal));
    }
}
