//! Worklist scheduler
//!
//! A concrete goal scheduler. Goals are attempted on demand: prerequisites
//! first, then the registered pass. A pass that reports a missing goal gets
//! that goal recorded as a prerequisite and is retried once it is reached.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::frontend::scheduler::{Goal, JobId, Scheduler};
use crate::frontend::source::SourceFile;
use crate::types::{ClassId, Stage, TypeSystem};
use crate::utils::{Error, Result};

/// Upper bound on runs of a single goal before it is declared stuck
const MAX_RUNS: u32 = 256;

/// The passes that produce goals
pub trait GoalRunner {
    /// Run the pass for `goal`; `Ok(false)` means no progress was possible
    fn run(&self, ts: &TypeSystem, scheduler: &WorklistScheduler, goal: &Goal) -> Result<bool>;
}

pub struct WorklistScheduler {
    runner: Rc<dyn GoalRunner>,
    jobs: RefCell<Vec<Rc<SourceFile>>>,
    jobs_by_path: RefCell<HashMap<String, JobId>>,
    prerequisites: RefCell<HashMap<Goal, Vec<Goal>>>,
    concurrent: RefCell<HashMap<Goal, Vec<Goal>>>,
    stack: RefCell<Vec<Goal>>,
    runs: RefCell<HashMap<Goal, u32>>,
    /// Job goals that have completed; class goals are read off the class stages
    reached: RefCell<HashSet<Goal>>,
}

impl WorklistScheduler {
    pub fn new(runner: Rc<dyn GoalRunner>) -> Self {
        Self {
            runner,
            jobs: RefCell::new(Vec::new()),
            jobs_by_path: RefCell::new(HashMap::new()),
            prerequisites: RefCell::new(HashMap::new()),
            concurrent: RefCell::new(HashMap::new()),
            stack: RefCell::new(Vec::new()),
            runs: RefCell::new(HashMap::new()),
            reached: RefCell::new(HashSet::new()),
        }
    }

    pub fn job_count(&self) -> usize {
        self.jobs.borrow().len()
    }

    pub fn job_source(&self, job: JobId) -> Option<Rc<SourceFile>> {
        self.jobs.borrow().get(job.0 as usize).cloned()
    }

    pub fn jobs(&self) -> Vec<JobId> {
        (0..self.job_count() as u32).map(JobId).collect()
    }

    pub fn prerequisites_of(&self, goal: &Goal) -> Vec<Goal> {
        let mut prerequisites = match goal {
            Goal::Class { class, stage } => stage.prerequisites().iter().map(|s| Goal::class(*class, *s)).collect(),
            Goal::TypesInitialized(_) => Vec::new(),
        };
        if let Some(explicit) = self.prerequisites.borrow().get(goal) {
            prerequisites.extend(explicit.iter().copied());
        }
        prerequisites
    }

    pub fn concurrent_with(&self, goal: &Goal) -> Vec<Goal> {
        self.concurrent.borrow().get(goal).cloned().unwrap_or_default()
    }

    pub fn run_count(&self, goal: &Goal) -> u32 {
        self.runs.borrow().get(goal).copied().unwrap_or(0)
    }

    /// Whether `from` transitively requires `to`
    fn depends_on(&self, from: &Goal, to: &Goal) -> bool {
        let edges = self.prerequisites.borrow();
        let mut seen = HashSet::new();
        let mut pending = vec![*from];
        while let Some(goal) = pending.pop() {
            if goal == *to {
                return true;
            }
            if seen.insert(goal) {
                pending.extend(edges.get(&goal).into_iter().flatten().copied());
            }
        }
        false
    }

    fn run_once(&self, ts: &TypeSystem, goal: &Goal) -> Result<bool> {
        let count = {
            let mut runs = self.runs.borrow_mut();
            let count = runs.entry(*goal).or_insert(0);
            *count += 1;
            *count
        };
        if count > MAX_RUNS {
            return Err(Error::CyclicDependency(format!("{} did not complete after {} runs", goal, MAX_RUNS)));
        }
        log::debug!("running {} (run {})", goal, count);
        self.runner.run(ts, self, goal)
    }

    /// Prerequisites, then the pass; `goal` is on the stack throughout
    fn attempt_on_stack(&self, ts: &TypeSystem, goal: &Goal) -> Result<bool> {
        for prerequisite in self.prerequisites_of(goal) {
            if !self.attempt_goal(ts, &prerequisite)? {
                return Ok(false);
            }
        }
        loop {
            match self.run_once(ts, goal) {
                Ok(true) => {
                    if let Goal::TypesInitialized(_) = goal {
                        self.reached.borrow_mut().insert(*goal);
                    }
                    return Ok(true);
                }
                Ok(false) => return Ok(false),
                Err(Error::MissingDependency(need)) => {
                    log::debug!("{} is waiting on {}", goal, need.goal);
                    if self.is_producing(&need.goal) {
                        self.add_concurrent_dependency(goal, &need.goal);
                        return Ok(false);
                    }
                    self.add_prerequisite_dependency(goal, &need.goal)?;
                    if !self.attempt_goal(ts, &need.goal)? {
                        return Ok(false);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run every job to completion: types, then every stage of every class
    pub fn compile_all(&self, ts: &TypeSystem) -> Result<()> {
        let mut index = 0;
        loop {
            // Resolving one class may load further jobs.
            for job in self.jobs() {
                self.attempt_goal(ts, &Goal::TypesInitialized(job))?;
            }
            if index >= ts.class_count() {
                return Ok(());
            }
            while index < ts.class_count() {
                let id = ClassId(index as u32);
                index += 1;
                if ts.with_class(id, |c| c.job.is_none()) {
                    continue;
                }
                for stage in Stage::ALL {
                    let goal = Goal::class(id, stage);
                    if !self.attempt_goal(ts, &goal)? {
                        return Err(Error::CyclicDependency(format!("{} could not be reached", goal)));
                    }
                }
            }
        }
    }
}

impl Scheduler for WorklistScheduler {
    fn attempt_goal(&self, ts: &TypeSystem, goal: &Goal) -> Result<bool> {
        if self.reached(ts, goal) {
            return Ok(true);
        }
        if self.is_producing(goal) {
            log::trace!("{} is already running", goal);
            return Ok(false);
        }
        self.stack.borrow_mut().push(*goal);
        let result = self.attempt_on_stack(ts, goal);
        self.stack.borrow_mut().pop();
        result
    }

    fn add_prerequisite_dependency(&self, goal: &Goal, prerequisite: &Goal) -> Result<()> {
        if goal == prerequisite || self.depends_on(prerequisite, goal) {
            return Err(Error::CyclicDependency(format!("{} and {} require each other", goal, prerequisite)));
        }
        let mut edges = self.prerequisites.borrow_mut();
        let list = edges.entry(*goal).or_default();
        if !list.contains(prerequisite) {
            list.push(*prerequisite);
        }
        Ok(())
    }

    fn add_concurrent_dependency(&self, goal: &Goal, other: &Goal) {
        let mut edges = self.concurrent.borrow_mut();
        let list = edges.entry(*goal).or_default();
        if !list.contains(other) {
            list.push(*other);
        }
    }

    fn current_goal(&self) -> Option<Goal> {
        self.stack.borrow().last().copied()
    }

    fn is_producing(&self, goal: &Goal) -> bool {
        self.stack.borrow().contains(goal)
    }

    fn reached(&self, ts: &TypeSystem, goal: &Goal) -> bool {
        match goal {
            Goal::Class { class, stage } => ts.has_stage(*class, *stage),
            Goal::TypesInitialized(_) => self.reached.borrow().contains(goal),
        }
    }

    fn load_source(&self, source: &Rc<SourceFile>) -> JobId {
        if let Some(job) = self.jobs_by_path.borrow().get(&source.path) {
            return *job;
        }
        let mut jobs = self.jobs.borrow_mut();
        let job = JobId(jobs.len() as u32);
        jobs.push(Rc::clone(source));
        self.jobs_by_path.borrow_mut().insert(source.path.clone(), job);
        log::debug!("{} created for {}", job, source.path);
        job
    }

    fn source_has_job(&self, source: &SourceFile) -> bool {
        self.jobs_by_path.borrow().contains_key(&source.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TypeSystemConfig;
    use crate::frontend::scheduler::{require, require_or_stale, NeedsGoal};
    use crate::resolve::TableResolver;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    /// Job 0 needs job 1; job 1 peeks at job 0 and tolerates a stale view
    #[derive(Default)]
    struct Chain {
        stale_reads: Cell<u32>,
    }

    impl GoalRunner for Chain {
        fn run(&self, ts: &TypeSystem, scheduler: &WorklistScheduler, goal: &Goal) -> Result<bool> {
            let first = Goal::TypesInitialized(JobId(0));
            let second = Goal::TypesInitialized(JobId(1));
            if *goal == first && !scheduler.reached(ts, &second) {
                return Err(NeedsGoal::new(second).into());
            }
            if *goal == second {
                let fresh = require_or_stale(
                    ts,
                    || if scheduler.reached(ts, &first) { Ok(true) } else { Err(NeedsGoal::new(first).into()) },
                    || false,
                )?;
                if !fresh {
                    self.stale_reads.set(self.stale_reads.get() + 1);
                }
            }
            Ok(true)
        }
    }

    fn source(path: &str) -> Rc<SourceFile> {
        Rc::new(SourceFile {
            path: path.into(),
            package: None,
            imports: vec![],
            last_modified: 0,
            classes: vec![],
        })
    }

    fn session(runner: Rc<dyn GoalRunner>) -> (TypeSystem, Rc<WorklistScheduler>) {
        let scheduler = Rc::new(WorklistScheduler::new(runner));
        let ts = TypeSystem::new(TypeSystemConfig::default(), Rc::new(TableResolver::new()), scheduler.clone());
        (ts, scheduler)
    }

    #[test]
    fn test_jobs_are_interned() {
        let (_ts, scheduler) = session(Rc::new(Chain::default()));
        let a = scheduler.load_source(&source("A.java"));
        let b = scheduler.load_source(&source("B.java"));
        assert_eq!(scheduler.load_source(&source("A.java")), a);
        assert_ne!(a, b);
        assert_eq!(scheduler.job_count(), 2);
        assert!(scheduler.source_has_job(&source("B.java")));
        assert_eq!(scheduler.job_source(b).map(|s| s.path.clone()), Some("B.java".to_string()));
    }

    #[test]
    fn test_missing_goal_becomes_prerequisite() {
        let chain = Rc::new(Chain::default());
        let (ts, scheduler) = session(chain.clone());
        scheduler.load_source(&source("A.java"));
        scheduler.load_source(&source("B.java"));
        let first = Goal::TypesInitialized(JobId(0));
        let second = Goal::TypesInitialized(JobId(1));

        assert!(scheduler.attempt_goal(&ts, &first).unwrap());
        assert!(scheduler.reached(&ts, &second));
        assert_eq!(scheduler.prerequisites_of(&first), vec![second]);
        assert_eq!(scheduler.concurrent_with(&second), vec![first]);
        assert_eq!(chain.stale_reads.get(), 1);
        assert_eq!(scheduler.run_count(&first), 2);
        assert_eq!(scheduler.current_goal(), None);
    }

    #[test]
    fn test_prerequisite_cycles_rejected() {
        let (_ts, scheduler) = session(Rc::new(Chain::default()));
        let a = Goal::TypesInitialized(JobId(0));
        let b = Goal::TypesInitialized(JobId(1));
        let c = Goal::TypesInitialized(JobId(2));
        scheduler.add_prerequisite_dependency(&a, &b).unwrap();
        scheduler.add_prerequisite_dependency(&b, &c).unwrap();
        assert!(matches!(scheduler.add_prerequisite_dependency(&c, &a), Err(Error::CyclicDependency(_))));
        assert!(scheduler.add_prerequisite_dependency(&a, &a).is_err());
    }

    #[test]
    fn test_require_drives_goals() {
        let (ts, scheduler) = session(Rc::new(Chain::default()));
        scheduler.load_source(&source("A.java"));
        scheduler.load_source(&source("B.java"));
        let first = Goal::TypesInitialized(JobId(0));
        let reached = require(&ts, || {
            if scheduler.reached(&ts, &first) {
                Ok(())
            } else {
                Err(NeedsGoal::new(first).into())
            }
        });
        assert!(reached.is_ok());
    }
}
