//! Scoring worker pool and cooperative run controls.
//!
//! The pool is the only parallel boundary of a run. Tasks are submitted in
//! population order and rejoined by index, so results never depend on worker
//! completion order.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rayon::prelude::*;

use crate::compute::ScoringError;
use crate::schema::{EvolutionConfig, GenerationProgress};

/// Worker count for a configuration: explicit `process_count`, or a share of
/// the available parallelism (at least one).
pub fn pool_size(process_count: Option<usize>, cpu_fraction: f64) -> usize {
    if let Some(count) = process_count {
        return count.max(1);
    }
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    ((available as f64 * cpu_fraction).floor() as usize).max(1)
}

/// Lazily spawned rayon pool that can be torn down and respawned.
#[derive(Debug)]
pub struct ScoringPool {
    size: usize,
    pool: Option<rayon::ThreadPool>,
    spawned: usize,
}

impl ScoringPool {
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            pool: None,
            spawned: 0,
        }
    }

    pub fn from_config(config: &EvolutionConfig) -> Self {
        Self::new(pool_size(config.process_count, config.cpu_fraction))
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_running(&self) -> bool {
        self.pool.is_some()
    }

    /// Times the pool has been spawned.
    pub fn spawn_count(&self) -> usize {
        self.spawned
    }

    fn ensure(&mut self) -> Result<&rayon::ThreadPool, ScoringError> {
        if self.pool.is_none() {
            if self.spawned > 0 {
                log::warn!("Respawning scoring pool with {} workers", self.size);
            } else {
                log::debug!("Spawning scoring pool with {} workers", self.size);
            }
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.size)
                .thread_name(|i| format!("handle-scorer-{i}"))
                .build()
                .map_err(|e| ScoringError::PoolUnavailable(e.to_string()))?;
            self.spawned += 1;
            self.pool = Some(pool);
        }
        self.pool
            .as_ref()
            .ok_or_else(|| ScoringError::PoolUnavailable("pool missing after spawn".into()))
    }

    /// Drop the worker threads; the next [`run`](Self::run) respawns them.
    pub fn teardown(&mut self) {
        if self.pool.take().is_some() {
            log::info!("Scoring pool torn down");
        }
    }

    /// Run `task` on every job and collect results in job order.
    ///
    /// Panicking tasks are caught. Every failure is returned together and no
    /// partial results escape.
    pub fn run<T, R, F>(&mut self, jobs: &[T], task: F) -> Result<Vec<R>, Vec<ScoringError>>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &T) -> Result<R, ScoringError> + Sync,
    {
        let pool = self.ensure().map_err(|e| vec![e])?;
        let outcomes: Vec<Result<R, ScoringError>> = pool.install(|| {
            jobs.par_iter()
                .enumerate()
                .map(|(index, job)| {
                    catch_unwind(AssertUnwindSafe(|| task(index, job))).unwrap_or_else(|payload| {
                        Err(ScoringError::WorkerPanicked {
                            index,
                            message: panic_message(payload.as_ref()),
                        })
                    })
                })
                .collect()
        });

        let mut results = Vec::with_capacity(outcomes.len());
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(r) => results.push(r),
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            Ok(results)
        } else {
            Err(errors)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run state requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlState {
    #[default]
    Running,
    Paused,
    Stopped,
}

/// Pause, resume and stop requests, honored between generations.
///
/// Shared with the caller behind an `Arc`; any thread may issue requests.
#[derive(Debug, Default)]
pub struct RunControl {
    state: Mutex<ControlState>,
    changed: Condvar,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, next: ControlState) {
        let mut state = self.lock();
        // stop is final
        if *state != ControlState::Stopped {
            *state = next;
        }
        self.changed.notify_all();
    }

    pub fn state(&self) -> ControlState {
        *self.lock()
    }

    pub fn pause(&self) {
        self.set(ControlState::Paused);
    }

    pub fn resume(&self) {
        self.set(ControlState::Running);
    }

    pub fn stop(&self) {
        self.set(ControlState::Stopped);
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == ControlState::Stopped
    }

    /// Block while paused and return the state that ended the wait.
    ///
    /// `on_timeout` runs once, without the lock held, if the pause outlasts
    /// `timeout`.
    pub fn wait_while_paused(&self, timeout: Duration, on_timeout: impl FnOnce()) -> ControlState {
        let state = self.lock();
        if *state != ControlState::Paused {
            return *state;
        }
        log::info!("Run paused");

        let (state, waited) = self
            .changed
            .wait_timeout_while(state, timeout, |s| *s == ControlState::Paused)
            .unwrap_or_else(PoisonError::into_inner);
        let state = if waited.timed_out() {
            drop(state);
            log::debug!("Pause exceeded {timeout:?}");
            on_timeout();
            let state = self.lock();
            self.changed
                .wait_while(state, |s| *s == ControlState::Paused)
                .unwrap_or_else(PoisonError::into_inner)
        } else {
            state
        };

        log::info!("Run resumed as {:?}", *state);
        *state
    }
}

/// External hook asked between generations whether the run should end.
pub trait CancellationSource: Send {
    fn should_cancel(&mut self, progress: &GenerationProgress) -> bool;
}

impl<F> CancellationSource for F
where
    F: FnMut(&GenerationProgress) -> bool + Send,
{
    fn should_cancel(&mut self, progress: &GenerationProgress) -> bool {
        self(progress)
    }
}
