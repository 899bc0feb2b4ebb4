//! Runs independent units of work, one outcome per unit, in input order.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::error::{Error, Result};

/// Units are I/O bound: each worker spends most of its time blocked on the
/// filesystem, so the pool is much wider than the CPU count.
pub const THREADS_PER_CPU: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// One unit at a time, in input order, on the calling thread.
    Sequential,
    /// Up to [`Launcher::concurrency_limit()`] units at once.
    Parallel,
}

#[derive(Debug, Clone)]
pub enum Outcome<R> {
    Done(R),
    Failed(Error),
    /// Not started because an earlier unit failed fatally.
    Skipped,
}

impl<R> Outcome<R> {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Outcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn done(self) -> Option<R> {
        match self {
            Outcome::Done(r) => Some(r),
            _ => None,
        }
    }

    pub fn map<T, F: FnOnce(R) -> T>(self, f: F) -> Outcome<T> {
        match self {
            Outcome::Done(r) => Outcome::Done(f(r)),
            Outcome::Failed(e) => Outcome::Failed(e),
            Outcome::Skipped => Outcome::Skipped,
        }
    }
}

#[derive(Debug)]
pub struct Launcher {
    mode: Mode,
    pool: Option<rayon::ThreadPool>,
}

impl Launcher {
    pub fn new(mode: Mode) -> Result<Self> {
        let pool = match mode {
            Mode::Sequential => None,
            Mode::Parallel => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(Self::concurrency_limit())
                    .thread_name(|i| format!("plume-worker-{i}"))
                    .build()
                    .map_err(|e| Error::from_std(e).fatal())?;

                Some(pool)
            }
        };

        Ok(Launcher { mode, pool })
    }

    pub fn sequential() -> Self {
        Launcher { mode: Mode::Sequential, pool: None }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The most units a parallel launcher runs at once.
    pub fn concurrency_limit() -> usize {
        std::thread::available_parallelism()
            .map_or(1, |n| n.get())
            .saturating_mul(THREADS_PER_CPU)
    }

    /// Runs `task` on every unit and returns their outcomes in input order.
    ///
    /// A failing or panicking unit never cancels its siblings. A fatal failure
    /// stops new units from starting; they resolve to [`Outcome::Skipped`].
    pub fn run<U, R, F>(&self, units: Vec<U>, task: F) -> Vec<Outcome<R>>
        where U: Send, R: Send, F: Fn(U) -> Result<R> + Sync
    {
        let abort = AtomicBool::new(false);
        let launch = |unit: U| -> Outcome<R> {
            if abort.load(Ordering::Acquire) {
                return Outcome::Skipped;
            }

            let result = catch_unwind(AssertUnwindSafe(|| task(unit)))
                .unwrap_or_else(|payload| Err(panicked(payload)));

            match result {
                Ok(value) => Outcome::Done(value),
                Err(e) => {
                    if e.is_fatal() {
                        abort.store(true, Ordering::Release);
                    }

                    Outcome::Failed(e)
                }
            }
        };

        match &self.pool {
            Some(pool) => pool.install(|| units.into_par_iter().map(launch).collect()),
            None => units.into_iter().map(launch).collect(),
        }
    }
}

fn panicked(payload: Box<dyn std::any::Any + Send>) -> Error {
    let message = payload.downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".into());

    error!("task panicked", "panic" => message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn launchers() -> [Launcher; 2] {
        [Launcher::sequential(), Launcher::new(Mode::Parallel).unwrap()]
    }

    #[test]
    fn outcomes_follow_input_order() {
        for launcher in launchers() {
            let units: Vec<u64> = (0..40).collect();
            let outcomes = launcher.run(units, |n| {
                std::thread::sleep(Duration::from_millis((40 - n) % 7));
                Ok(n * 2)
            });

            let values: Vec<u64> = outcomes.into_iter().filter_map(Outcome::done).collect();
            assert_eq!(values, (0..40).map(|n| n * 2).collect::<Vec<_>>(), "{:?}", launcher.mode());
        }
    }

    #[test]
    fn failures_and_panics_stay_local() {
        for launcher in launchers() {
            let outcomes = launcher.run(vec![1, 2, 3, 4], |n| match n {
                2 => Err(error!("bad unit", "unit" => n)),
                3 => panic!("unit three exploded"),
                n => Ok(n),
            });

            assert_eq!(outcomes.len(), 4);
            assert!(outcomes[0].is_done() && outcomes[3].is_done());
            assert_eq!(outcomes[1].error().and_then(|e| e.context_value("unit")).as_deref(), Some("2"));

            let panic = outcomes[2].error().unwrap();
            assert_eq!(panic.context_value("panic").as_deref(), Some("unit three exploded"));
        }
    }

    #[test]
    fn fatal_failure_skips_remaining_sequential_units() {
        let ran = AtomicUsize::new(0);
        let outcomes = Launcher::sequential().run((0..5).collect(), |n| {
            ran.fetch_add(1, Ordering::SeqCst);
            match n {
                1 => Err(error!("disk full").fatal()),
                n => Ok(n),
            }
        });

        assert_eq!(ran.load(Ordering::SeqCst), 2);
        assert!(outcomes[0].is_done());
        assert!(outcomes[1].error().unwrap().is_fatal());
        assert!(outcomes[2..].iter().all(|o| matches!(o, Outcome::Skipped)));
    }

    #[test]
    fn parallel_mode_overlaps_units() {
        let (active, peak) = (AtomicUsize::new(0), AtomicUsize::new(0));
        let launcher = Launcher::new(Mode::Parallel).unwrap();
        launcher.run((0..32).collect::<Vec<u32>>(), |_| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(peak.load(Ordering::SeqCst) > 1);
        assert!(peak.load(Ordering::SeqCst) <= Launcher::concurrency_limit());
    }
}
