//! Task dispatch for pairwise comparisons.
//!
//! A [`Dispatcher`] runs a batch of independent closures and returns their
//! results in submission order. [`Sequential`] runs them on the calling
//! thread; [`RayonDispatcher`] (feature `parallel`) spreads them over a
//! rayon pool.

#[cfg(feature = "parallel")]
use repdiv_core::{RepdivError, Result};

/// Order-preserving map over independent tasks.
pub trait Dispatcher {
    /// Run every task and return the results in the order the tasks were
    /// given, regardless of completion order.
    fn map<T, F>(&self, tasks: Vec<F>) -> Vec<T>
    where
        F: FnOnce() -> T + Send,
        T: Send;
}

/// Runs tasks one after another on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl Dispatcher for Sequential {
    fn map<T, F>(&self, tasks: Vec<F>) -> Vec<T>
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        tasks.into_iter().map(|task| task()).collect()
    }
}

/// Runs tasks on rayon, either the global pool or a dedicated one.
#[cfg(feature = "parallel")]
#[derive(Debug, Default)]
pub struct RayonDispatcher {
    pool: Option<rayon::ThreadPool>,
}

#[cfg(feature = "parallel")]
impl RayonDispatcher {
    /// Dispatch onto rayon's global pool.
    pub fn new() -> Self {
        Self { pool: None }
    }

    /// Dispatch onto a dedicated pool of `threads` workers.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `threads` is zero or the pool cannot
    /// be built.
    pub fn with_threads(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(RepdivError::Configuration(
                "thread count must be greater than zero".into(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| RepdivError::Configuration(format!("failed to build thread pool: {}", e)))?;
        Ok(Self { pool: Some(pool) })
    }

    /// Number of worker threads tasks will run on.
    pub fn threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
}

#[cfg(feature = "parallel")]
impl Dispatcher for RayonDispatcher {
    fn map<T, F>(&self, tasks: Vec<F>) -> Vec<T>
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        use rayon::prelude::*;

        let run = move || tasks.into_par_iter().map(|task| task()).collect::<Vec<T>>();
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}

/// Dispatcher used when the caller does not pick one: rayon with the
/// `parallel` feature, sequential otherwise.
#[cfg(feature = "parallel")]
pub fn default_dispatcher() -> RayonDispatcher {
    RayonDispatcher::new()
}

/// Dispatcher used when the caller does not pick one: rayon with the
/// `parallel` feature, sequential otherwise.
#[cfg(not(feature = "parallel"))]
pub fn default_dispatcher() -> Sequential {
    Sequential
}
