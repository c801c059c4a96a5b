//! Pool of runtime states
//!
//! A checked-out [`State`] belongs to exactly one caller until it is
//! released. Released states keep their globals and loaded modules.

use crate::state::State;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tether_config::BridgeConfig;
use tracing::debug;

type Factory = Box<dyn Fn() -> State + Send + Sync>;

/// Reusable set of runtime states
pub struct StatePool {
    factory: Factory,
    idle: Mutex<Vec<State>>,
    max_idle: Option<usize>,
    shut_down: AtomicBool,
}

impl StatePool {
    /// Pool that builds new states with `factory`
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> State + Send + Sync + 'static,
    {
        StatePool {
            factory: Box::new(factory),
            idle: Mutex::new(Vec::new()),
            max_idle: None,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Pool of states configured from `config`
    pub fn from_config(config: &BridgeConfig) -> Self {
        let config = config.clone();
        let max_idle = config.pool().max_idle();
        let mut pool = StatePool::new(move || State::from_config(&config));
        pool.max_idle = max_idle;
        pool
    }

    /// Keep at most `limit` idle states; extra released states are closed
    pub fn with_max_idle(mut self, limit: usize) -> Self {
        self.max_idle = Some(limit);
        self
    }

    /// Take an idle state, or build a new one
    pub fn acquire(&self) -> State {
        if !self.is_shut_down() {
            let mut idle = self.idle.lock().expect("StatePool lock poisoned");
            if let Some(state) = idle.pop() {
                return state;
            }
        }
        debug!("building new runtime state");
        (self.factory)()
    }

    /// Take a state that goes back to the pool when the guard drops
    pub fn acquire_guard(&self) -> PooledState<'_> {
        PooledState {
            pool: self,
            state: Some(self.acquire()),
        }
    }

    /// Return a state for reuse
    pub fn release(&self, state: State) {
        if self.is_shut_down() {
            state.close();
            return;
        }

        let mut idle = self.idle.lock().expect("StatePool lock poisoned");
        match self.max_idle {
            Some(limit) if idle.len() >= limit => {
                drop(idle);
                state.close();
            }
            _ => idle.push(state),
        }
    }

    /// Close every idle state; states released later are closed on release
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        let states: Vec<State> = {
            let mut idle = self.idle.lock().expect("StatePool lock poisoned");
            idle.drain(..).collect()
        };
        debug!(closed = states.len(), "state pool shut down");
        for state in states {
            state.close();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Number of states waiting for reuse
    pub fn idle_count(&self) -> usize {
        self.idle.lock().expect("StatePool lock poisoned").len()
    }
}

impl std::fmt::Debug for StatePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatePool")
            .field("idle", &self.idle_count())
            .field("max_idle", &self.max_idle)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Checked-out state that releases itself on drop
pub struct PooledState<'a> {
    pool: &'a StatePool,
    state: Option<State>,
}

impl PooledState<'_> {
    /// Keep the state instead of returning it to the pool
    pub fn detach(mut self) -> Option<State> {
        self.state.take()
    }
}

impl Deref for PooledState<'_> {
    type Target = State;

    fn deref(&self) -> &State {
        match &self.state {
            Some(state) => state,
            None => unreachable!("state taken from live guard"),
        }
    }
}

impl DerefMut for PooledState<'_> {
    fn deref_mut(&mut self) -> &mut State {
        match &mut self.state {
            Some(state) => state,
            None => unreachable!("state taken from live guard"),
        }
    }
}

impl Drop for PooledState<'_> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            self.pool.release(state);
        }
    }
}
