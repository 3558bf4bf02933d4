//! Coalescing of concurrent identical upstream dispatches.
//!
//! The first caller for a key starts the dispatch; callers arriving while it
//! is pending await the same shared future instead of issuing their own.
//! Completed entries are never joined, so a later miss always starts afresh.
//! An entry is removed once its dispatch completes or once every caller
//! awaiting it has gone away.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use log::debug;
use poi_gateway_core::CachedPayload;

use crate::dispatch::DispatchError;

type DispatchResult = Result<CachedPayload, DispatchError>;
type SharedDispatch = Shared<BoxFuture<'static, DispatchResult>>;

struct Pending {
    dispatch: SharedDispatch,
    waiters: usize,
}

/// Registry of dispatches currently in flight, keyed by cache key.
#[derive(Default)]
pub struct InFlightRegistry {
    pending: Mutex<HashMap<String, Pending>>,
}

impl fmt::Debug for InFlightRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlightRegistry")
            .field("pending", &self.pending_len())
            .finish()
    }
}

/// Releases one waiter's hold on an entry, including when the awaiting
/// future is dropped early.
struct Waiter<'a> {
    registry: &'a InFlightRegistry,
    key: &'a str,
    dispatch: SharedDispatch,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        self.registry.retire(self.key, &self.dispatch);
    }
}

impl InFlightRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Await the dispatch for `key`, starting it with `start` when none is
    /// pending.
    ///
    /// Every caller sharing a dispatch observes the same result.
    pub async fn run<F, Fut>(&self, key: &str, start: F) -> DispatchResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DispatchResult> + Send + 'static,
    {
        let waiter = Waiter {
            registry: self,
            key,
            dispatch: self.join_or_start(key, start),
        };
        waiter.dispatch.clone().await
    }

    /// Number of keys with a registered dispatch.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn join_or_start<F, Fut>(&self, key: &str, start: F) -> SharedDispatch
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DispatchResult> + Send + 'static,
    {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = pending
            .get_mut(key)
            .filter(|entry| entry.dispatch.peek().is_none())
        {
            debug!("joining in-flight dispatch");
            entry.waiters += 1;
            return entry.dispatch.clone();
        }
        let dispatch = start().boxed().shared();
        pending.insert(
            key.to_owned(),
            Pending {
                dispatch: dispatch.clone(),
                waiters: 1,
            },
        );
        dispatch
    }

    fn retire(&self, key: &str, finished: &SharedDispatch) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = pending
            .get_mut(key)
            .filter(|entry| entry.dispatch.ptr_eq(finished))
        else {
            return;
        };
        entry.waiters = entry.waiters.saturating_sub(1);
        if entry.waiters == 0 || entry.dispatch.peek().is_some() {
            pending.remove(key);
        }
    }
}
