//! Transaction guard: rejects dispatch while a database transaction is open.
//!
//! Transaction state is threaded explicitly through the call chain rather
//! than held in process-wide ambient state, so concurrent requests cannot
//! observe each other's transactions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::contract::Request;
use crate::dispatch::{DispatchOptions, Dispatcher};
use crate::error::InteractionError;

/// Re-entrant transaction depth for one logical unit of work.
///
/// Nested scopes within the same unit of work stack without tripping the
/// guard's own bookkeeping; the guard rejects while depth > 0.
#[derive(Debug, Default)]
pub struct TransactionState {
    depth: AtomicUsize,
}

impl TransactionState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Enter a transaction scope. The returned scope decrements the depth
    /// when dropped (commit or rollback).
    pub fn begin(self: &Arc<Self>) -> TransactionScope {
        self.depth.fetch_add(1, Ordering::SeqCst);
        TransactionScope {
            state: Arc::clone(self),
        }
    }

    pub fn is_active(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }
}

/// RAII handle for one transaction nesting level.
#[must_use = "dropping the scope immediately ends the transaction level"]
pub struct TransactionScope {
    state: Arc<TransactionState>,
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        self.state.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wraps a dispatcher and rejects dispatch inside an open transaction
/// rather than risk nested or ambient transactions.
pub struct GuardedDispatcher {
    inner: Arc<Dispatcher>,
    transactions: Arc<TransactionState>,
}

impl GuardedDispatcher {
    pub fn new(inner: Arc<Dispatcher>, transactions: Arc<TransactionState>) -> Self {
        Self {
            inner,
            transactions,
        }
    }

    pub async fn dispatch<R: Request>(&self, request: &R) -> Result<R::Response, InteractionError> {
        self.dispatch_with(request, DispatchOptions::default())
            .await
    }

    pub async fn dispatch_with<R: Request>(
        &self,
        request: &R,
        options: DispatchOptions,
    ) -> Result<R::Response, InteractionError> {
        if self.transactions.is_active() {
            return Err(InteractionError::TransactionOpen);
        }
        self.inner.dispatch_with(request, options).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::contract::{Contract, InteractionContext};
    use crate::dispatch::Handler;

    #[derive(Serialize)]
    struct Ping;

    impl Contract for Ping {
        const NAME: &'static str = "Ping";
    }

    impl Request for Ping {
        type Response = Pong;
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Pong;

    impl Contract for Pong {
        const NAME: &'static str = "Pong";
    }

    struct PingHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Handler<Ping> for PingHandler {
        async fn handle(
            &self,
            _ctx: &InteractionContext,
            _request: &Ping,
        ) -> Result<Pong, InteractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Pong)
        }
    }

    fn guarded() -> (GuardedDispatcher, Arc<PingHandler>, Arc<TransactionState>) {
        let handler = Arc::new(PingHandler {
            calls: AtomicUsize::new(0),
        });
        let dispatcher = Arc::new(
            Dispatcher::builder()
                .register::<Ping>(handler.clone())
                .build(),
        );
        let state = TransactionState::new();
        (
            GuardedDispatcher::new(dispatcher, state.clone()),
            handler,
            state,
        )
    }

    #[tokio::test]
    async fn rejects_inside_open_transaction_without_invoking_inner() {
        let (guarded, handler, state) = guarded();

        let _scope = state.begin();
        let err = guarded.dispatch(&Ping).await.unwrap_err();

        assert!(matches!(err, InteractionError::TransactionOpen));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn delegates_when_no_transaction_open() {
        let (guarded, handler, _state) = guarded();
        guarded.dispatch(&Ping).await.unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn nested_scopes_keep_guard_tripped_until_outermost_drop() {
        let (guarded, _handler, state) = guarded();

        let outer = state.begin();
        {
            let _inner = state.begin();
            assert!(state.is_active());
        }
        // Inner scope dropped; still inside the outer transaction.
        assert!(state.is_active());
        assert!(matches!(
            guarded.dispatch(&Ping).await.unwrap_err(),
            InteractionError::TransactionOpen
        ));

        drop(outer);
        assert!(!state.is_active());
        guarded.dispatch(&Ping).await.unwrap();
    }
}
