//! Batching of notifications into composites.
//!
//! A [`Compositor`] is a pipeline stage that, while a composite scope is
//! open, appends every received notification as a part instead of
//! forwarding it. Closing the outermost scope forwards the accumulated
//! [`Composite`](crate::notification::NotificationBody::Composite) as one
//! unit, preserving insertion order. Re-entrant scopes (a sub-operation of
//! an operation that already opened one) append into the same open
//! composite rather than opening their own.

use std::sync::{Arc, Mutex};

use crate::Result;
use crate::dispatch::{
    ConnectionToken, DispatchError, NotificationReceiver, NotificationSender,
};
use crate::notification::{Notification, NotificationBody, NotificationIdSource};

#[derive(Default)]
struct CompositorInner {
    /// Scope nesting depth; parts accumulate while > 0.
    depth: usize,
    parts: Vec<Notification>,
    next_token: u64,
    downstream: Vec<(ConnectionToken, Arc<dyn NotificationReceiver>)>,
}

/// Pipeline stage batching all notifications of one logical operation.
///
/// Cheap-clone handle; clones share the open scope and connections.
#[derive(Clone)]
pub struct Compositor {
    inner: Arc<Mutex<CompositorInner>>,
    ids: NotificationIdSource,
}

impl Compositor {
    /// Creates a compositor minting composite ids from `ids`.
    pub fn new(ids: NotificationIdSource) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CompositorInner::default())),
            ids,
        }
    }

    /// Opens a composite scope (or joins the already open one).
    ///
    /// Dropping the returned guard closes the scope; only the outermost
    /// close forwards the composite. Prefer [`CompositeScope::close`] when
    /// the forwarding result matters — `Drop` can only log a failure.
    pub fn scope(&self) -> CompositeScope {
        let mut inner = self.inner.lock().unwrap();
        inner.depth += 1;
        tracing::trace!(depth = inner.depth, "composite scope opened");
        CompositeScope {
            compositor: self.clone(),
        }
    }

    /// True while a composite is open.
    pub fn is_open(&self) -> bool {
        self.inner.lock().unwrap().depth > 0
    }

    fn exit_scope(&self) -> Result<()> {
        let composite = {
            let mut inner = self.inner.lock().unwrap();
            inner.depth -= 1;
            if inner.depth > 0 {
                return Ok(());
            }
            let parts = std::mem::take(&mut inner.parts);
            if parts.is_empty() {
                return Ok(());
            }
            Notification::new(self.ids.mint(), NotificationBody::Composite { parts })
        };
        tracing::trace!(id = %composite.id(), "composite closed");
        self.forward(composite)
    }

    fn forward(&self, notification: Notification) -> Result<()> {
        let downstream: Vec<Arc<dyn NotificationReceiver>> = {
            let inner = self.inner.lock().unwrap();
            inner
                .downstream
                .iter()
                .map(|(_, receiver)| receiver.clone())
                .collect()
        };
        if let Some((last, rest)) = downstream.split_last() {
            for receiver in rest {
                receiver.receive(notification.clone())?;
            }
            last.receive(notification)?;
        }
        Ok(())
    }
}

impl NotificationReceiver for Compositor {
    fn receive(&self, notification: Notification) -> Result<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.depth > 0 {
                inner.parts.push(notification);
                return Ok(());
            }
        }
        self.forward(notification)
    }
}

impl NotificationSender for Compositor {
    fn connect(&self, downstream: Arc<dyn NotificationReceiver>) -> ConnectionToken {
        let mut inner = self.inner.lock().unwrap();
        let token = ConnectionToken::from_raw(inner.next_token);
        inner.next_token += 1;
        inner.downstream.push((token, downstream));
        token
    }

    fn disconnect(&self, token: ConnectionToken) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let position = inner
            .downstream
            .iter()
            .position(|(existing, _)| *existing == token)
            .ok_or(DispatchError::UnknownConnection {
                token: token.raw(),
            })?;
        inner.downstream.remove(position);
        Ok(())
    }
}

/// RAII guard for one composite scope.
#[must_use = "the composite closes when the scope is dropped"]
pub struct CompositeScope {
    compositor: Compositor,
}

impl CompositeScope {
    /// Closes the scope, surfacing any forwarding failure.
    pub fn close(self) -> Result<()> {
        let result = self.compositor.exit_scope();
        std::mem::forget(self);
        result
    }
}

impl Drop for CompositeScope {
    fn drop(&mut self) {
        if let Err(err) = self.compositor.exit_scope() {
            tracing::error!("composite close failed during drop: {err}");
        }
    }
}
