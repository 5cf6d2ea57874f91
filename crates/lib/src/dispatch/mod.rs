//! Notification dispatch: typed publish/subscribe and chainable stages.
//!
//! A [`Broadcaster`] is the dispatcher at the heart of every notification
//! stream. Subscribers register interest in a [`NotificationClass`] and are
//! invoked synchronously, in registration order, for every notification
//! whose concrete kind falls in that class. Stages are chained with
//! [`NotificationSender::connect`] into pipelines; [`Pipeline`] wires a
//! whole chain at once and disconnects it in reverse order on drop.
//!
//! Dispatch is call-stack-based: `receive` runs every matching handler and
//! downstream stage to completion before returning. There are no queues and
//! no internal retries; a failing downstream stage unwinds to the caller.

pub mod errors;
mod pipeline;

pub use errors::DispatchError;
pub use pipeline::Pipeline;

use std::sync::{Arc, Mutex};

use crate::Result;
use crate::notification::{Notification, NotificationClass, NotificationKind};

/// A pipeline stage that accepts notifications.
pub trait NotificationReceiver: Send + Sync {
    /// Hands one notification to this stage.
    ///
    /// The default stage contract is to forward unchanged to subscribers
    /// and connected downstream stages; filtering stages may drop or
    /// rewrite instead.
    fn receive(&self, notification: Notification) -> Result<()>;
}

/// A pipeline stage that emits notifications to connected receivers.
pub trait NotificationSender: Send + Sync {
    /// Wires this stage's output into `downstream`'s input.
    fn connect(&self, downstream: Arc<dyn NotificationReceiver>) -> ConnectionToken;

    /// Removes a previously established connection.
    fn disconnect(&self, token: ConnectionToken) -> Result<()>;
}

/// Both halves together: what a [`Pipeline`] chains.
pub trait PipelineStage: NotificationReceiver + NotificationSender {}

impl<T: NotificationReceiver + NotificationSender> PipelineStage for T {}

/// Identity of one subscription, returned by [`Broadcaster::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

/// Identity of one stage connection, returned by
/// [`NotificationSender::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionToken(u64);

impl ConnectionToken {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub(crate) fn raw(self) -> u64 {
        self.0
    }
}

/// Subscriber callback. Handlers observe; they cannot veto or rewrite.
pub type NotificationHandler = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Downstream-connection bookkeeping shared by sender stages.
///
/// Forwarding snapshots the target list before calling out, so a receiver
/// may connect or disconnect re-entrantly.
#[derive(Default)]
pub(crate) struct Downstream {
    inner: Mutex<DownstreamInner>,
}

#[derive(Default)]
struct DownstreamInner {
    next_token: u64,
    targets: Vec<(ConnectionToken, Arc<dyn NotificationReceiver>)>,
}

impl Downstream {
    pub(crate) fn connect(&self, receiver: Arc<dyn NotificationReceiver>) -> ConnectionToken {
        let mut inner = self.inner.lock().unwrap();
        let token = ConnectionToken(inner.next_token);
        inner.next_token += 1;
        inner.targets.push((token, receiver));
        token
    }

    pub(crate) fn disconnect(&self, token: ConnectionToken) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let position = inner
            .targets
            .iter()
            .position(|(existing, _)| *existing == token)
            .ok_or(DispatchError::UnknownConnection { token: token.0 })?;
        inner.targets.remove(position);
        Ok(())
    }

    pub(crate) fn forward(&self, notification: Notification) -> Result<()> {
        let targets: Vec<Arc<dyn NotificationReceiver>> = {
            let inner = self.inner.lock().unwrap();
            inner
                .targets
                .iter()
                .map(|(_, receiver)| receiver.clone())
                .collect()
        };
        if let Some((last, rest)) = targets.split_last() {
            for receiver in rest {
                receiver.receive(notification.clone())?;
            }
            last.receive(notification)?;
        }
        Ok(())
    }
}

struct Subscription {
    token: SubscriptionToken,
    class: NotificationClass,
    handler: NotificationHandler,
}

#[derive(Default)]
struct BroadcasterInner {
    next_token: u64,
    subscriptions: Vec<Subscription>,
    /// Active-subscription count per concrete kind, indexed by
    /// `NotificationKind::index`. Incremented for every kind in a
    /// subscribed class's closure; the cheap pre-check behind
    /// [`Broadcaster::can_receive`].
    counters: [usize; NotificationKind::ALL.len()],
    downstream: Vec<(ConnectionToken, Arc<dyn NotificationReceiver>)>,
}

/// Type-scoped publish/subscribe dispatcher.
///
/// Cheap-clone handle; clones share subscriptions and connections. The
/// subscriber list is snapshotted before invocation, so handlers may
/// subscribe or unsubscribe re-entrantly without deadlocking dispatch.
#[derive(Clone, Default)]
pub struct Broadcaster {
    inner: Arc<Mutex<BroadcasterInner>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for every notification assignable to `class`.
    pub fn subscribe(
        &self,
        class: NotificationClass,
        handler: impl Fn(&Notification) + Send + Sync + 'static,
    ) -> SubscriptionToken {
        let mut inner = self.inner.lock().unwrap();
        let token = SubscriptionToken(inner.next_token);
        inner.next_token += 1;
        for kind in class.members() {
            inner.counters[kind.index()] += 1;
        }
        inner.subscriptions.push(Subscription {
            token,
            class,
            handler: Arc::new(handler),
        });
        tracing::trace!(?class, token = token.0, "subscribed");
        token
    }

    /// Removes a subscription.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let position = inner
            .subscriptions
            .iter()
            .position(|subscription| subscription.token == token)
            .ok_or(DispatchError::UnknownSubscription { token: token.0 })?;
        let subscription = inner.subscriptions.remove(position);
        for kind in subscription.class.members() {
            inner.counters[kind.index()] -= 1;
        }
        tracing::trace!(token = token.0, "unsubscribed");
        Ok(())
    }

    /// True iff some active subscription matches one of `classes`, or a
    /// downstream stage is connected (downstream receives everything).
    ///
    /// Producers use this to skip building an expensive payload nobody
    /// wants.
    pub fn can_receive(&self, classes: &[NotificationClass]) -> bool {
        let inner = self.inner.lock().unwrap();
        if !inner.downstream.is_empty() {
            return true;
        }
        classes
            .iter()
            .flat_map(|class| class.members())
            .any(|kind| inner.counters[kind.index()] > 0)
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.lock().unwrap().subscriptions.len()
    }

    fn dispatch(&self, notification: Notification) -> Result<()> {
        let kind = notification.kind();
        let (handlers, downstream) = {
            let inner = self.inner.lock().unwrap();
            if inner.counters[kind.index()] == 0 && inner.downstream.is_empty() {
                return Ok(());
            }
            let handlers: Vec<NotificationHandler> = inner
                .subscriptions
                .iter()
                .filter(|subscription| subscription.class.matches(kind))
                .map(|subscription| subscription.handler.clone())
                .collect();
            let downstream: Vec<Arc<dyn NotificationReceiver>> = inner
                .downstream
                .iter()
                .map(|(_, receiver)| receiver.clone())
                .collect();
            (handlers, downstream)
        };

        tracing::trace!(?kind, id = %notification.id(), "dispatching");
        for handler in &handlers {
            handler(&notification);
        }

        if let Some((last, rest)) = downstream.split_last() {
            for receiver in rest {
                receiver.receive(notification.clone())?;
            }
            last.receive(notification)?;
        }
        Ok(())
    }
}

impl NotificationReceiver for Broadcaster {
    fn receive(&self, notification: Notification) -> Result<()> {
        self.dispatch(notification)
    }
}

impl NotificationSender for Broadcaster {
    fn connect(&self, downstream: Arc<dyn NotificationReceiver>) -> ConnectionToken {
        let mut inner = self.inner.lock().unwrap();
        let token = ConnectionToken(inner.next_token);
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
            .ok_or(DispatchError::UnknownConnection { token: token.0 })?;
        inner.downstream.remove(position);
        Ok(())
    }
}
