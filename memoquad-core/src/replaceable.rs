//! # Dependency Nodes
//!
//! A [`DependencyNode`] lets downstream objects observe an upstream object for
//! two kinds of events:
//!
//! * **change** - the upstream object is still the same object, but the value
//!   it represents has mutated ([`DependencyNode::notify_change`])
//! * **replace** - the upstream object is being swapped for another object of
//!   the same type ([`DependencyNode::replace`]). Every subscription moves to
//!   the replacement, so a consumer that watched `A` ends up watching `C`
//!   after `A` is replaced by `B` and `B` by `C`.
//!
//! Objects that can be replaced embed a node and implement [`Replaceable`].
//! Consumers usually don't subscribe by hand but hold an
//! [`Upstream`](crate::Upstream), which follows replacements automatically.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Ids come from one process-wide counter so that subscriptions migrated by
/// [`DependencyNode::replace`] never collide with the target's own.
static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Handle returned by [`DependencyNode::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscription#{}", self.0)
    }
}

/// An object whose dependents can be moved to a replacement object.
pub trait Replaceable: Send + Sync + Sized + 'static {
    /// The node holding this object's subscriptions.
    fn dependency_node(&self) -> &DependencyNode<Self>;
}

type ChangeCallback = Arc<dyn Fn() + Send + Sync>;
type ReplaceCallback<T> = Arc<dyn Fn(&Arc<T>) + Send + Sync>;

struct Subscription<T> {
    on_change: ChangeCallback,
    on_replace: ReplaceCallback<T>,
}

impl<T> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Self {
            on_change: Arc::clone(&self.on_change),
            on_replace: Arc::clone(&self.on_replace),
        }
    }
}

/// Subscription bookkeeping for one replaceable object of type `T`.
///
/// All operations lock the node's subscription map for the bookkeeping only.
/// Callbacks are invoked after the lock is released, on the calling thread, so
/// a callback may freely subscribe, unsubscribe or notify further nodes.
///
/// # Examples
///
/// ```
/// use memoquad_core::{DependencyNode, Replaceable};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// struct Rate {
///     value: f64,
///     node: DependencyNode<Rate>,
/// }
///
/// impl Replaceable for Rate {
///     fn dependency_node(&self) -> &DependencyNode<Rate> {
///         &self.node
///     }
/// }
///
/// let old = Arc::new(Rate { value: 0.1, node: DependencyNode::new() });
/// let new = Arc::new(Rate { value: 0.2, node: DependencyNode::new() });
///
/// let changes = Arc::new(AtomicUsize::new(0));
/// let c = Arc::clone(&changes);
/// old.node.subscribe(
///     move || { c.fetch_add(1, Ordering::SeqCst); },
///     |replacement: &Arc<Rate>| assert_eq!(replacement.value, 0.2),
/// );
///
/// old.node.notify_change();
/// old.node.replace(&new);
/// assert_eq!(old.node.subscriber_count(), 0);
///
/// new.node.notify_change();
/// assert_eq!(changes.load(Ordering::SeqCst), 2);
/// ```
pub struct DependencyNode<T> {
    subscriptions: Mutex<BTreeMap<SubscriptionId, Subscription<T>>>,
}

impl<T> DependencyNode<T> {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(BTreeMap::new()),
        }
    }

    /// Registers a subscriber and returns its id.
    ///
    /// # Arguments
    ///
    /// * `on_change` - Called by [`notify_change`](Self::notify_change)
    /// * `on_replace` - Called with the replacement by [`replace`](Self::replace)
    pub fn subscribe<C, R>(&self, on_change: C, on_replace: R) -> SubscriptionId
    where
        C: Fn() + Send + Sync + 'static,
        R: Fn(&Arc<T>) + Send + Sync + 'static,
    {
        let id = SubscriptionId::next();
        self.subscribe_as(id, on_change, on_replace);
        id
    }

    /// Registers a subscriber under an id allocated by the caller, for
    /// callbacks that need to know their own id.
    pub(crate) fn subscribe_as<C, R>(&self, id: SubscriptionId, on_change: C, on_replace: R)
    where
        C: Fn() + Send + Sync + 'static,
        R: Fn(&Arc<T>) + Send + Sync + 'static,
    {
        self.subscriptions.lock().insert(
            id,
            Subscription {
                on_change: Arc::new(on_change),
                on_replace: Arc::new(on_replace),
            },
        );
        tracing::trace!(%id, "subscribed");
    }

    /// Removes a subscriber. Returns `false` if `id` is not subscribed here.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscriptions.lock().remove(&id).is_some();
        if removed {
            tracing::trace!(%id, "unsubscribed");
        }
        removed
    }

    /// Calls every subscriber's `on_change` callback.
    pub fn notify_change(&self) {
        let callbacks: Vec<ChangeCallback> = self
            .subscriptions
            .lock()
            .values()
            .map(|subscription| Arc::clone(&subscription.on_change))
            .collect();

        for on_change in callbacks {
            on_change();
        }
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscriptions.lock().contains_key(&id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.lock().len()
    }
}

impl<T: Replaceable> DependencyNode<T> {
    /// Moves every subscription to `replacement`'s node, then calls each
    /// moved subscriber's `on_replace` with `replacement`.
    ///
    /// Afterwards this node has no subscribers, so a later `notify_change` or
    /// `replace` on it reaches none of the moved subscribers. Replacing an
    /// object with itself does nothing.
    ///
    /// A subscriber that detaches after the move but before its `on_replace`
    /// runs is already registered with `replacement`. Its `on_replace` must
    /// unsubscribe from `replacement` in that case, as
    /// [`Upstream`](crate::Upstream) does.
    pub fn replace(&self, replacement: &Arc<T>) {
        let target = replacement.dependency_node();
        if std::ptr::eq(self, target) {
            return;
        }

        // The two locks are never held together, so concurrent replacements in
        // opposite directions cannot deadlock.
        let migrated = std::mem::take(&mut *self.subscriptions.lock());
        if migrated.is_empty() {
            return;
        }

        target.subscriptions.lock().extend(
            migrated
                .iter()
                .map(|(id, subscription)| (*id, subscription.clone())),
        );
        tracing::trace!(count = migrated.len(), "subscriptions moved to replacement");

        for subscription in migrated.values() {
            (subscription.on_replace)(replacement);
        }
    }
}

impl<T> Default for DependencyNode<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for DependencyNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyNode")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Secret {
        value: i32,
        node: DependencyNode<Secret>,
    }

    impl Secret {
        fn new(value: i32) -> Arc<Self> {
            Arc::new(Self {
                value,
                node: DependencyNode::new(),
            })
        }
    }

    impl Replaceable for Secret {
        fn dependency_node(&self) -> &DependencyNode<Self> {
            &self.node
        }
    }

    #[test]
    fn test_notify_change_counts() {
        let node = Secret::new(1);
        let changes = Arc::new(AtomicUsize::new(0));

        let ids: Vec<_> = (0..3)
            .map(|_| {
                let c = Arc::clone(&changes);
                node.node.subscribe(
                    move || {
                        c.fetch_add(1, Ordering::SeqCst);
                    },
                    |_: &Arc<Secret>| {},
                )
            })
            .collect();

        node.node.notify_change();
        assert_eq!(changes.load(Ordering::SeqCst), 3);

        assert!(node.node.unsubscribe(ids[1]));
        assert!(!node.node.unsubscribe(ids[1]));
        node.node.notify_change();
        assert_eq!(changes.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_replace_moves_subscriptions() {
        let a = Secret::new(1);
        let b = Secret::new(2);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        let id = a
            .node
            .subscribe(|| {}, move |new: &Arc<Secret>| s.lock().push(new.value));
        b.node.subscribe(|| {}, |_: &Arc<Secret>| {});

        a.node.replace(&b);

        assert_eq!(*seen.lock(), vec![2]);
        assert_eq!(a.node.subscriber_count(), 0);
        assert_eq!(b.node.subscriber_count(), 2);
        assert!(b.node.is_subscribed(id));

        // The old node no longer reaches the moved subscriber.
        let c = Secret::new(3);
        a.node.replace(&c);
        assert_eq!(*seen.lock(), vec![2]);
    }

    #[test]
    fn test_replace_chain() {
        let a = Secret::new(1);
        let b = Secret::new(2);
        let c = Secret::new(3);
        let latest = Arc::new(AtomicUsize::new(0));

        let l = Arc::clone(&latest);
        let id = a.node.subscribe(
            || {},
            move |new: &Arc<Secret>| l.store(new.value as usize, Ordering::SeqCst),
        );

        a.node.replace(&b);
        b.node.replace(&c);

        assert_eq!(latest.load(Ordering::SeqCst), 3);
        assert!(c.node.is_subscribed(id));
        assert_eq!(b.node.subscriber_count(), 0);
    }

    #[test]
    fn test_replace_with_self_is_noop() {
        let a = Secret::new(1);
        let replaced = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&replaced);
        a.node.subscribe(
            || {},
            move |_: &Arc<Secret>| {
                r.fetch_add(1, Ordering::SeqCst);
            },
        );

        a.node.replace(&a);
        assert_eq!(replaced.load(Ordering::SeqCst), 0);
        assert_eq!(a.node.subscriber_count(), 1);
    }

    #[test]
    fn test_callback_may_resubscribe() {
        let a = Secret::new(1);
        let node = Arc::clone(&a);
        a.node.subscribe(
            move || {
                node.node.subscribe(|| {}, |_: &Arc<Secret>| {});
            },
            |_: &Arc<Secret>| {},
        );

        a.node.notify_change();
        assert_eq!(a.node.subscriber_count(), 2);
    }

    #[test]
    fn test_ids_are_unique_across_nodes() {
        let a = Secret::new(1);
        let b = Secret::new(2);
        let id_a = a.node.subscribe(|| {}, |_: &Arc<Secret>| {});
        let id_b = b.node.subscribe(|| {}, |_: &Arc<Secret>| {});
        assert_ne!(id_a, id_b);

        a.node.replace(&b);
        assert_eq!(b.node.subscriber_count(), 2);
    }
}
