use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::{Arc, Weak};

use crate::replaceable::{Replaceable, SubscriptionId};

/// A consumer's link to a replaceable upstream object.
///
/// The link subscribes to the upstream object's
/// [`DependencyNode`](crate::DependencyNode) and
///
/// * follows replacements: after the upstream object is replaced,
///   [`get`](Self::get) returns the replacement
/// * runs `on_invalidate` after every change or replacement. This is where a
///   consumer clears its own caches and notifies its own dependents.
///
/// Dropping the link unsubscribes it.
///
/// # Examples
///
/// ```
/// use memoquad_core::{DependencyNode, Replaceable, Upstream};
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
/// let low = Arc::new(Rate { value: 0.1, node: DependencyNode::new() });
/// let high = Arc::new(Rate { value: 0.5, node: DependencyNode::new() });
///
/// let cleared = Arc::new(std::sync::atomic::AtomicBool::new(false));
/// let flag = Arc::clone(&cleared);
/// let rate = Upstream::new(Arc::clone(&low), move || {
///     flag.store(true, std::sync::atomic::Ordering::SeqCst);
/// });
///
/// assert_eq!(rate.get().value, 0.1);
/// low.node.replace(&high);
/// assert_eq!(rate.get().value, 0.5);
/// assert!(cleared.load(std::sync::atomic::Ordering::SeqCst));
/// ```
pub struct Upstream<T: Replaceable> {
    link: Arc<Link<T>>,
}

/// Lock order is `subscription` before `current`.
struct Link<T> {
    current: RwLock<Arc<T>>,
    /// `None` once detached.
    subscription: Mutex<Option<SubscriptionId>>,
    on_invalidate: Box<dyn Fn() + Send + Sync>,
}

impl<T: Replaceable> Upstream<T> {
    /// Subscribes to `node` and returns the link.
    pub fn new<F>(node: Arc<T>, on_invalidate: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = SubscriptionId::next();
        let link = Arc::new(Link {
            current: RwLock::new(Arc::clone(&node)),
            subscription: Mutex::new(Some(id)),
            on_invalidate: Box::new(on_invalidate),
        });

        let on_change = Arc::downgrade(&link);
        let on_replace = Arc::downgrade(&link);
        node.dependency_node().subscribe_as(
            id,
            move || {
                if let Some(link) = on_change.upgrade() {
                    if link.subscription.lock().is_some() {
                        (link.on_invalidate)();
                    }
                }
            },
            move |replacement: &Arc<T>| follow(&on_replace, id, replacement),
        );

        Self { link }
    }

    /// The upstream object currently followed.
    pub fn get(&self) -> Arc<T> {
        Arc::clone(&self.link.current.read())
    }

    /// Stops following the upstream object.
    ///
    /// [`get`](Self::get) keeps returning the last object followed, and
    /// `on_invalidate` is not called again. Returns `false` if the link was
    /// already detached.
    pub fn unsubscribe(&self) -> bool {
        let mut subscription = self.link.subscription.lock();
        let Some(id) = subscription.take() else {
            return false;
        };
        let current = Arc::clone(&self.link.current.read());
        drop(subscription);

        if !current.dependency_node().unsubscribe(id) {
            // A replacement is moving the subscription; `follow` removes it.
            tracing::trace!(%id, "detached while being replaced");
        }
        true
    }

    /// Whether the link still follows its upstream object.
    pub fn is_subscribed(&self) -> bool {
        self.link.subscription.lock().is_some()
    }
}

fn follow<T: Replaceable>(link: &Weak<Link<T>>, id: SubscriptionId, replacement: &Arc<T>) {
    let Some(link) = link.upgrade() else {
        replacement.dependency_node().unsubscribe(id);
        return;
    };

    let subscription = link.subscription.lock();
    if subscription.is_none() {
        drop(subscription);
        replacement.dependency_node().unsubscribe(id);
        return;
    }
    *link.current.write() = Arc::clone(replacement);
    drop(subscription);

    (link.on_invalidate)();
}

impl<T: Replaceable> Drop for Upstream<T> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl<T: Replaceable + fmt::Debug> fmt::Debug for Upstream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscription = *self.link.subscription.lock();
        f.debug_struct("Upstream")
            .field("current", &*self.link.current.read())
            .field("subscription", &subscription)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DependencyNode;
    use std::sync::atomic::{AtomicUsize, Ordering};

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

    fn counting_link(node: &Arc<Secret>) -> (Upstream<Secret>, Arc<AtomicUsize>) {
        let invalidations = Arc::new(AtomicUsize::new(0));
        let i = Arc::clone(&invalidations);
        let link = Upstream::new(Arc::clone(node), move || {
            i.fetch_add(1, Ordering::SeqCst);
        });
        (link, invalidations)
    }

    #[test]
    fn test_follows_replacement() {
        let a = Secret::new(1);
        let b = Secret::new(2);
        let (link, invalidations) = counting_link(&a);

        assert_eq!(link.get().value, 1);
        a.node.replace(&b);
        assert_eq!(link.get().value, 2);
        assert_eq!(invalidations.load(Ordering::SeqCst), 1);

        b.node.notify_change();
        assert_eq!(invalidations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_keeps_last_value() {
        let a = Secret::new(1);
        let b = Secret::new(2);
        let (link, invalidations) = counting_link(&a);

        assert!(link.unsubscribe());
        assert!(!link.unsubscribe());
        assert!(!link.is_subscribed());

        a.node.replace(&b);
        a.node.notify_change();
        assert_eq!(link.get().value, 1);
        assert_eq!(invalidations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_unsubscribes_from_current_node() {
        let a = Secret::new(1);
        let b = Secret::new(2);
        let (link, _) = counting_link(&a);

        a.node.replace(&b);
        assert_eq!(b.node.subscriber_count(), 1);

        drop(link);
        assert_eq!(b.node.subscriber_count(), 0);
        assert_eq!(a.node.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_from_sibling_replace_callback() {
        let a = Secret::new(1);
        let b = Secret::new(2);

        // Subscribed first, so its `on_replace` runs before the client's.
        let client_slot: Arc<Mutex<Option<Upstream<Secret>>>> = Arc::new(Mutex::new(None));
        let detached = Arc::new(AtomicUsize::new(0));
        let slot = Arc::clone(&client_slot);
        let d = Arc::clone(&detached);
        a.node.subscribe(
            || {},
            move |_replacement: &Arc<Secret>| {
                if let Some(client) = slot.lock().as_ref() {
                    if client.unsubscribe() {
                        d.fetch_add(1, Ordering::SeqCst);
                    }
                }
            },
        );

        let (client, invalidations) = counting_link(&a);
        *client_slot.lock() = Some(client);

        a.node.replace(&b);
        assert_eq!(detached.load(Ordering::SeqCst), 1);

        let client = client_slot.lock().take().unwrap();
        assert!(!client.is_subscribed());
        assert_eq!(client.get().value, 1);
        assert_eq!(invalidations.load(Ordering::SeqCst), 0);
        assert_eq!(b.node.subscriber_count(), 1);

        b.node.notify_change();
        assert_eq!(invalidations.load(Ordering::SeqCst), 0);

        drop(client);
        assert_eq!(b.node.subscriber_count(), 1);
    }

    #[test]
    fn test_drop_from_sibling_replace_callback() {
        let a = Secret::new(1);
        let b = Secret::new(2);

        let client_slot: Arc<Mutex<Option<Upstream<Secret>>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&client_slot);
        a.node.subscribe(
            || {},
            move |_replacement: &Arc<Secret>| {
                let client = slot.lock().take();
                drop(client);
            },
        );

        let (client, invalidations) = counting_link(&a);
        *client_slot.lock() = Some(client);

        a.node.replace(&b);
        assert_eq!(invalidations.load(Ordering::SeqCst), 0);
        assert_eq!(b.node.subscriber_count(), 1);
    }
}
