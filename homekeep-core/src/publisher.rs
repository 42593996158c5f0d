//! Current-identity broadcast.
//!
//! The publisher is the one place the rest of the application reads
//! "who is signed in". It holds a single current value, `None` when signed
//! out. Only the session coordinator writes to it; any number of readers
//! subscribe.
//!
//! Every publication is tagged with a sequence number. Readers may miss
//! intermediate values when they fall behind, but they always move forward
//! through the same total order.

use std::sync::Arc;

use tokio::sync::watch;

use crate::identity::IdentitySnapshot;

/// Shared handle to an immutable snapshot.
pub type SharedIdentity = Arc<IdentitySnapshot>;

/// One published value.
#[derive(Debug, Clone)]
pub struct Publication {
    /// Position in the total order of publications. Starts at 0 (initial absent value).
    pub sequence: u64,
    pub identity: Option<SharedIdentity>,
}

/// Single-writer broadcast of the current identity.
#[derive(Debug)]
pub struct IdentityPublisher {
    sender: watch::Sender<Publication>,
}

impl IdentityPublisher {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Publication {
            sequence: 0,
            identity: None,
        });
        Self { sender }
    }

    /// The current identity, if any.
    pub fn current(&self) -> Option<SharedIdentity> {
        self.sender.borrow().identity.clone()
    }

    /// The current publication including its sequence number.
    pub fn latest(&self) -> Publication {
        self.sender.borrow().clone()
    }

    /// True if the current identity is authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.sender
            .borrow()
            .identity
            .as_ref()
            .is_some_and(|s| s.is_authenticated())
    }

    /// Subscribe to identity changes.
    pub fn subscribe(&self) -> IdentityStream {
        IdentityStream {
            receiver: self.sender.subscribe(),
        }
    }

    /// Replace the current identity. Returns the new sequence number.
    pub(crate) fn publish(&self, identity: Option<SharedIdentity>) -> u64 {
        let mut sequence = 0;
        self.sender.send_modify(|publication| {
            publication.sequence += 1;
            publication.identity = identity;
            sequence = publication.sequence;
        });
        sequence
    }

    /// Publish only if the value differs from the current one.
    ///
    /// Returns true if a publication happened.
    pub(crate) fn publish_if_changed(&self, identity: Option<SharedIdentity>) -> bool {
        self.sender.send_if_modified(|publication| {
            let same = match (&publication.identity, &identity) {
                (None, None) => true,
                (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a == b,
                _ => false,
            };
            if same {
                return false;
            }
            publication.sequence += 1;
            publication.identity = identity;
            true
        })
    }
}

impl Default for IdentityPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscriber side of the publisher.
#[derive(Debug, Clone)]
pub struct IdentityStream {
    receiver: watch::Receiver<Publication>,
}

impl IdentityStream {
    /// The value currently held, marking it as seen.
    pub fn current(&mut self) -> Publication {
        self.receiver.borrow_and_update().clone()
    }

    /// Wait for the next publication after the last one seen.
    ///
    /// Returns `None` once the publisher is gone.
    pub async fn changed(&mut self) -> Option<Publication> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Wait until the current identity satisfies `predicate`.
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> Option<Publication>
    where
        F: FnMut(Option<&IdentitySnapshot>) -> bool,
    {
        self.receiver
            .wait_for(|p| predicate(p.identity.as_deref()))
            .await
            .ok()
            .map(|p| p.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{HouseholdMembership, HouseholdRole};

    fn shared(user_id: &str) -> SharedIdentity {
        Arc::new(IdentitySnapshot::minimal(user_id, "a@x.com"))
    }

    #[test]
    fn test_starts_absent() {
        let publisher = IdentityPublisher::new();

        assert!(publisher.current().is_none());
        assert!(!publisher.is_authenticated());
        assert_eq!(publisher.latest().sequence, 0);
    }

    #[test]
    fn test_publish_replaces_value() {
        let publisher = IdentityPublisher::new();

        assert_eq!(publisher.publish(Some(shared("u1"))), 1);
        assert_eq!(publisher.current().unwrap().user_id, "u1");
        assert!(publisher.is_authenticated());

        assert_eq!(publisher.publish(None), 2);
        assert!(publisher.current().is_none());
    }

    #[test]
    fn test_unauthenticated_snapshot_is_not_authenticated() {
        let publisher = IdentityPublisher::new();
        publisher.publish(Some(shared("")));

        assert!(publisher.current().is_some());
        assert!(!publisher.is_authenticated());
    }

    #[test]
    fn test_publish_if_changed_skips_equal_values() {
        let publisher = IdentityPublisher::new();

        assert!(!publisher.publish_if_changed(None));
        assert!(publisher.publish_if_changed(Some(shared("u1"))));
        assert!(!publisher.publish_if_changed(Some(shared("u1"))));
        assert_eq!(publisher.latest().sequence, 1);

        let with_home = Arc::new(IdentitySnapshot::minimal("u1", "a@x.com").with_households(
            vec![HouseholdMembership::new("h1", "Home", HouseholdRole::Admin)],
        ));
        assert!(publisher.publish_if_changed(Some(with_home)));
        assert_eq!(publisher.latest().sequence, 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_same_order() {
        let publisher = IdentityPublisher::new();
        let mut first = publisher.subscribe();
        let mut second = publisher.subscribe();

        publisher.publish(Some(shared("u1")));
        let a = first.changed().await.unwrap();
        publisher.publish(Some(shared("u2")));
        publisher.publish(None);

        let b = first.changed().await.unwrap();
        let c = second.changed().await.unwrap();

        assert_eq!(a.sequence, 1);
        // Both readers converge on the latest value, never an older one
        assert_eq!(b.sequence, 3);
        assert_eq!(c.sequence, 3);
        assert!(b.identity.is_none());
    }

    #[tokio::test]
    async fn test_wait_for() {
        let publisher = Arc::new(IdentityPublisher::new());
        let mut stream = publisher.subscribe();

        let writer = publisher.clone();
        tokio::spawn(async move {
            writer.publish(Some(shared("u1")));
        });

        let publication = stream
            .wait_for(|identity| identity.is_some_and(|s| s.user_id == "u1"))
            .await
            .unwrap();
        assert_eq!(publication.sequence, 1);
    }
}
