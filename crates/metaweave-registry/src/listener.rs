//! Notification listeners

use metaweave_ids::Identifier;

/// Receives every identifier invalidated by a propagation pass, in pass order.
///
/// Listeners are called without any engine lock held and may read metadata,
/// but must not assume the identifier has been recomputed yet.
pub trait NotificationListener: Send + Sync {
    fn notify(&self, changed: &Identifier);
}

impl<F> NotificationListener for F
where
    F: Fn(&Identifier) + Send + Sync,
{
    fn notify(&self, changed: &Identifier) {
        self(changed)
    }
}
