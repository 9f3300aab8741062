//! Replicated field abstraction
//!
//! A [`ReplicatedField`] is a single value owned by the authoritative side
//! and mirrored read-only on remote peers. Listeners registered on either
//! side observe every change in commit order; a new listener immediately
//! receives the last committed value.

use tracing::debug;

use super::Role;

type Listener<T> = Box<dyn FnMut(&T) + Send>;

/// A value replicated from the authority to observers, with change
/// notification.
pub struct ReplicatedField<T> {
    role: Role,
    value: T,
    listeners: Vec<Listener<T>>,
}

impl<T: Clone> ReplicatedField<T> {
    pub fn new(role: Role, initial: T) -> Self {
        Self {
            role,
            value: initial,
            listeners: Vec::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Last committed (authority) or ingested (observer) value
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Authoritative write. Stores the value and dispatches it to every
    /// listener in commit order. On a non-authoritative instance this is a
    /// silent no-op; the return value reports whether the write applied.
    pub fn commit(&mut self, value: T) -> bool {
        if !self.role.is_authority() {
            debug!("replicated field write rejected on remote instance");
            return false;
        }
        self.value = value;
        self.dispatch();
        true
    }

    /// Observer-side entry point for values arriving from the replication
    /// channel. The value is already canonical, so no authority check.
    pub fn ingest(&mut self, value: T) {
        self.value = value;
        self.dispatch();
    }

    /// Register a change listener. The last committed value is dispatched to
    /// the new listener immediately.
    pub fn subscribe<F>(&mut self, mut listener: F)
    where
        F: FnMut(&T) + Send + 'static,
    {
        listener(&self.value);
        self.listeners.push(Box::new(listener));
    }

    fn dispatch(&mut self) {
        for listener in &mut self.listeners {
            listener(&self.value);
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ReplicatedField<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicatedField")
            .field("role", &self.role)
            .field("value", &self.value)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder(log: &Arc<Mutex<Vec<f32>>>) -> impl FnMut(&f32) + Send + 'static {
        let log = log.clone();
        move |v: &f32| log.lock().unwrap().push(*v)
    }

    #[test]
    fn commit_dispatches_in_commit_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut field = ReplicatedField::new(Role::Authority, 100.0f32);
        field.subscribe(recorder(&log));

        assert!(field.commit(60.0));
        assert!(field.commit(25.0));
        assert!(field.commit(0.0));

        // Initial dispatch on subscribe, then one per commit
        assert_eq!(*log.lock().unwrap(), vec![100.0, 60.0, 25.0, 0.0]);
    }

    #[test]
    fn late_subscriber_sees_last_committed_value() {
        let mut field = ReplicatedField::new(Role::Authority, 100.0f32);
        field.commit(42.0);

        let log = Arc::new(Mutex::new(Vec::new()));
        field.subscribe(recorder(&log));
        assert_eq!(*log.lock().unwrap(), vec![42.0]);
    }

    #[test]
    fn remote_commit_is_rejected_without_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut field = ReplicatedField::new(Role::Remote, 100.0f32);
        field.subscribe(recorder(&log));

        assert!(!field.commit(10.0));
        assert_eq!(*field.get(), 100.0);
        assert_eq!(*log.lock().unwrap(), vec![100.0]);
    }

    #[test]
    fn remote_ingest_stores_and_dispatches() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut field = ReplicatedField::new(Role::Remote, 100.0f32);
        field.subscribe(recorder(&log));

        field.ingest(55.0);
        assert_eq!(*field.get(), 55.0);
        assert_eq!(*log.lock().unwrap(), vec![100.0, 55.0]);
    }
}
