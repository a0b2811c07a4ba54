//! Typed event dispatch: callbacks stored in properties, and owners looked
//! up through a registry instead of being referenced by nodes.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::node::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Tap,
    DoubleTap,
    LongPress,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// Node the gesture landed on.
    pub source: NodeId,
}

/// A handler value. Two callbacks are equal only when they are the same
/// allocation, so cloning a properties value keeps it equal to the original.
pub struct Callback<E> {
    handler: Arc<dyn Fn(&E) + Send + Sync>,
}

impl<E> Callback<E> {
    pub fn new(handler: impl Fn(&E) + Send + Sync + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn call(&self, event: &E) {
        (self.handler)(event);
    }
}

impl<E> Clone for Callback<E> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<E> PartialEq for Callback<E> {
    fn eq(&self, other: &Self) -> bool {
        Arc::as_ptr(&self.handler) as *const () == Arc::as_ptr(&other.handler) as *const ()
    }
}

impl<E> fmt::Debug for Callback<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Arc::as_ptr(&self.handler) as *const ())
    }
}

/// Receives events routed to a node's owner.
pub trait EventTarget {
    fn handle_event(&self, event: &Event);
}

/// Key of an event target inside an [`OwnerRegistry`].
///
/// Holding an `OwnerId` never keeps the target alive; a stale id simply
/// stops resolving once its slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId {
    index: u32,
    generation: u32,
}

struct OwnerSlot {
    generation: u32,
    target: Option<Weak<dyn EventTarget>>,
}

#[derive(Default)]
struct RegistryInner {
    slots: Vec<OwnerSlot>,
    free: Vec<u32>,
}

impl RegistryInner {
    fn resolve(&self, id: OwnerId) -> Option<Rc<dyn EventTarget>> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.target.as_ref()?.upgrade()
    }
}

/// Arena of weakly held event targets, shared by everything on the UI thread.
#[derive(Clone, Default)]
pub struct OwnerRegistry {
    inner: Rc<RefCell<RegistryInner>>,
}

impl OwnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, target: Weak<dyn EventTarget>) -> OwnerId {
        let mut inner = self.inner.borrow_mut();
        if let Some(index) = inner.free.pop() {
            let slot = &mut inner.slots[index as usize];
            slot.target = Some(target);
            return OwnerId {
                index,
                generation: slot.generation,
            };
        }
        let index = inner.slots.len() as u32;
        inner.slots.push(OwnerSlot {
            generation: 0,
            target: Some(target),
        });
        OwnerId {
            index,
            generation: 0,
        }
    }

    pub fn unregister(&self, id: OwnerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(slot) = inner.slots.get_mut(id.index as usize) else {
            return false;
        };
        if slot.generation != id.generation || slot.target.is_none() {
            return false;
        }
        slot.target = None;
        slot.generation = slot.generation.wrapping_add(1);
        inner.free.push(id.index);
        true
    }

    pub fn contains(&self, id: OwnerId) -> bool {
        self.inner.borrow().resolve(id).is_some()
    }

    /// Delivers `event` to the owner behind `id`. Returns `false` when the
    /// id is stale or the target has been dropped.
    pub fn dispatch(&self, id: OwnerId, event: &Event) -> bool {
        // Release the borrow first: handlers may register new owners.
        let target = self.inner.borrow().resolve(id);
        match target {
            Some(target) => {
                target.handle_event(event);
                true
            }
            None => {
                log::trace!("event {:?} for stale owner {:?} ignored", event.kind, id);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.borrow();
        inner.slots.len() - inner.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for OwnerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerRegistry")
            .field("owners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counter {
        hits: Cell<usize>,
    }

    impl EventTarget for Counter {
        fn handle_event(&self, _event: &Event) {
            self.hits.set(self.hits.get() + 1);
        }
    }

    fn tap() -> Event {
        Event {
            kind: EventKind::Tap,
            source: 1,
        }
    }

    #[test]
    fn dispatch_reaches_live_owner_only() {
        let registry = OwnerRegistry::new();
        let counter = Rc::new(Counter { hits: Cell::new(0) });
        let weak: Weak<dyn EventTarget> = Rc::downgrade(&counter) as Weak<dyn EventTarget>;
        let id = registry.register(weak);

        assert!(registry.dispatch(id, &tap()));
        assert_eq!(counter.hits.get(), 1);

        drop(counter);
        assert!(!registry.dispatch(id, &tap()));
        assert!(!registry.contains(id));
    }

    #[test]
    fn reused_slots_do_not_resolve_old_ids() {
        let registry = OwnerRegistry::new();
        let first = Rc::new(Counter { hits: Cell::new(0) });
        let second = Rc::new(Counter { hits: Cell::new(0) });

        let old = registry.register(Rc::downgrade(&first) as Weak<dyn EventTarget>);
        assert!(registry.unregister(old));
        let new = registry.register(Rc::downgrade(&second) as Weak<dyn EventTarget>);

        assert_ne!(old, new);
        assert!(!registry.dispatch(old, &tap()));
        assert!(registry.dispatch(new, &tap()));
        assert_eq!(first.hits.get(), 0);
        assert_eq!(second.hits.get(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn callbacks_compare_by_identity() {
        let a = Callback::new(|_: &Event| {});
        let b = Callback::new(|_: &Event| {});
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
