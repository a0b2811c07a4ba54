use std::sync::atomic::{AtomicU64, Ordering};

use crate::element::Element;
use crate::event::{Event, EventKind, OwnerId, OwnerRegistry};

pub type NodeId = u64;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

fn next_node_id() -> NodeId {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Materialized result of rendering an [`Element`].
///
/// Every successful render produces a node with a fresh [`NodeId`]; a node is
/// replaced rather than edited when its element changes. The owner is a
/// registry key and is only written when the node enters a cache.
#[derive(Clone, Debug)]
pub struct Node {
    id: NodeId,
    element: Element,
    children: Vec<Node>,
    owner: Option<OwnerId>,
}

impl Node {
    pub fn new(element: Element, children: Vec<Node>) -> Self {
        Self {
            id: next_node_id(),
            element,
            children,
            owner: None,
        }
    }

    /// Materializes `element` and its whole subtree one node per element.
    pub fn from_element(element: &Element) -> Self {
        let children = element.children().iter().map(Node::from_element).collect();
        Self::new(element.clone(), children)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: Option<OwnerId>) {
        self.owner = owner;
    }

    /// Depth-first search for `id` in this subtree.
    pub fn find(&self, id: NodeId) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Routes a gesture that landed on `source` (this node or a descendant).
    ///
    /// The source's own callback runs first, then the event goes to this
    /// node's owner. Returns whether anything handled it.
    pub fn dispatch(&self, source: NodeId, kind: EventKind, owners: &OwnerRegistry) -> bool {
        let Some(target) = self.find(source) else {
            return false;
        };
        let event = Event { kind, source };
        let mut handled = false;
        if let Some(gestures) = target.element.gestures() {
            let callback = match kind {
                EventKind::Tap => gestures.on_tap.as_ref(),
                EventKind::DoubleTap => gestures.on_double_tap.as_ref(),
                EventKind::LongPress => gestures.on_long_press.as_ref(),
            };
            if let Some(callback) = callback {
                callback.call(&event);
                handled = true;
            }
        }
        if let Some(owner) = self.owner {
            handled |= owners.dispatch(owner, &event);
        }
        handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementType;
    use crate::event::Callback;
    use crate::properties::{BaseProperties, GestureProperties, TextProperties};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn from_element_mirrors_the_tree_with_fresh_ids() {
        let element = Element::with_children(
            ElementType::BOX,
            BaseProperties::default(),
            vec![Element::new(ElementType::TEXT, TextProperties::new("a"))],
        );
        let first = Node::from_element(&element);
        let second = Node::from_element(&element);

        assert_eq!(first.children().len(), 1);
        assert_ne!(first.id(), second.id());
        assert_eq!(first.element(), second.element());
        assert!(first.find(first.children()[0].id()).is_some());
        assert!(first.find(second.id()).is_none());
    }

    #[test]
    fn dispatch_invokes_the_source_callback() {
        let taps = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&taps);
        let button = Element::new(
            ElementType::BOX,
            BaseProperties {
                gestures: GestureProperties {
                    on_tap: Some(Callback::new(move |_: &Event| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    })),
                    ..GestureProperties::default()
                },
                ..BaseProperties::default()
            },
        );
        let root = Node::new(
            Element::new(ElementType::BOX, ()),
            vec![Node::from_element(&button)],
        );
        let owners = OwnerRegistry::new();
        let button_id = root.children()[0].id();

        assert!(root.dispatch(button_id, EventKind::Tap, &owners));
        assert!(!root.dispatch(button_id, EventKind::LongPress, &owners));
        assert!(!root.dispatch(root.id(), EventKind::Tap, &owners));
        assert_eq!(taps.load(Ordering::SeqCst), 1);
    }
}
