//! Immutable element trees produced by component renders.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::properties::{BaseProperties, GestureProperties};

/// A property set an element can carry.
///
/// Implementors are plain values; equality is supplied separately through
/// `PartialEq` so elements can be compared without knowing their concrete
/// property types.
pub trait Properties: Any + fmt::Debug + Send + Sync {
    /// Common view properties, when this set embeds them.
    fn base(&self) -> Option<&BaseProperties> {
        None
    }
}

impl Properties for () {}

trait DynProperties: Properties {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn DynProperties) -> bool;
}

impl<T: Properties + PartialEq> DynProperties for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn DynProperties) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .map(|other| self == other)
            .unwrap_or(false)
    }
}

/// What an element materializes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// A native view kind, resolved by the renderer.
    View(&'static str),
    /// A composite component, identified by name.
    Component(&'static str),
}

impl ElementType {
    pub const BOX: ElementType = ElementType::View("box");
    pub const TEXT: ElementType = ElementType::View("text");
    pub const IMAGE: ElementType = ElementType::View("image");

    pub fn name(&self) -> &'static str {
        match self {
            ElementType::View(name) | ElementType::Component(name) => name,
        }
    }
}

struct ElementInner {
    element_type: ElementType,
    properties: Box<dyn DynProperties>,
    children: Vec<Element>,
}

/// Description of desired render output: a type, its properties and its
/// ordered children.
///
/// Elements are never mutated after construction. Clones share storage, so
/// [`Element::ptr_eq`] tells whether two values are the same render output
/// while `==` compares them structurally.
#[derive(Clone)]
pub struct Element {
    inner: Arc<ElementInner>,
}

impl Element {
    pub fn new<P: Properties + PartialEq>(element_type: ElementType, properties: P) -> Self {
        Self::with_children(element_type, properties, Vec::new())
    }

    pub fn with_children<P: Properties + PartialEq>(
        element_type: ElementType,
        properties: P,
        children: Vec<Element>,
    ) -> Self {
        Self {
            inner: Arc::new(ElementInner {
                element_type,
                properties: Box::new(properties),
                children,
            }),
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.inner.element_type
    }

    pub fn children(&self) -> &[Element] {
        &self.inner.children
    }

    /// Returns the properties when they are of type `P`.
    pub fn properties<P: Properties>(&self) -> Option<&P> {
        self.inner.properties.as_any().downcast_ref::<P>()
    }

    pub fn base(&self) -> Option<&BaseProperties> {
        self.inner.properties.base()
    }

    pub fn gestures(&self) -> Option<&GestureProperties> {
        self.base().map(|base| &base.gestures)
    }

    pub fn key(&self) -> Option<&str> {
        self.base().and_then(|base| base.key.as_deref())
    }

    /// Number of elements in this tree, including `self`.
    pub fn tree_size(&self) -> usize {
        1 + self.children().iter().map(Element::tree_size).sum::<usize>()
    }

    pub fn ptr_eq(a: &Element, b: &Element) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        if Element::ptr_eq(self, other) {
            return true;
        }
        self.inner.element_type == other.inner.element_type
            && self
                .inner
                .properties
                .dyn_eq(&*other.inner.properties)
            && self.inner.children == other.inner.children
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Element");
        debug
            .field("type", &self.inner.element_type)
            .field("properties", &self.inner.properties);
        if !self.inner.children.is_empty() {
            debug.field("children", &self.inner.children);
        }
        debug.finish()
    }
}
