//! Stateful components and the re-render state machine that drives them.
//!
//! A component is a pure `render(state, properties)` function plus an event
//! handler. [`ComponentHost`] owns one instance together with its state, its
//! current properties and the last rendered [`Element`]:
//!
//! * a state change that produces an equal state does nothing;
//! * a real state change marks the host invalid with the [`Runtime`], which
//!   re-renders it on the next drain and hands the output to the
//!   [`ComponentHost::on_rendered`] sink;
//! * new properties equal to the current ones reuse the last output as is.
//!
//! [`Runtime`]: crate::Runtime

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::element::Element;
use crate::event::{Event, EventTarget, OwnerId, OwnerRegistry};
use crate::runtime::{ComponentId, Recompose, RuntimeHandle};

/// A render that cannot produce an element. These are configuration
/// mistakes: they are reported to the caller and never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComponentError {
    #[error("template could not be resolved: {location}")]
    UnresolvedTemplate { location: String },
    #[error("component `{component}` produced an invalid element: {reason}")]
    InvalidElement {
        component: &'static str,
        reason: String,
    },
}

pub trait Component: 'static {
    type State: Clone + PartialEq + Default + fmt::Debug + 'static;
    type Properties: Clone + PartialEq + fmt::Debug + 'static;

    fn name(&self) -> &'static str;

    /// Describes the output for `state` and `properties`. Must not have side
    /// effects; it may run any number of times for the same inputs.
    fn render(
        &self,
        state: &Self::State,
        properties: &Self::Properties,
    ) -> Result<Element, ComponentError>;

    /// Reacts to an event routed to this component. Changes made to `state`
    /// go through the usual equality check.
    fn handle_event(&self, _event: &Event, _state: &mut Self::State, _properties: &Self::Properties) {}
}

/// Result of [`ComponentHost::update_properties`].
#[derive(Clone, Debug)]
pub enum Update {
    /// Properties were unchanged; this is the previous output, same identity.
    Reused(Element),
    Rendered(Element),
}

impl Update {
    pub fn element(&self) -> &Element {
        match self {
            Update::Reused(element) | Update::Rendered(element) => element,
        }
    }

    pub fn into_element(self) -> Element {
        match self {
            Update::Reused(element) | Update::Rendered(element) => element,
        }
    }

    pub fn is_reused(&self) -> bool {
        matches!(self, Update::Reused(_))
    }
}

static NEXT_COMPONENT_ID: AtomicUsize = AtomicUsize::new(1);

type RenderSink = Box<dyn FnMut(&Element) + 'static>;

struct ComponentCell<C: Component> {
    this: Weak<Self>,
    id: ComponentId,
    component: C,
    state: RefCell<C::State>,
    properties: RefCell<C::Properties>,
    rendered: RefCell<Option<Element>>,
    render_count: Cell<usize>,
    invalid: Cell<bool>,
    runtime: RuntimeHandle,
    sink: RefCell<Option<RenderSink>>,
}

impl<C: Component> ComponentCell<C> {
    fn render_now(&self) -> Result<Element, ComponentError> {
        let element = {
            let state = self.state.borrow();
            let properties = self.properties.borrow();
            self.component.render(&state, &properties)?
        };
        self.invalid.set(false);
        self.render_count.set(self.render_count.get() + 1);
        *self.rendered.borrow_mut() = Some(element.clone());
        log::debug!(
            "component `{}` rendered {} element(s)",
            self.component.name(),
            element.tree_size()
        );
        Ok(element)
    }

    fn update_state(&self, transform: impl FnOnce(&mut C::State)) -> bool {
        let mut next = self.state.borrow().clone();
        transform(&mut next);
        if next == *self.state.borrow() {
            log::trace!("component `{}` state unchanged", self.component.name());
            return false;
        }
        *self.state.borrow_mut() = next;
        self.invalidate();
        true
    }

    fn deliver(&self, event: &Event) -> bool {
        let properties = self.properties.borrow().clone();
        self.update_state(|state| self.component.handle_event(event, state, &properties))
    }

    fn invalidate(&self) {
        self.invalid.set(true);
        let this: Weak<dyn Recompose> = self.this.clone();
        self.runtime.register_invalid_component(self.id, this);
    }
}

impl<C: Component> Recompose for ComponentCell<C> {
    fn recompose(&self) -> Result<bool, ComponentError> {
        if !self.invalid.get() {
            return Ok(false);
        }
        let element = self.render_now()?;
        // Taken out while it runs so the sink may replace itself.
        let sink = self.sink.borrow_mut().take();
        if let Some(mut sink) = sink {
            sink(&element);
            let mut slot = self.sink.borrow_mut();
            if slot.is_none() {
                *slot = Some(sink);
            }
        }
        Ok(true)
    }
}

impl<C: Component> EventTarget for ComponentCell<C> {
    fn handle_event(&self, event: &Event) {
        self.deliver(event);
    }
}

/// Shared handle to a mounted component. Clones refer to the same instance.
pub struct ComponentHost<C: Component> {
    cell: Rc<ComponentCell<C>>,
}

impl<C: Component> Clone for ComponentHost<C> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<C: Component> ComponentHost<C> {
    pub fn new(runtime: RuntimeHandle, component: C, properties: C::Properties) -> Self {
        Self::with_state(runtime, component, properties, C::State::default())
    }

    pub fn with_state(
        runtime: RuntimeHandle,
        component: C,
        properties: C::Properties,
        state: C::State,
    ) -> Self {
        let cell = Rc::new_cyclic(|this| ComponentCell {
            this: this.clone(),
            id: NEXT_COMPONENT_ID.fetch_add(1, Ordering::Relaxed),
            component,
            state: RefCell::new(state),
            properties: RefCell::new(properties),
            rendered: RefCell::new(None),
            render_count: Cell::new(0),
            invalid: Cell::new(false),
            runtime,
            sink: RefCell::new(None),
        });
        Self { cell }
    }

    pub fn component(&self) -> &C {
        &self.cell.component
    }

    pub fn state(&self) -> C::State {
        self.cell.state.borrow().clone()
    }

    pub fn properties(&self) -> C::Properties {
        self.cell.properties.borrow().clone()
    }

    /// Last committed output, if the component has rendered.
    pub fn rendered(&self) -> Option<Element> {
        self.cell.rendered.borrow().clone()
    }

    pub fn render_count(&self) -> usize {
        self.cell.render_count.get()
    }

    pub fn is_invalid(&self) -> bool {
        self.cell.invalid.get()
    }

    /// Renders with the current state and properties and commits the output.
    pub fn mount(&self) -> Result<Element, ComponentError> {
        self.cell.render_now()
    }

    /// Applies `transform` to a copy of the state. Returns `false`, without
    /// scheduling anything, when the result equals the current state.
    pub fn update_state(&self, transform: impl FnOnce(&mut C::State)) -> bool {
        self.cell.update_state(transform)
    }

    pub fn set_state(&self, state: C::State) -> bool {
        self.update_state(|current| *current = state)
    }

    /// Called by the parent on each of its renders. Equal properties reuse
    /// the last output unless a state change is still waiting to render.
    pub fn update_properties(&self, properties: C::Properties) -> Result<Update, ComponentError> {
        if !self.cell.invalid.get() && *self.cell.properties.borrow() == properties {
            if let Some(element) = self.rendered() {
                log::trace!(
                    "component `{}` properties unchanged, reusing output",
                    self.cell.component.name()
                );
                return Ok(Update::Reused(element));
            }
        }
        *self.cell.properties.borrow_mut() = properties;
        self.cell.render_now().map(Update::Rendered)
    }

    /// Runs the component's event handler. Returns whether the state
    /// changed.
    pub fn handle_event(&self, event: &Event) -> bool {
        self.cell.deliver(event)
    }

    /// Schedules a re-render even though nothing changed.
    pub fn invalidate(&self) {
        self.cell.invalidate();
    }

    /// Receives every output produced by a scheduled re-render.
    pub fn on_rendered(&self, sink: impl FnMut(&Element) + 'static) {
        *self.cell.sink.borrow_mut() = Some(Box::new(sink));
    }

    /// Makes this component addressable as a node owner.
    pub fn register_owner(&self, owners: &OwnerRegistry) -> OwnerId {
        let target: Weak<dyn EventTarget> = Rc::downgrade(&self.cell) as Weak<dyn EventTarget>;
        owners.register(target)
    }
}

impl<C: Component> fmt::Debug for ComponentHost<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHost")
            .field("name", &self.cell.component.name())
            .field("state", &*self.cell.state.borrow())
            .field("properties", &*self.cell.properties.borrow())
            .field("render_count", &self.cell.render_count.get())
            .field("invalid", &self.cell.invalid.get())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/component_tests.rs"]
mod tests;
