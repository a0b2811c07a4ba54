use super::*;
use crate::element::ElementType;
use crate::event::EventKind;
use crate::properties::TextProperties;
use crate::runtime::{DefaultScheduler, Runtime};
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq)]
struct CounterState {
    count: u32,
}

#[derive(Clone, Debug, PartialEq)]
struct CounterProperties {
    label: String,
}

fn props(label: &str) -> CounterProperties {
    CounterProperties {
        label: label.to_string(),
    }
}

#[derive(Default)]
struct Counter {
    renders: Rc<Cell<usize>>,
    fail: Rc<Cell<bool>>,
}

impl Component for Counter {
    type State = CounterState;
    type Properties = CounterProperties;

    fn name(&self) -> &'static str {
        "counter"
    }

    fn render(&self, state: &CounterState, properties: &CounterProperties) -> Result<Element, ComponentError> {
        self.renders.set(self.renders.get() + 1);
        if self.fail.get() {
            return Err(ComponentError::UnresolvedTemplate {
                location: "counter.xml".into(),
            });
        }
        Ok(Element::new(
            ElementType::TEXT,
            TextProperties::new(format!("{}: {}", properties.label, state.count)),
        ))
    }

    fn handle_event(&self, event: &Event, state: &mut CounterState, _properties: &CounterProperties) {
        if event.kind == EventKind::Tap {
            state.count += 1;
        }
    }
}

fn text_of(element: &Element) -> String {
    element
        .properties::<TextProperties>()
        .map(|props| props.text().to_string())
        .unwrap_or_default()
}

fn setup() -> (Runtime, ComponentHost<Counter>, Rc<Cell<usize>>) {
    let runtime = Runtime::new(Arc::new(DefaultScheduler));
    let counter = Counter::default();
    let renders = Rc::clone(&counter.renders);
    let host = ComponentHost::new(runtime.handle(), counter, props("taps"));
    host.mount().unwrap();
    (runtime, host, renders)
}

#[test]
fn equal_state_does_not_render() {
    let (runtime, host, renders) = setup();

    assert!(!host.update_state(|state| state.count = 0));
    assert!(!host.set_state(CounterState::default()));

    assert!(!host.is_invalid());
    assert!(!runtime.has_pending_work());
    assert_eq!(runtime.run_until_idle().unwrap(), 0);
    assert_eq!(renders.get(), 1);
}

#[test]
fn state_change_renders_on_drain_and_feeds_the_sink() {
    let (runtime, host, renders) = setup();
    let outputs = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&outputs);
    host.on_rendered(move |element| sink.borrow_mut().push(text_of(element)));

    assert!(host.update_state(|state| state.count = 2));
    assert!(host.is_invalid());
    assert!(runtime.needs_frame());
    assert_eq!(renders.get(), 1, "render waits for the runtime");

    assert_eq!(runtime.process_invalid_components().unwrap(), 1);
    assert_eq!(renders.get(), 2);
    assert_eq!(*outputs.borrow(), vec!["taps: 2".to_string()]);
    assert_eq!(host.rendered().map(|element| text_of(&element)), Some("taps: 2".into()));
    assert!(!host.is_invalid());
}

#[test]
fn repeated_updates_before_a_drain_render_once() {
    let (runtime, host, renders) = setup();

    host.update_state(|state| state.count = 1);
    host.update_state(|state| state.count = 2);
    runtime.run_until_idle().unwrap();

    assert_eq!(renders.get(), 2);
    assert_eq!(host.state().count, 2);
}

#[test]
fn equal_properties_reuse_the_previous_output() {
    let (_runtime, host, renders) = setup();
    let before = host.rendered().unwrap();

    let update = host.update_properties(props("taps")).unwrap();
    assert!(update.is_reused());
    assert!(Element::ptr_eq(update.element(), &before));
    assert_eq!(renders.get(), 1);

    let update = host.update_properties(props("clicks")).unwrap();
    assert!(!update.is_reused());
    assert_eq!(text_of(&update.into_element()), "clicks: 0");
    assert_eq!(renders.get(), 2);
}

#[test]
fn properties_update_settles_a_pending_render() {
    let (runtime, host, renders) = setup();

    host.update_state(|state| state.count = 5);
    let update = host.update_properties(props("hits")).unwrap();
    assert_eq!(text_of(update.element()), "hits: 5");

    assert_eq!(runtime.process_invalid_components().unwrap(), 0);
    assert_eq!(renders.get(), 2);
}

#[test]
fn equal_properties_render_a_pending_state_change() {
    let (runtime, host, renders) = setup();
    let before = host.rendered().unwrap();

    host.update_state(|state| state.count = 5);
    let update = host.update_properties(props("taps")).unwrap();
    assert!(!update.is_reused());
    assert!(!Element::ptr_eq(update.element(), &before));
    assert_eq!(text_of(update.element()), "taps: 5");
    assert!(!host.is_invalid());

    assert_eq!(runtime.process_invalid_components().unwrap(), 0);
    assert_eq!(renders.get(), 2);

    let update = host.update_properties(props("taps")).unwrap();
    assert!(update.is_reused());
    assert_eq!(renders.get(), 2);
}

#[test]
fn render_failure_is_returned_from_the_runtime() {
    let (runtime, host, _renders) = setup();
    host.component().fail.set(true);

    host.update_state(|state| state.count = 1);
    let err = runtime.run_until_idle().unwrap_err();
    assert_eq!(
        err,
        ComponentError::UnresolvedTemplate {
            location: "counter.xml".into()
        }
    );
    assert!(!runtime.handle().has_invalid_components());
}

#[test]
fn invalidate_forces_an_equal_render() {
    let (runtime, host, renders) = setup();
    let before = host.rendered().unwrap();

    host.invalidate();
    runtime.run_until_idle().unwrap();

    let after = host.rendered().unwrap();
    assert_eq!(renders.get(), 2);
    assert_eq!(before, after);
    assert!(!Element::ptr_eq(&before, &after));
}

#[test]
fn events_reach_the_component_through_the_registry() {
    let (runtime, host, _renders) = setup();
    let owners = OwnerRegistry::new();
    let owner = host.register_owner(&owners);

    let tap = Event {
        kind: EventKind::Tap,
        source: 7,
    };
    assert!(owners.dispatch(owner, &tap));
    assert!(owners.dispatch(owner, &tap));
    runtime.run_until_idle().unwrap();
    assert_eq!(host.state().count, 2);
    assert_eq!(host.rendered().map(|element| text_of(&element)), Some("taps: 2".into()));

    let long_press = Event {
        kind: EventKind::LongPress,
        source: 7,
    };
    owners.dispatch(owner, &long_press);
    assert!(!host.is_invalid());

    drop(host);
    assert!(!owners.dispatch(owner, &tap));
}
