use super::*;
use crate::element::ElementType;
use crate::event::{Event, EventTarget, OwnerRegistry};
use crate::node::NodeId;
use crate::properties::TextProperties;
use crate::runtime::DefaultScheduler;

/// Rows of labels; `None` marks a row the source has no element for.
#[derive(Default)]
struct Labels {
    sections: RefCell<Vec<Vec<Option<&'static str>>>>,
}

impl Labels {
    fn new(sections: Vec<Vec<Option<&'static str>>>) -> Rc<Self> {
        Rc::new(Self {
            sections: RefCell::new(sections),
        })
    }
}

impl ListDataSource for Labels {
    fn element(&self, path: IndexPath) -> Option<Element> {
        let label = (*self.sections.borrow().get(path.section)?.get(path.row)?)?;
        Some(Element::new(ElementType::TEXT, TextProperties::new(label)))
    }

    fn total_number_of_sections(&self) -> usize {
        self.sections.borrow().len()
    }

    fn total_number_of_rows(&self, section: usize) -> Option<usize> {
        self.sections.borrow().get(section).map(Vec::len)
    }
}

#[derive(Default)]
struct SyncRenderer {
    calls: Cell<usize>,
    failing: Option<&'static str>,
}

impl Renderer for SyncRenderer {
    fn render(&self, element: Element, _context: &RenderContext, completion: RenderCompletion) {
        self.calls.set(self.calls.get() + 1);
        let text = element
            .properties::<TextProperties>()
            .map(|props| props.text().to_string());
        if self.failing.is_some() && text.as_deref() == self.failing {
            completion.fail(RenderError::Failed("refused".into()));
        } else {
            completion.succeed(Node::from_element(&element));
        }
    }
}

#[derive(Default)]
struct ParkedRenderer {
    parked: RefCell<Vec<(Element, RenderCompletion)>>,
}

impl ParkedRenderer {
    fn parked(&self) -> usize {
        self.parked.borrow().len()
    }

    fn complete_in_reverse(&self) {
        let parked: Vec<_> = self.parked.borrow_mut().drain(..).collect();
        for (element, completion) in parked.into_iter().rev() {
            completion.succeed(Node::from_element(&element));
        }
    }
}

impl Renderer for ParkedRenderer {
    fn render(&self, element: Element, _context: &RenderContext, completion: RenderCompletion) {
        self.parked.borrow_mut().push((element, completion));
    }
}

struct Sink;

impl EventTarget for Sink {
    fn handle_event(&self, _event: &Event) {}
}

fn runtime() -> Runtime {
    Runtime::new(Arc::new(DefaultScheduler))
}

fn text_at(list: &AsyncList, section: usize, row: usize) -> Option<String> {
    list.cached_element_at(IndexPath::new(section, row))
        .and_then(|element| element.properties::<TextProperties>().map(|props| props.text().to_string()))
}

fn flag() -> (Rc<Cell<bool>>, impl FnOnce() + 'static) {
    let fired = Rc::new(Cell::new(false));
    let setter = Rc::clone(&fired);
    (fired, move || setter.set(true))
}

fn paths(items: &[(usize, usize)]) -> Vec<IndexPath> {
    items
        .iter()
        .map(|&(section, row)| IndexPath::new(section, row))
        .collect()
}

#[test]
fn insert_sections_renders_every_row_and_sets_owners() {
    let runtime = runtime();
    let source = Labels::new(vec![vec![Some("a"), Some("b"), Some("c")]]);
    let renderer = Rc::new(SyncRenderer::default());
    let list = AsyncList::new(&runtime, source, renderer.clone());

    let owners = OwnerRegistry::new();
    let sink = Rc::new(Sink);
    let owner = owners.register(Rc::downgrade(&sink) as Weak<dyn EventTarget>);
    list.set_event_target(Some(owner));

    let (fired, completion) = flag();
    list.insert_sections(vec![0], completion);
    assert!(!fired.get());
    assert!(!list.is_idle());

    runtime.run_until_idle().unwrap();
    assert!(fired.get());
    assert!(list.is_idle());
    assert_eq!(renderer.calls.get(), 3);
    assert_eq!(list.cache_shape(), vec![3]);
    assert_eq!(text_at(&list, 0, 2), Some("c".into()));
    for row in 0..3 {
        let node = list.node_at(IndexPath::new(0, row)).unwrap();
        assert_eq!(node.owner(), Some(owner));
    }
}

#[test]
fn reload_data_keeps_owners_and_replaces_nodes() {
    let runtime = runtime();
    let source = Labels::new(vec![vec![Some("a"), Some("b"), Some("c")]]);
    let list = AsyncList::new(&runtime, source, Rc::new(SyncRenderer::default()));
    let owners = OwnerRegistry::new();
    let sink = Rc::new(Sink);
    let owner = owners.register(Rc::downgrade(&sink) as Weak<dyn EventTarget>);
    list.set_event_target(Some(owner));

    list.insert_sections(vec![0], || {});
    runtime.run_until_idle().unwrap();
    let before: Vec<NodeId> = (0..3)
        .map(|row| list.node_at(IndexPath::new(0, row)).unwrap().id())
        .collect();

    list.reload_data(|| {});
    runtime.run_until_idle().unwrap();

    assert_eq!(list.cache_shape(), vec![3]);
    for (row, old_id) in before.into_iter().enumerate() {
        let node = list.node_at(IndexPath::new(0, row)).unwrap();
        assert_ne!(node.id(), old_id);
        assert_eq!(node.owner(), Some(owner));
    }
}

#[test]
fn next_operation_waits_for_outstanding_renders() {
    let runtime = runtime();
    let source = Labels::new(vec![vec![Some("a"), Some("b")]]);
    let renderer = Rc::new(ParkedRenderer::default());
    let list = AsyncList::new(&runtime, source, renderer.clone());
    let order = Rc::new(RefCell::new(Vec::new()));

    let log = Rc::clone(&order);
    list.insert_items(paths(&[(0, 0), (0, 1)]), move || log.borrow_mut().push("insert"));
    let log = Rc::clone(&order);
    list.delete_items(paths(&[(0, 0)]), move || log.borrow_mut().push("delete"));

    runtime.run_until_idle().unwrap();
    assert_eq!(renderer.parked(), 2);
    assert!(order.borrow().is_empty());
    assert_eq!(list.pending_operations(), 1);
    assert_eq!(list.section_count(), 0, "cache untouched while renders are out");

    renderer.complete_in_reverse();
    runtime.run_until_idle().unwrap();

    assert_eq!(*order.borrow(), vec!["insert", "delete"]);
    assert_eq!(list.cache_shape(), vec![1]);
    assert_eq!(text_at(&list, 0, 0), Some("b".into()));
}

#[test]
fn out_of_order_outcomes_land_in_their_own_slots() {
    let runtime = runtime();
    let source = Labels::new(vec![vec![Some("a"), Some("b"), Some("c")]]);
    let renderer = Rc::new(ParkedRenderer::default());
    let list = AsyncList::new(&runtime, source, renderer.clone());

    list.reload_data(|| {});
    renderer.complete_in_reverse();
    runtime.run_until_idle().unwrap();

    assert_eq!(
        (0..3).map(|row| text_at(&list, 0, row)).collect::<Vec<_>>(),
        vec![Some("a".into()), Some("b".into()), Some("c".into())]
    );
}

#[test]
fn empty_sets_finish_without_rendering() {
    let runtime = runtime();
    let renderer = Rc::new(SyncRenderer::default());
    let list = AsyncList::new(&runtime, Labels::new(vec![]), renderer.clone());

    let (inserted, completion) = flag();
    list.insert_items(Vec::new(), completion);
    let (reloaded, completion) = flag();
    list.reload_sections(Vec::new(), completion);
    runtime.run_until_idle().unwrap();

    assert!(inserted.get());
    assert!(reloaded.get());
    assert_eq!(renderer.calls.get(), 0);
    assert!(list.is_idle());
}

#[test]
fn reload_data_matches_reported_counts_including_empty_sections() {
    let runtime = runtime();
    let source = Labels::new(vec![vec![Some("a")], vec![], vec![Some("b"), Some("c")]]);
    let list = AsyncList::new(&runtime, source.clone(), Rc::new(SyncRenderer::default()));

    list.reload_data(|| {});
    runtime.run_until_idle().unwrap();
    assert_eq!(list.cache_shape(), vec![1, 0, 2]);

    *source.sections.borrow_mut() = vec![vec![], vec![]];
    list.reload_data(|| {});
    runtime.run_until_idle().unwrap();
    assert_eq!(list.cache_shape(), vec![0, 0]);
}

#[test]
fn missing_elements_and_failed_renders_leave_empty_slots() {
    let runtime = runtime();
    let source = Labels::new(vec![vec![Some("a"), None, Some("bad")]]);
    let renderer = Rc::new(SyncRenderer {
        failing: Some("bad"),
        ..SyncRenderer::default()
    });
    let list = AsyncList::new(&runtime, source, renderer.clone());

    let (fired, completion) = flag();
    list.insert_sections(vec![0], completion);
    runtime.run_until_idle().unwrap();

    assert!(fired.get());
    assert_eq!(renderer.calls.get(), 2);
    assert_eq!(list.cache_shape(), vec![3]);
    assert!(list.node_at(IndexPath::new(0, 0)).is_some());
    assert!(list.node_at(IndexPath::new(0, 1)).is_none());
    assert!(list.node_at(IndexPath::new(0, 2)).is_none());
}

#[test]
fn dropped_render_completions_do_not_stall_the_list() {
    struct Forgetful;
    impl Renderer for Forgetful {
        fn render(&self, _element: Element, _context: &RenderContext, _completion: RenderCompletion) {}
    }

    let runtime = runtime();
    let list = AsyncList::new(&runtime, Labels::new(vec![vec![Some("a")]]), Rc::new(Forgetful));
    let (fired, completion) = flag();
    list.reload_data(completion);
    runtime.run_until_idle().unwrap();

    assert!(fired.get());
    assert_eq!(list.cache_shape(), vec![1]);
    assert!(list.node_at(IndexPath::new(0, 0)).is_none());
}

#[test]
fn insert_then_delete_restores_the_shape() {
    let runtime = runtime();
    let source = Labels::new(vec![vec![Some("x"), Some("n"), Some("y"), Some("n"), Some("z")]]);
    let list = AsyncList::new(&runtime, source, Rc::new(SyncRenderer::default()));
    list.insert_items(paths(&[(0, 0), (0, 1), (0, 2)]), || {});
    runtime.run_until_idle().unwrap();
    let before = list.cache_shape();

    let inserted = paths(&[(0, 3), (0, 1)]);
    list.insert_items(inserted.clone(), || {});
    list.delete_items(inserted, || {});
    runtime.run_until_idle().unwrap();

    assert_eq!(list.cache_shape(), before);
    assert_eq!(text_at(&list, 0, 0), Some("x".into()));
    assert_eq!(text_at(&list, 0, 1), Some("n".into()));
    assert_eq!(text_at(&list, 0, 2), Some("y".into()));
}

#[test]
fn moving_an_item_onto_itself_changes_nothing() {
    let runtime = runtime();
    let source = Labels::new(vec![vec![Some("a"), Some("b")]]);
    let list = AsyncList::new(&runtime, source, Rc::new(SyncRenderer::default()));
    list.reload_data(|| {});
    runtime.run_until_idle().unwrap();
    let ids: Vec<NodeId> = list.with_cache(|cache| cache.nodes().map(|(_, node)| node.id()).collect());

    let (fired, completion) = flag();
    list.move_item(IndexPath::new(0, 1), IndexPath::new(0, 1), completion);
    runtime.run_until_idle().unwrap();

    assert!(fired.get());
    assert_eq!(
        list.with_cache(|cache| cache.nodes().map(|(_, node)| node.id()).collect::<Vec<_>>()),
        ids
    );
}

#[test]
fn moves_and_section_deletes_keep_nodes() {
    let runtime = runtime();
    let source = Labels::new(vec![vec![Some("a"), Some("b")], vec![Some("c")]]);
    let list = AsyncList::new(&runtime, source, Rc::new(SyncRenderer::default()));
    list.reload_data(|| {});
    runtime.run_until_idle().unwrap();
    let moved = list.node_at(IndexPath::new(0, 0)).unwrap().id();

    list.move_item(IndexPath::new(0, 0), IndexPath::new(1, 1), || {});
    list.move_section(1, 0, || {});
    list.delete_sections(vec![1], || {});
    runtime.run_until_idle().unwrap();

    assert_eq!(list.cache_shape(), vec![2]);
    assert_eq!(list.node_at(IndexPath::new(0, 1)).map(|node| node.id()), Some(moved));
    assert_eq!(text_at(&list, 0, 0), Some("c".into()));
}

#[test]
fn reload_sections_resizes_to_the_source() {
    let runtime = runtime();
    let source = Labels::new(vec![vec![Some("a")], vec![Some("b")]]);
    let list = AsyncList::new(&runtime, source.clone(), Rc::new(SyncRenderer::default()));
    list.reload_data(|| {});
    runtime.run_until_idle().unwrap();

    source.sections.borrow_mut()[1] = vec![Some("b"), Some("c"), Some("d")];
    list.reload_sections(vec![1], || {});
    runtime.run_until_idle().unwrap();

    assert_eq!(list.cache_shape(), vec![1, 3]);
    assert_eq!(text_at(&list, 1, 2), Some("d".into()));
}

#[test]
fn reload_items_overwrites_in_place() {
    let runtime = runtime();
    let source = Labels::new(vec![vec![Some("a"), Some("b")]]);
    let list = AsyncList::new(&runtime, source.clone(), Rc::new(SyncRenderer::default()));
    list.reload_data(|| {});
    runtime.run_until_idle().unwrap();
    let untouched = list.node_at(IndexPath::new(0, 0)).unwrap().id();

    source.sections.borrow_mut()[0][1] = Some("B");
    assert_eq!(text_at(&list, 0, 1), Some("b".into()), "cache keeps what it rendered");
    list.reload_items(paths(&[(0, 1)]), || {});
    runtime.run_until_idle().unwrap();

    assert_eq!(list.cache_shape(), vec![2]);
    assert_eq!(text_at(&list, 0, 1), Some("B".into()));
    assert_eq!(list.node_at(IndexPath::new(0, 0)).unwrap().id(), untouched);
}

#[test]
fn reads_during_a_reload_see_the_previous_nodes() {
    let runtime = runtime();
    let source = Labels::new(vec![vec![Some("a")]]);
    let renderer = Rc::new(ParkedRenderer::default());
    let list = AsyncList::new(&runtime, source.clone(), renderer.clone());
    list.reload_data(|| {});
    renderer.complete_in_reverse();
    runtime.run_until_idle().unwrap();

    source.sections.borrow_mut()[0][0] = Some("a2");
    list.reload_data(|| {});
    runtime.run_until_idle().unwrap();
    assert_eq!(text_at(&list, 0, 0), Some("a".into()));

    renderer.complete_in_reverse();
    runtime.run_until_idle().unwrap();
    assert_eq!(text_at(&list, 0, 0), Some("a2".into()));
}

#[test]
#[should_panic(expected = "delete_items: row 4 out of range")]
fn deleting_outside_the_shape_panics() {
    let runtime = runtime();
    let list = AsyncList::new(&runtime, Labels::new(vec![vec![Some("a")]]), Rc::new(SyncRenderer::default()));
    list.reload_data(|| {});
    runtime.run_until_idle().unwrap();

    list.delete_items(paths(&[(0, 4)]), || {});
}

#[test]
fn try_node_at_reports_range_errors() {
    let runtime = runtime();
    let list = AsyncList::new(&runtime, Labels::new(vec![]), Rc::new(SyncRenderer::default()));
    assert!(matches!(
        list.try_node_at(IndexPath::new(0, 0)),
        Err(NodeCacheError::SectionOutOfRange { section: 0, sections: 0 })
    ));
}
