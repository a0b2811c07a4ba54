use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use templatekit_core::{
    AsyncList, BaseProperties, ComponentError, Element, ElementType, IndexPath, ListDataSource,
    Node, NodeCache, OwnerRegistry, RenderCompletion, RenderContext, RenderError, Renderer,
    Runtime, RuntimeScheduler, TextProperties,
};

/// A text element keyed by its label.
pub fn text_element(label: &str) -> Element {
    Element::new(
        ElementType::TEXT,
        TextProperties {
            base: BaseProperties::keyed(label),
            ..TextProperties::new(label)
        },
    )
}

/// The text of an element built by [`text_element`].
pub fn text_of(element: &Element) -> Option<String> {
    element
        .properties::<TextProperties>()
        .map(|props| props.text().to_string())
}

/// Text of every slot in `cache`, section by section. Empty slots are `None`.
pub fn cache_labels(cache: &NodeCache) -> Vec<Vec<Option<String>>> {
    let mut labels: Vec<Vec<Option<String>>> =
        cache.shape().into_iter().map(|rows| vec![None; rows]).collect();
    for (path, node) in cache.nodes() {
        labels[path.section][path.row] = text_of(node.element());
    }
    labels
}

/// In-memory list contents. Clones share the same rows, so a test can keep
/// editing the source after handing it to a list.
#[derive(Clone, Default)]
pub struct FakeDataSource {
    sections: Rc<RefCell<Vec<Vec<Option<Element>>>>>,
}

impl FakeDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// One section per entry, rows labelled `"{section}:{row}"`.
    pub fn with_shape(shape: &[usize]) -> Self {
        let source = Self::new();
        for (section, &rows) in shape.iter().enumerate() {
            let labels: Vec<String> = (0..rows).map(|row| format!("{section}:{row}")).collect();
            source.push_section(labels.iter().map(String::as_str));
        }
        source
    }

    pub fn from_labels(sections: Vec<Vec<&str>>) -> Self {
        let source = Self::new();
        for labels in sections {
            source.push_section(labels);
        }
        source
    }

    pub fn push_section<'a>(&self, labels: impl IntoIterator<Item = &'a str>) {
        let rows = labels.into_iter().map(|label| Some(text_element(label))).collect();
        self.sections.borrow_mut().push(rows);
    }

    pub fn insert_section<'a>(&self, section: usize, labels: impl IntoIterator<Item = &'a str>) {
        let rows = labels.into_iter().map(|label| Some(text_element(label))).collect();
        self.sections.borrow_mut().insert(section, rows);
    }

    pub fn remove_section(&self, section: usize) {
        self.sections.borrow_mut().remove(section);
    }

    pub fn insert_row(&self, path: IndexPath, label: &str) {
        self.sections.borrow_mut()[path.section].insert(path.row, Some(text_element(label)));
    }

    pub fn remove_row(&self, path: IndexPath) {
        self.sections.borrow_mut()[path.section].remove(path.row);
    }

    pub fn set_label(&self, path: IndexPath, label: &str) {
        self.sections.borrow_mut()[path.section][path.row] = Some(text_element(label));
    }

    /// Keeps the row but makes the source report no element for it.
    pub fn clear_element(&self, path: IndexPath) {
        self.sections.borrow_mut()[path.section][path.row] = None;
    }

    pub fn shape(&self) -> Vec<usize> {
        self.sections.borrow().iter().map(Vec::len).collect()
    }
}

impl ListDataSource for FakeDataSource {
    fn element(&self, path: IndexPath) -> Option<Element> {
        self.sections
            .borrow()
            .get(path.section)?
            .get(path.row)?
            .clone()
    }

    fn total_number_of_sections(&self) -> usize {
        self.sections.borrow().len()
    }

    fn total_number_of_rows(&self, section: usize) -> Option<usize> {
        self.sections.borrow().get(section).map(Vec::len)
    }
}

/// Completes every render before returning. Elements whose key was passed
/// to [`ImmediateRenderer::fail_key`] fail instead.
#[derive(Default)]
pub struct ImmediateRenderer {
    rendered: RefCell<Vec<Element>>,
    contexts: RefCell<Vec<RenderContext>>,
    failing: RefCell<HashSet<String>>,
}

impl ImmediateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_key(&self, key: &str) {
        self.failing.borrow_mut().insert(key.to_string());
    }

    pub fn render_count(&self) -> usize {
        self.rendered.borrow().len()
    }

    /// Labels of the rendered elements in call order.
    pub fn rendered_labels(&self) -> Vec<String> {
        self.rendered.borrow().iter().filter_map(text_of).collect()
    }

    pub fn last_context(&self) -> Option<RenderContext> {
        self.contexts.borrow().last().cloned()
    }
}

impl Renderer for ImmediateRenderer {
    fn render(&self, element: Element, context: &RenderContext, completion: RenderCompletion) {
        self.rendered.borrow_mut().push(element.clone());
        self.contexts.borrow_mut().push(context.clone());
        let fails = element
            .key()
            .is_some_and(|key| self.failing.borrow().contains(key));
        if fails {
            completion.fail(RenderError::Failed(format!("{:?} refused", element.key())));
        } else {
            completion.succeed(Node::from_element(&element));
        }
    }
}

/// Holds every render until the test decides how it ends, to model
/// asynchronous work finishing late and out of order.
#[derive(Default)]
pub struct DeferredRenderer {
    parked: RefCell<Vec<(Element, RenderCompletion)>>,
    issued: Cell<usize>,
}

impl DeferredRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.parked.borrow().len()
    }

    pub fn issued(&self) -> usize {
        self.issued.get()
    }

    pub fn pending_labels(&self) -> Vec<String> {
        self.parked
            .borrow()
            .iter()
            .filter_map(|(element, _)| text_of(element))
            .collect()
    }

    fn take(&self) -> Vec<(Element, RenderCompletion)> {
        self.parked.borrow_mut().drain(..).collect()
    }

    pub fn complete_all(&self) -> usize {
        let parked = self.take();
        let count = parked.len();
        for (element, completion) in parked {
            completion.succeed(Node::from_element(&element));
        }
        count
    }

    pub fn complete_in_reverse(&self) -> usize {
        let parked = self.take();
        let count = parked.len();
        for (element, completion) in parked.into_iter().rev() {
            completion.succeed(Node::from_element(&element));
        }
        count
    }

    /// Completes the renders whose element matches `predicate`; the rest
    /// stay pending.
    pub fn complete_where(&self, predicate: impl Fn(&Element) -> bool) -> usize {
        let (matching, rest): (Vec<_>, Vec<_>) = self
            .take()
            .into_iter()
            .partition(|(element, _)| predicate(element));
        *self.parked.borrow_mut() = rest;
        let count = matching.len();
        for (element, completion) in matching {
            completion.succeed(Node::from_element(&element));
        }
        count
    }

    pub fn fail_all(&self, reason: &str) -> usize {
        let parked = self.take();
        let count = parked.len();
        for (_, completion) in parked {
            completion.fail(RenderError::Failed(reason.to_string()));
        }
        count
    }

    /// Drops every pending completion without an outcome.
    pub fn abandon_all(&self) -> usize {
        let parked = self.take();
        let count = parked.len();
        drop(parked);
        count
    }
}

impl Renderer for DeferredRenderer {
    fn render(&self, element: Element, _context: &RenderContext, completion: RenderCompletion) {
        self.issued.set(self.issued.get() + 1);
        self.parked.borrow_mut().push((element, completion));
    }
}

/// Scheduler that only counts frame requests.
#[derive(Default)]
pub struct CountingScheduler {
    frames: AtomicUsize,
}

impl CountingScheduler {
    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }
}

impl RuntimeScheduler for CountingScheduler {
    fn schedule_frame(&self) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }
}

/// Headless harness wiring an [`AsyncList`] to a [`FakeDataSource`] and a
/// renderer on a private [`Runtime`].
///
/// Nothing is applied until the harness is pumped, which mirrors a UI thread
/// that only gets to the list's results between frames.
pub struct ListHarness<R: Renderer + 'static> {
    runtime: Runtime,
    scheduler: Arc<CountingScheduler>,
    source: FakeDataSource,
    renderer: Rc<R>,
    owners: OwnerRegistry,
    list: AsyncList,
}

impl<R: Renderer + 'static> ListHarness<R> {
    pub fn new(source: FakeDataSource, renderer: R) -> Self {
        let scheduler = Arc::new(CountingScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        let renderer = Rc::new(renderer);
        let list = AsyncList::new(&runtime, Rc::new(source.clone()), renderer.clone());
        Self {
            runtime,
            scheduler,
            source,
            renderer,
            owners: OwnerRegistry::new(),
            list,
        }
    }

    pub fn list(&self) -> &AsyncList {
        &self.list
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn scheduler(&self) -> &CountingScheduler {
        &self.scheduler
    }

    pub fn source(&self) -> &FakeDataSource {
        &self.source
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn owners(&self) -> &OwnerRegistry {
        &self.owners
    }

    /// Drive the runtime until there are no tasks, outcomes or component
    /// renders left to apply.
    pub fn pump_until_idle(&self) -> Result<usize, ComponentError> {
        self.runtime.run_until_idle()
    }

    /// Text of every cached slot; empty slots are `None`.
    pub fn labels(&self) -> Vec<Vec<Option<String>>> {
        self.list.with_cache(cache_labels)
    }
}

impl ListHarness<ImmediateRenderer> {
    pub fn immediate(source: FakeDataSource) -> Self {
        Self::new(source, ImmediateRenderer::new())
    }
}

impl ListHarness<DeferredRenderer> {
    pub fn deferred(source: FakeDataSource) -> Self {
        Self::new(source, DeferredRenderer::new())
    }
}
