//! Asynchronous list controller.
//!
//! [`AsyncList`] keeps a [`NodeCache`] in step with a [`ListDataSource`].
//! Every mutation becomes exactly one entry on an [`OperationQueue`], so
//! mutations apply in call order even though their renders finish out of
//! order on other threads. A batch of renders is tracked by a pending count;
//! the cache changes once, when the last outcome for the batch arrives.
//!
//! Render outcomes travel through a mailbox that the [`Runtime`] polls on
//! the UI thread, so the cache and user completions are only ever touched
//! there.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::{Arc, Mutex, PoisonError};

use crate::collections::HashMap;
use crate::element::Element;
use crate::event::OwnerId;
use crate::node::Node;
use crate::node_cache::{IndexPath, NodeCache, NodeCacheError};
use crate::queue::{Done, OperationQueue};
use crate::renderer::{RenderCompletion, RenderContext, RenderError, RenderOutcome, Renderer};
use crate::runtime::{Runtime, RuntimeHandle, UiSource, UiWaker};

/// Host-side view of the list contents.
pub trait ListDataSource {
    /// Element to render at `path`, or `None` when there is nothing there.
    fn element(&self, path: IndexPath) -> Option<Element>;

    fn total_number_of_sections(&self) -> usize;

    /// Row count of `section`, or `None` when the section does not exist.
    fn total_number_of_rows(&self, section: usize) -> Option<usize>;
}

type BatchId = u64;
type Completion = Box<dyn FnOnce() + 'static>;

struct Delivery {
    batch: BatchId,
    index: usize,
    outcome: RenderOutcome,
}

struct Mailbox {
    deliveries: Mutex<Vec<Delivery>>,
    waker: UiWaker,
}

impl Mailbox {
    fn post(&self, delivery: Delivery) {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(delivery);
        self.waker.wake();
    }

    fn take(&self) -> Vec<Delivery> {
        std::mem::take(&mut *self.deliveries.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Where the nodes of a finished batch go. Node order always follows the
/// batch's sorted paths.
#[derive(Debug)]
enum Placement {
    InsertRows,
    OverwriteRows,
    /// `(section, rows)` pairs in ascending section order.
    InsertSections(Vec<(usize, usize)>),
    ReplaceSections(Vec<(usize, usize)>),
    /// Clears the cache and lays out one section per entry.
    Rebuild(Vec<usize>),
}

struct Batch {
    operation: &'static str,
    pending: usize,
    paths: Vec<IndexPath>,
    nodes: Vec<Option<Node>>,
    placement: Placement,
    completion: Completion,
    done: Done,
}

struct ListInner {
    queue: OperationQueue,
    source: Rc<dyn ListDataSource>,
    renderer: Rc<dyn Renderer>,
    runtime: RuntimeHandle,
    cache: RefCell<NodeCache>,
    context: RefCell<RenderContext>,
    event_target: Cell<Option<OwnerId>>,
    mailbox: Arc<Mailbox>,
    batches: RefCell<HashMap<BatchId, Batch>>,
    next_batch: Cell<BatchId>,
}

fn fail_fast<T>(operation: &str, result: Result<T, NodeCacheError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("{operation}: {err}"),
    }
}

fn rows_in(source: &dyn ListDataSource, section: usize) -> usize {
    source.total_number_of_rows(section).unwrap_or(0)
}

fn section_paths(sections: &[(usize, usize)]) -> Vec<IndexPath> {
    sections
        .iter()
        .flat_map(|&(section, rows)| (0..rows).map(move |row| IndexPath::new(section, row)))
        .collect()
}

fn sorted<T: Ord>(mut items: Vec<T>) -> Vec<T> {
    items.sort_unstable();
    items.dedup();
    items
}

impl ListInner {
    fn render_batch(
        &self,
        operation: &'static str,
        paths: Vec<IndexPath>,
        placement: Placement,
        completion: Completion,
        done: Done,
    ) {
        let count = paths.len();
        let batch = Batch {
            operation,
            pending: count,
            nodes: vec![None; count],
            paths: paths.clone(),
            placement,
            completion,
            done,
        };
        if count == 0 {
            log::debug!("{operation}: nothing to render");
            self.commit(batch);
            return;
        }

        let id = self.next_batch.get();
        self.next_batch.set(id + 1);
        self.batches.borrow_mut().insert(id, batch);
        log::debug!("{operation}: rendering {count} node(s) as batch {id}");

        let context = self
            .context
            .borrow()
            .clone()
            .with_event_target(self.event_target.get());
        for (index, path) in paths.into_iter().enumerate() {
            let mailbox = Arc::clone(&self.mailbox);
            let completion = RenderCompletion::new(move |outcome| {
                mailbox.post(Delivery {
                    batch: id,
                    index,
                    outcome,
                });
            });
            match self.source.element(path) {
                Some(element) => self.renderer.render(element, &context, completion),
                None => completion.fail(RenderError::MissingElement(path)),
            }
        }
    }

    fn resolve(&self, delivery: Delivery) {
        let finished = {
            let mut batches = self.batches.borrow_mut();
            let Some(batch) = batches.get_mut(&delivery.batch) else {
                log::warn!("render outcome for unknown batch {} dropped", delivery.batch);
                return;
            };
            match delivery.outcome {
                Ok(node) => batch.nodes[delivery.index] = Some(node),
                Err(err) => log::warn!(
                    "{}: no node for {}: {err}",
                    batch.operation,
                    batch.paths[delivery.index]
                ),
            }
            batch.pending -= 1;
            if batch.pending == 0 {
                batches.remove(&delivery.batch)
            } else {
                None
            }
        };
        if let Some(batch) = finished {
            self.commit(batch);
        }
    }

    fn commit(&self, batch: Batch) {
        let Batch {
            operation,
            paths,
            mut nodes,
            placement,
            completion,
            done,
            ..
        } = batch;
        let owner = self.event_target.get();
        for node in nodes.iter_mut().flatten() {
            node.set_owner(owner);
        }

        {
            let mut cache = self.cache.borrow_mut();
            match placement {
                Placement::InsertRows => {
                    for (path, node) in paths.into_iter().zip(nodes) {
                        log::trace!("{operation}: caching node at {path}");
                        cache.insert_row(path, node);
                    }
                }
                Placement::OverwriteRows => {
                    for (path, node) in paths.into_iter().zip(nodes) {
                        log::trace!("{operation}: caching node at {path}");
                        cache.set(path, node);
                    }
                }
                Placement::InsertSections(sections) => {
                    let mut nodes = nodes.into_iter();
                    for (section, rows) in sections {
                        cache.insert_section(section, nodes.by_ref().take(rows).collect());
                    }
                }
                Placement::ReplaceSections(sections) => {
                    let mut nodes = nodes.into_iter();
                    for (section, rows) in sections {
                        cache.replace_section(section, nodes.by_ref().take(rows).collect());
                    }
                }
                Placement::Rebuild(shape) => {
                    cache.clear();
                    let mut nodes = nodes.into_iter();
                    for (section, rows) in shape.into_iter().enumerate() {
                        cache.insert_section(section, nodes.by_ref().take(rows).collect());
                    }
                }
            }
        }
        log::debug!("{operation}: cache updated");
        self.finish(completion, done);
    }

    /// Runs the user completion on the UI thread, then lets the next
    /// operation in.
    fn finish(&self, completion: Completion, done: Done) {
        self.runtime.spawn_task(Box::new(move || {
            completion();
            done.complete();
        }));
    }
}

impl UiSource for ListInner {
    fn poll(&self) -> usize {
        let deliveries = self.mailbox.take();
        let count = deliveries.len();
        for delivery in deliveries {
            self.resolve(delivery);
        }
        count
    }
}

/// A sectioned list whose nodes are rendered asynchronously and applied in
/// strict call order.
///
/// Mutations return immediately. Each takes a completion that runs on the UI
/// thread once the cache reflects the mutation and before the next mutation
/// starts. Index paths outside the cache's current shape are programming
/// errors and panic with the [`NodeCacheError`] describing them.
#[derive(Clone)]
pub struct AsyncList {
    inner: Rc<ListInner>,
}

impl AsyncList {
    pub fn new(runtime: &Runtime, source: Rc<dyn ListDataSource>, renderer: Rc<dyn Renderer>) -> Self {
        let inner = Rc::new(ListInner {
            queue: OperationQueue::new(),
            source,
            renderer,
            runtime: runtime.handle(),
            cache: RefCell::new(NodeCache::new()),
            context: RefCell::new(RenderContext::default()),
            event_target: Cell::new(None),
            mailbox: Arc::new(Mailbox {
                deliveries: Mutex::new(Vec::new()),
                waker: runtime.waker(),
            }),
            batches: RefCell::new(HashMap::new()),
            next_batch: Cell::new(0),
        });
        let weak: Weak<dyn UiSource> = Rc::downgrade(&inner) as Weak<dyn UiSource>;
        runtime.handle().register_source(weak);
        Self { inner }
    }

    fn enqueue(&self, operation: &'static str, body: impl FnOnce(&ListInner, Done) + 'static) {
        let list = Rc::downgrade(&self.inner);
        self.inner.queue.enqueue(move |done| match list.upgrade() {
            Some(list) => body(&list, done),
            None => {
                log::debug!("{operation}: list dropped before the operation ran");
                done.complete();
            }
        });
    }

    /// Renders the elements at `paths` and inserts them, shifting later rows
    /// down. Paths are applied in ascending order, each against the shape
    /// left by the previous one.
    pub fn insert_items(&self, paths: Vec<IndexPath>, completion: impl FnOnce() + 'static) {
        self.enqueue("insert_items", move |list, done| {
            list.render_batch(
                "insert_items",
                sorted(paths),
                Placement::InsertRows,
                Box::new(completion),
                done,
            );
        });
    }

    /// Removes the slots at `paths`. All paths refer to the shape before the
    /// deletion.
    pub fn delete_items(&self, paths: Vec<IndexPath>, completion: impl FnOnce() + 'static) {
        self.enqueue("delete_items", move |list, done| {
            {
                let mut cache = list.cache.borrow_mut();
                for path in sorted(paths).into_iter().rev() {
                    fail_fast("delete_items", cache.remove_row(path));
                }
            }
            list.finish(Box::new(completion), done);
        });
    }

    /// Inserts whole sections, rendering every row the source reports for
    /// them.
    pub fn insert_sections(&self, sections: Vec<usize>, completion: impl FnOnce() + 'static) {
        self.enqueue("insert_sections", move |list, done| {
            let sections: Vec<(usize, usize)> = sorted(sections)
                .into_iter()
                .map(|section| (section, rows_in(&*list.source, section)))
                .collect();
            list.render_batch(
                "insert_sections",
                section_paths(&sections),
                Placement::InsertSections(sections),
                Box::new(completion),
                done,
            );
        });
    }

    pub fn delete_sections(&self, sections: Vec<usize>, completion: impl FnOnce() + 'static) {
        self.enqueue("delete_sections", move |list, done| {
            {
                let mut cache = list.cache.borrow_mut();
                for section in sorted(sections).into_iter().rev() {
                    fail_fast("delete_sections", cache.remove_section(section));
                }
            }
            list.finish(Box::new(completion), done);
        });
    }

    /// Moves the node at `from` to `to` without rendering. `to` addresses the
    /// list after the node has been taken out.
    pub fn move_item(&self, from: IndexPath, to: IndexPath, completion: impl FnOnce() + 'static) {
        self.enqueue("move_item", move |list, done| {
            fail_fast("move_item", list.cache.borrow_mut().move_row(from, to));
            list.finish(Box::new(completion), done);
        });
    }

    pub fn move_section(&self, from: usize, to: usize, completion: impl FnOnce() + 'static) {
        self.enqueue("move_section", move |list, done| {
            fail_fast("move_section", list.cache.borrow_mut().move_section(from, to));
            list.finish(Box::new(completion), done);
        });
    }

    /// Re-renders the elements at `paths` and overwrites their slots.
    pub fn reload_items(&self, paths: Vec<IndexPath>, completion: impl FnOnce() + 'static) {
        self.enqueue("reload_items", move |list, done| {
            list.render_batch(
                "reload_items",
                sorted(paths),
                Placement::OverwriteRows,
                Box::new(completion),
                done,
            );
        });
    }

    /// Re-renders whole sections. Each reloaded section is resized to the
    /// row count the source reports now.
    pub fn reload_sections(&self, sections: Vec<usize>, completion: impl FnOnce() + 'static) {
        self.enqueue("reload_sections", move |list, done| {
            let sections: Vec<(usize, usize)> = sorted(sections)
                .into_iter()
                .map(|section| (section, rows_in(&*list.source, section)))
                .collect();
            list.render_batch(
                "reload_sections",
                section_paths(&sections),
                Placement::ReplaceSections(sections),
                Box::new(completion),
                done,
            );
        });
    }

    /// Re-renders everything the source reports. The previous nodes stay
    /// readable until the whole new set is ready, then the cache is
    /// replaced in one step.
    pub fn reload_data(&self, completion: impl FnOnce() + 'static) {
        self.enqueue("reload_data", move |list, done| {
            let shape: Vec<usize> = (0..list.source.total_number_of_sections())
                .map(|section| rows_in(&*list.source, section))
                .collect();
            let sections: Vec<(usize, usize)> = shape.iter().copied().enumerate().collect();
            list.render_batch(
                "reload_data",
                section_paths(&sections),
                Placement::Rebuild(shape),
                Box::new(completion),
                done,
            );
        });
    }

    /// The node cached at `path`.
    ///
    /// # Panics
    ///
    /// When `path` lies outside the cache's current shape.
    pub fn node_at(&self, path: IndexPath) -> Option<Node> {
        fail_fast("node_at", self.try_node_at(path))
    }

    pub fn try_node_at(&self, path: IndexPath) -> Result<Option<Node>, NodeCacheError> {
        self.inner.cache.borrow().get(path).map(|node| node.cloned())
    }

    /// Element the node at `path` was rendered from. This can differ from
    /// what the data source holds now until that path is reloaded.
    ///
    /// # Panics
    ///
    /// When `path` lies outside the cache's current shape.
    pub fn cached_element_at(&self, path: IndexPath) -> Option<Element> {
        self.node_at(path).map(|node| node.element().clone())
    }

    /// Read access to the whole cache.
    pub fn with_cache<R>(&self, f: impl FnOnce(&NodeCache) -> R) -> R {
        f(&self.inner.cache.borrow())
    }

    pub fn section_count(&self) -> usize {
        self.inner.cache.borrow().section_count()
    }

    pub fn row_count(&self, section: usize) -> Option<usize> {
        self.inner.cache.borrow().row_count(section).ok()
    }

    pub fn cache_shape(&self) -> Vec<usize> {
        self.inner.cache.borrow().shape()
    }

    /// Owner written into nodes cached from now on. Nodes already in the
    /// cache keep the owner they were cached with.
    pub fn set_event_target(&self, owner: Option<OwnerId>) {
        self.inner.event_target.set(owner);
    }

    pub fn event_target(&self) -> Option<OwnerId> {
        self.inner.event_target.get()
    }

    /// Context for renders issued from now on. Its event target is replaced
    /// by [`AsyncList::event_target`].
    pub fn set_context(&self, context: RenderContext) {
        *self.inner.context.borrow_mut() = context;
    }

    /// Whether every enqueued mutation has finished.
    pub fn is_idle(&self) -> bool {
        self.inner.queue.is_idle() && self.inner.batches.borrow().is_empty()
    }

    /// Mutations waiting behind the one in flight.
    pub fn pending_operations(&self) -> usize {
        self.inner.queue.len()
    }
}

impl fmt::Debug for AsyncList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncList")
            .field("shape", &self.cache_shape())
            .field("queue", &self.inner.queue)
            .field("batches", &self.inner.batches.borrow().len())
            .field("event_target", &self.inner.event_target.get())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/list_tests.rs"]
mod tests;
