use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::collections::HashSet;
use crate::component::ComponentError;
use crate::platform::RuntimeScheduler;

pub(crate) type ComponentId = usize;

/// A component that can re-render itself after its state changed.
pub(crate) trait Recompose {
    /// Returns `false` when the component had already caught up and did not
    /// render.
    fn recompose(&self) -> Result<bool, ComponentError>;
}

/// Something that produces results off the UI thread and applies them when
/// the runtime drains. Returns how many results were applied.
pub trait UiSource {
    fn poll(&self) -> usize;
}

struct WakeState {
    pending: AtomicBool,
    scheduler: Arc<dyn RuntimeScheduler>,
}

/// Thread-safe handle used by background work to tell the UI runtime that a
/// [`UiSource`] has something to apply.
#[derive(Clone)]
pub struct UiWaker {
    state: Arc<WakeState>,
}

impl UiWaker {
    pub fn wake(&self) {
        self.state.pending.store(true, Ordering::SeqCst);
        self.state.scheduler.schedule_frame();
    }
}

impl fmt::Debug for UiWaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiWaker")
            .field("pending", &self.state.pending.load(Ordering::SeqCst))
            .finish()
    }
}

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    needs_frame: Cell<bool>,
    invalid_components: RefCell<HashSet<ComponentId>>,
    component_queue: RefCell<VecDeque<(ComponentId, Weak<dyn Recompose>)>>,
    pending_tasks: RefCell<VecDeque<Box<dyn FnOnce() + 'static>>>,
    sources: RefCell<Vec<Weak<dyn UiSource>>>,
    wake: Arc<WakeState>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            wake: Arc::new(WakeState {
                pending: AtomicBool::new(false),
                scheduler: Arc::clone(&scheduler),
            }),
            scheduler,
            needs_frame: Cell::new(false),
            invalid_components: RefCell::new(HashSet::new()),
            component_queue: RefCell::new(VecDeque::new()),
            pending_tasks: RefCell::new(VecDeque::new()),
            sources: RefCell::new(Vec::new()),
        }
    }

    fn schedule(&self) {
        self.needs_frame.set(true);
        self.scheduler.schedule_frame();
    }

    fn register_invalid_component(&self, id: ComponentId, component: Weak<dyn Recompose>) {
        if self.invalid_components.borrow_mut().insert(id) {
            self.component_queue.borrow_mut().push_back((id, component));
            self.schedule();
        }
    }

    fn has_invalid_components(&self) -> bool {
        !self.invalid_components.borrow().is_empty()
    }

    fn process_invalid_components(&self) -> Result<usize, ComponentError> {
        let mut rendered = 0;
        loop {
            let next = self.component_queue.borrow_mut().pop_front();
            let Some((id, weak)) = next else {
                break;
            };
            // Unregister before rendering so the render may invalidate again.
            self.invalid_components.borrow_mut().remove(&id);
            if let Some(component) = weak.upgrade() {
                if component.recompose()? {
                    rendered += 1;
                }
            }
        }
        Ok(rendered)
    }

    fn enqueue_task(&self, task: Box<dyn FnOnce() + 'static>) {
        self.pending_tasks.borrow_mut().push_back(task);
        self.schedule();
    }

    fn drain_tasks(&self) -> usize {
        let tasks: Vec<Box<dyn FnOnce() + 'static>> =
            self.pending_tasks.borrow_mut().drain(..).collect();
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }

    fn has_tasks(&self) -> bool {
        !self.pending_tasks.borrow().is_empty()
    }

    fn register_source(&self, source: Weak<dyn UiSource>) {
        self.sources.borrow_mut().push(source);
    }

    fn poll_sources(&self) -> usize {
        self.wake.pending.store(false, Ordering::SeqCst);
        let sources: Vec<Rc<dyn UiSource>> = {
            let mut sources = self.sources.borrow_mut();
            sources.retain(|source| source.strong_count() > 0);
            sources.iter().filter_map(Weak::upgrade).collect()
        };
        sources.iter().map(|source| source.poll()).sum()
    }

    fn has_pending_work(&self) -> bool {
        self.has_tasks()
            || self.has_invalid_components()
            || self.wake.pending.load(Ordering::SeqCst)
    }
}

/// The UI-thread runtime: a task queue, the set of components waiting to
/// re-render, and the sources that apply background results.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn waker(&self) -> UiWaker {
        UiWaker {
            state: Arc::clone(&self.inner.wake),
        }
    }

    pub fn needs_frame(&self) -> bool {
        self.inner.needs_frame.get()
    }

    pub fn set_needs_frame(&self, value: bool) {
        self.inner.needs_frame.set(value);
    }

    pub fn has_pending_work(&self) -> bool {
        self.inner.has_pending_work()
    }

    pub fn process_invalid_components(&self) -> Result<usize, ComponentError> {
        self.inner.process_invalid_components()
    }

    /// One pass over the UI work: queued tasks, then background results,
    /// then component re-renders. Returns how much work was done.
    pub fn drain_ui(&self) -> Result<usize, ComponentError> {
        let tasks = self.inner.drain_tasks();
        let applied = self.inner.poll_sources();
        let rendered = self.inner.process_invalid_components()?;
        Ok(tasks + applied + rendered)
    }

    /// Repeats [`Runtime::drain_ui`] until a pass does nothing. Work that is
    /// still running on other threads is not waited for.
    pub fn run_until_idle(&self) -> Result<usize, ComponentError> {
        let mut total = 0;
        loop {
            let done = self.drain_ui()?;
            if done == 0 {
                break;
            }
            total += done;
        }
        if !self.inner.has_pending_work() {
            self.inner.needs_frame.set(false);
        }
        Ok(total)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("needs_frame", &self.inner.needs_frame.get())
            .field("pending_tasks", &self.inner.pending_tasks.borrow().len())
            .field(
                "invalid_components",
                &self.inner.invalid_components.borrow().len(),
            )
            .finish()
    }
}

#[derive(Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_frame(&self) {}
}

/// Non-owning handle to a [`Runtime`]. Calls on a handle whose runtime is
/// gone are ignored.
#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub fn schedule(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.schedule();
        }
    }

    /// Queues `task` to run on the UI thread during the next drain. Without a
    /// live runtime the task runs immediately.
    pub fn spawn_task(&self, task: Box<dyn FnOnce() + 'static>) {
        if let Some(inner) = self.0.upgrade() {
            inner.enqueue_task(task);
        } else {
            task();
        }
    }

    pub fn drain_tasks(&self) -> usize {
        self.0
            .upgrade()
            .map(|inner| inner.drain_tasks())
            .unwrap_or(0)
    }

    pub fn has_pending_tasks(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.has_tasks())
            .unwrap_or(false)
    }

    pub fn register_source(&self, source: Weak<dyn UiSource>) {
        if let Some(inner) = self.0.upgrade() {
            inner.register_source(source);
        }
    }

    pub fn waker(&self) -> Option<UiWaker> {
        self.0.upgrade().map(|inner| UiWaker {
            state: Arc::clone(&inner.wake),
        })
    }

    pub fn has_invalid_components(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.has_invalid_components())
            .unwrap_or(false)
    }

    pub(crate) fn register_invalid_component(&self, id: ComponentId, component: Weak<dyn Recompose>) {
        if let Some(inner) = self.0.upgrade() {
            inner.register_invalid_component(id, component);
        }
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RuntimeHandle")
            .field(&self.is_alive())
            .finish()
    }
}
