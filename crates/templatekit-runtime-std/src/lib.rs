//! `std` threads and locks behind the `templatekit-core` platform traits.
//!
//! A [`StdRuntime`] drives the UI thread and sleeps until background work
//! asks for a frame. A [`ThreadPoolRenderer`] renders list rows on worker
//! threads.

mod config;
mod pool;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use templatekit_core::{ComponentError, Runtime, RuntimeHandle, RuntimeScheduler};

pub use config::{RendererConfig, RENDER_WORKERS_ENV};
pub use pool::{RenderFn, ThreadPoolRenderer};

type FrameWaker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Frame scheduler shared between the UI thread and render threads.
///
/// Frame requests may come from any thread; the UI thread either polls
/// [`StdScheduler::take_frame_request`] or blocks in
/// [`StdScheduler::wait_for_frame`].
pub struct StdScheduler {
    frame_requested: AtomicBool,
    frame_waker: RwLock<Option<FrameWaker>>,
    frame_lock: Mutex<()>,
    frame_signal: Condvar,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            frame_requested: AtomicBool::new(false),
            frame_waker: RwLock::new(None),
            frame_lock: Mutex::new(()),
            frame_signal: Condvar::new(),
        }
    }

    /// Consumes a pending frame request.
    pub fn take_frame_request(&self) -> bool {
        self.frame_requested.swap(false, Ordering::SeqCst)
    }

    /// Blocks until a frame is requested or `timeout` elapses. Consumes the
    /// request like [`StdScheduler::take_frame_request`].
    pub fn wait_for_frame(&self, timeout: Duration) -> bool {
        let guard = self.frame_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (_guard, _) = self
            .frame_signal
            .wait_timeout_while(guard, timeout, |_| {
                !self.frame_requested.load(Ordering::SeqCst)
            })
            .unwrap_or_else(PoisonError::into_inner);
        self.take_frame_request()
    }

    /// Extra hook run on every frame request, from the requesting thread.
    pub fn set_frame_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self
            .frame_waker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    pub fn clear_frame_waker(&self) {
        *self
            .frame_waker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        {
            let _guard = self.frame_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.frame_requested.store(true, Ordering::SeqCst);
            self.frame_signal.notify_all();
        }
        let waker = self
            .frame_waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field(
                "frame_requested",
                &self.frame_requested.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_frame(&self) {
        self.wake();
    }
}

/// A UI [`Runtime`] wired to a [`StdScheduler`].
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    runtime: Runtime,
}

impl StdRuntime {
    pub fn new() -> Self {
        let scheduler = Arc::new(StdScheduler::new());
        Self {
            runtime: Runtime::new(Arc::clone(&scheduler) as Arc<dyn RuntimeScheduler>),
            scheduler,
        }
    }

    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn take_frame_request(&self) -> bool {
        self.scheduler.take_frame_request()
    }

    /// Applies everything that is ready without waiting for other threads.
    pub fn run_until_idle(&self) -> Result<usize, ComponentError> {
        self.runtime.run_until_idle()
    }

    /// Runs the UI loop on the calling thread until `done` holds, sleeping
    /// between frames. Returns `false` if `timeout` elapsed first.
    pub fn run_until(
        &self,
        mut done: impl FnMut() -> bool,
        timeout: Duration,
    ) -> Result<bool, ComponentError> {
        let deadline = Instant::now() + timeout;
        loop {
            self.runtime.run_until_idle()?;
            if done() {
                return Ok(true);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                log::debug!("run_until gave up after {timeout:?}");
                return Ok(false);
            }
            self.scheduler.wait_for_frame(remaining);
        }
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("runtime", &self.runtime)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}
