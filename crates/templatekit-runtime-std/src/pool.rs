use std::fmt;
use std::io;
use std::sync::mpsc::{self, Receiver, SendError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use templatekit_core::{
    Element, Node, RenderCompletion, RenderContext, RenderError, RenderOutcome, Renderer,
};

use crate::config::RendererConfig;

/// Turns one element into a node. Runs on a render thread.
pub type RenderFn = dyn Fn(&Element, &RenderContext) -> RenderOutcome + Send + Sync + 'static;

struct Job {
    element: Element,
    context: RenderContext,
    completion: RenderCompletion,
}

/// [`Renderer`] that runs every render on a fixed set of worker threads.
///
/// Renders are picked up in submission order but finish in any order. The
/// pool stops accepting work when dropped and joins its threads. Once every
/// worker has died, renders fail with [`RenderError::Unavailable`].
pub struct ThreadPoolRenderer {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPoolRenderer {
    /// Pool that materializes elements one node per element.
    pub fn new(config: RendererConfig) -> io::Result<Self> {
        Self::with_render_fn(config, |element, _context| Ok(Node::from_element(element)))
    }

    pub fn with_render_fn(
        config: RendererConfig,
        render: impl Fn(&Element, &RenderContext) -> RenderOutcome + Send + Sync + 'static,
    ) -> io::Result<Self> {
        let render: Arc<RenderFn> = Arc::new(render);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let workers = (0..config.workers.max(1))
            .map(|index| {
                let receiver = Arc::clone(&receiver);
                let render = Arc::clone(&render);
                thread::Builder::new()
                    .name(format!("{}-{index}", config.thread_name))
                    .spawn(move || run_worker(&receiver, &*render))
            })
            .collect::<io::Result<Vec<_>>>()?;
        log::debug!(
            "started {} render worker(s) named {}-*",
            workers.len(),
            config.thread_name
        );
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

fn run_worker(receiver: &Mutex<Receiver<Job>>, render: &RenderFn) {
    loop {
        let job = receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        let Ok(Job {
            element,
            context,
            completion,
        }) = job
        else {
            break;
        };
        completion.complete(render(&element, &context));
    }
}

impl Renderer for ThreadPoolRenderer {
    fn render(&self, element: Element, context: &RenderContext, completion: RenderCompletion) {
        let job = Job {
            element,
            context: context.clone(),
            completion,
        };
        let rejected = match self.sender.as_ref() {
            Some(sender) => sender.send(job).err().map(|SendError(job)| job),
            None => Some(job),
        };
        if let Some(job) = rejected {
            log::warn!(
                "render workers are gone; render of `{}` refused",
                job.element.element_type().name()
            );
            job.completion.fail(RenderError::Unavailable);
        }
    }
}

impl Drop for ThreadPoolRenderer {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::warn!("render worker panicked");
            }
        }
    }
}

impl fmt::Debug for ThreadPoolRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPoolRenderer")
            .field("workers", &self.workers.len())
            .finish()
    }
}
