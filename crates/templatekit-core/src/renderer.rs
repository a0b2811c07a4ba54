//! The host-side rendering contract.

use std::fmt;

use crate::element::Element;
use crate::event::OwnerId;
use crate::node::Node;
use crate::node_cache::IndexPath;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LayoutDirection {
    #[default]
    LeftToRight,
    RightToLeft,
}

/// Per-render configuration handed to the [`Renderer`].
#[derive(Clone, Debug, PartialEq)]
pub struct RenderContext {
    event_target: Option<OwnerId>,
    content_scale: f32,
    layout_direction: LayoutDirection,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            event_target: None,
            content_scale: 1.0,
            layout_direction: LayoutDirection::default(),
        }
    }
}

impl RenderContext {
    pub fn with_event_target(mut self, event_target: Option<OwnerId>) -> Self {
        self.event_target = event_target;
        self
    }

    pub fn with_content_scale(mut self, content_scale: f32) -> Self {
        self.content_scale = content_scale;
        self
    }

    pub fn with_layout_direction(mut self, layout_direction: LayoutDirection) -> Self {
        self.layout_direction = layout_direction;
        self
    }

    pub fn event_target(&self) -> Option<OwnerId> {
        self.event_target
    }

    pub fn content_scale(&self) -> f32 {
        self.content_scale
    }

    pub fn layout_direction(&self) -> LayoutDirection {
        self.layout_direction
    }
}

/// Why a render produced no node. The slot it was meant for stays empty.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("data source has no element at {0}")]
    MissingElement(IndexPath),
    #[error("render failed: {0}")]
    Failed(String),
    #[error("render completion dropped without an outcome")]
    Abandoned,
    /// The renderer can no longer accept work.
    #[error("renderer unavailable")]
    Unavailable,
}

pub type RenderOutcome = Result<Node, RenderError>;

/// Turns elements into nodes. Calls may run concurrently and may complete
/// on any thread, in any order.
pub trait Renderer {
    fn render(&self, element: Element, context: &RenderContext, completion: RenderCompletion);
}

type CompletionSink = Box<dyn FnOnce(RenderOutcome) + Send + 'static>;

/// One-shot completion for a single render.
///
/// Dropping a completion without calling it reports
/// [`RenderError::Abandoned`], so a lost render never leaves its batch
/// waiting.
pub struct RenderCompletion {
    sink: Option<CompletionSink>,
}

impl RenderCompletion {
    pub fn new(sink: impl FnOnce(RenderOutcome) + Send + 'static) -> Self {
        Self {
            sink: Some(Box::new(sink)),
        }
    }

    pub fn complete(mut self, outcome: RenderOutcome) {
        if let Some(sink) = self.sink.take() {
            sink(outcome);
        }
    }

    pub fn succeed(self, node: Node) {
        self.complete(Ok(node));
    }

    pub fn fail(self, error: RenderError) {
        self.complete(Err(error));
    }
}

impl Drop for RenderCompletion {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            log::warn!("render completion dropped without an outcome");
            sink(Err(RenderError::Abandoned));
        }
    }
}

impl fmt::Debug for RenderCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCompletion")
            .field("pending", &self.sink.is_some())
            .finish()
    }
}
