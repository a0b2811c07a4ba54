#![doc = r"Core runtime pieces for TemplateKit-RS: elements, components, and the async list cache."]

extern crate self as templatekit_core;

mod collections;
pub mod component;
pub mod element;
pub mod event;
pub mod list;
pub mod node;
pub mod node_cache;
pub mod platform;
pub mod properties;
pub mod queue;
pub mod renderer;
pub mod runtime;

pub use component::{Component, ComponentError, ComponentHost, Update};
pub use element::{Element, ElementType, Properties};
pub use event::{Callback, Event, EventKind, EventTarget, OwnerId, OwnerRegistry};
pub use list::{AsyncList, ListDataSource};
pub use node::{Node, NodeId};
pub use node_cache::{IndexPath, NodeCache, NodeCacheError};
pub use platform::RuntimeScheduler;
pub use properties::{
    BaseProperties, Color, ContentMode, GestureProperties, ImageProperties, ImageSource,
    LayoutProperties, Merge, SelfAlignment, StyleProperties, TextProperties,
};
pub use queue::{Done, OperationId, OperationQueue};
pub use renderer::{
    LayoutDirection, RenderCompletion, RenderContext, RenderError, RenderOutcome, Renderer,
};
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle, UiSource, UiWaker};

pub use templatekit_macros::Merge;
