//! Platform abstraction for the UI runtime.
//!
//! The host decides when a frame actually runs; the runtime only asks for
//! one. This keeps the core free of any event-loop or threading choice.

/// Requests frames on behalf of the TemplateKit runtime.
///
/// Render completions arrive from worker threads and wake the runtime
/// through this trait, so implementations must be safe to call from any
/// thread.
pub trait RuntimeScheduler: Send + Sync {
    /// Ask the host to drain the UI runtime soon.
    fn schedule_frame(&self);
}
