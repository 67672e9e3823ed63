//! Moderation engine
//!
//! Validates, authorizes, executes, announces and logs disciplinary actions,
//! and schedules the reversal of timed ones.

mod action;
mod authorizer;
mod duration;
mod error;
mod handler;
mod modlog;
pub mod platform;
pub mod schedule;
mod service;

pub use action::{ModAction, ModerationRequest, ModlogEvent, NO_REASON};
pub use authorizer::authorize;
pub use duration::{format_duration, parse_duration};
pub use error::{Denial, ModerationError, ModerationResult};
pub use handler::{ActionContext, ActionHandler, ActionHandlerRegistry};
pub use modlog::ModlogPublisher;
pub use platform::{Platform, PlatformError};
pub use schedule::{FutureAction, FutureActionKind, FutureActionQueue, QueueRequest, Scheduler};
pub use service::ModerationService;
