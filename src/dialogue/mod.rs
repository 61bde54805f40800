//! Dialogue module: state rendering, event routing and paced delivery
//!
//! - `directive`: outbound steps produced for one event
//! - `renderer`: turns a state into directives for one user
//! - `router`: picks the next state for commands, text and button presses
//! - `engine`: serializes events per chat and delivers the directives

pub mod directive;
pub mod engine;
pub mod renderer;
pub mod router;

pub use directive::{Directive, Keyboard};
pub use engine::{deliver, ChatLocks, DeliveryReport, DialogueEngine};
pub use renderer::{compose, quick_reply_rows, RenderStatus, Renderer, Rendering};
pub use router::{CallbackAck, EventKind, InboundEvent, RouteOutcome, Router};
