//! Connection hub: the single owner of all session state on an instance.
//!
//! Every registration, deregistration, submission, and delivery arrives as a
//! [`HubEvent`] on one unbounded channel and is processed by [`Hub::run`]
//! one at a time. Because nothing else can reach the [`Registry`], the
//! registry needs no locks and all of its mutations are totally ordered.
//!
//! ```text
//!  Session reader ──Submit──┐
//!  ws handler ──Register────┤
//!  Session end ──Unregister─┼──▶ Hub loop ──try_send──▶ Session queues
//!  bridge loop ──Deliver────┤        │
//!  REST ──Announce/Stats────┘        └──save / members / publish──▶ store, bus
//! ```

pub mod event;
pub mod event_loop;
pub mod handle;
pub mod registry;

pub use event::{HubEvent, HubStats};
pub use event_loop::Hub;
pub use handle::HubHandle;
pub use registry::{Registry, Removed, SessionHandle};
