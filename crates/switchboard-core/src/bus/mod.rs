//! Buses: command (one handler per name), query (many handlers, matched by response type)
//! and event (fan-out to every processor).
//!
//! Every bus keeps its subscriptions in a `registry` structure, so subscribe, cancel and
//! dispatch may run concurrently from any thread. Nothing holds a lock across a handler's
//! `await`.

pub mod command;
pub mod event;
pub mod query;
pub mod registration;

pub use self::command::{CommandBus, CommandBusBuilder};
pub use self::event::EventBus;
pub use self::query::{QueryBus, QuerySubscription};
pub use self::registration::Registration;
