//! # Event subscribers.
//!
//! The [`Subscribe`] trait, the [`SubscriberSet`] fan-out, and the built-in [`LogWriter`].
//!
//! ```text
//! Supervisor ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit(&Event)
//!                                                         ├──► LogWriter
//!                                                         └──► custom ...
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
