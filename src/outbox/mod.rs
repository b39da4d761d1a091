//! Transactional outbox.
//!
//! ```text
//! business write ─┬─▶ entity table
//!                 └─▶ outbox_messages (sent_at = NULL)     same transaction
//!
//! OutboxProcessor, every interval:
//!     unsent ORDER BY created_at ─▶ rebuild by `type` ─▶ broker.deliver ─▶ sent_at = now
//! ```
//!
//! Delivery is at-least-once: a crash between delivery and marking relays the
//! record again. Pair with the inbox on the receiving side when handlers are
//! not idempotent. One processor per store; concurrent relays are not
//! coordinated.

mod error;
mod in_memory;
#[allow(clippy::module_inception)]
mod outbox;
mod processor;
mod record;
#[cfg(feature = "sqlite")]
mod sqlite;
mod store;

pub use error::OutboxError;
pub use in_memory::InMemoryOutboxStore;
pub use outbox::{DrainResult, Outbox};
pub use processor::{OutboxProcessor, ProcessorStats};
pub use record::OutboxRecord;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteOutboxStore;
pub use store::OutboxStore;
