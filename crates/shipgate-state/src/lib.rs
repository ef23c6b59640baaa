//! shipgate-state — durable deployment records for shipgate.
//!
//! Backed by [redb](https://docs.rs/redb). One table maps each caller
//! supplied tag to a JSON-serialized [`DeploymentRecord`].
//!
//! # Idempotency
//!
//! [`RecordStore::create`] checks for an existing tag and inserts the new
//! record inside a single write transaction. redb admits one writer at a
//! time, so two concurrent creates for the same tag cannot both succeed.
//!
//! The `RecordStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::RecordStore;
pub use types::*;
