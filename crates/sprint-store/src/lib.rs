//! Sprint Store - record store collaborator
//!
//! The engine talks to persistence only through [`RecordStore`]:
//! - CRUD over named collections
//! - Filtered, sorted, paginated listing
//! - Atomic conditional updates for optimistic concurrency
//!
//! [`MemoryStore`] is an in-process implementation used by tests and by
//! embedders that do not need durability.
//!
//! # Example
//!
//! ```rust,ignore
//! use sprint_store::{Filter, MemoryStore, RecordStore, Sort};
//!
//! let store = MemoryStore::new();
//! let active = store
//!     .find_first("sprints", &Filter::eq("status", "active"), &Sort::desc("created"))
//!     .await?;
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod memory;
pub mod query;
pub mod record;
pub mod store;

pub use error::{InvalidRecordId, StoreError};
pub use memory::MemoryStore;
pub use query::{Direction, Filter, Sort, SortKey};
pub use record::{encode, time_value, Fields, ListPage, Record, RecordId};
pub use store::RecordStore;
