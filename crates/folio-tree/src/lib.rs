//! Documentation tree store for Folio.
//!
//! Documentations own page groups and pages. Groups form a tree through
//! nullable parent ids; pages hang off a group or sit at the top level.
//! Siblings are ordered by an integer `order`.
//!
//! # Operations
//!
//! - [`TreeStore`] CRUD for documentations, page groups and pages
//! - [`TreeStore::bulk_reorder`] for atomic batches of moves
//! - [`TreeStore::create_version`] for deep-cloning a documentation into a
//!   new version of its project
//!
//! Every mutation that changes rendered output hands a [`BuildTrigger`] to
//! the store's [`TriggerSink`] after it commits. Triggers are keyed by the
//! project root, so an edit inside a version rebuilds the whole project.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use folio_tree::{DocumentationFields, NullSink, TreeStore};
//!
//! let store = TreeStore::in_memory(Arc::new(NullSink)).await?;
//! let doc = store.create_documentation(fields, user_id).await?;
//! let v2 = store.create_version(doc.id, "v2", user_id).await?;
//! ```

mod db;
mod error;
mod hierarchy;
mod model;
mod reorder;
mod schema;
mod store;
mod trigger;
mod version;

pub use error::{Entity, TreeError, TreeErrorKind};
pub use hierarchy::{DocumentationTree, GroupHierarchy, TreeNode};
pub use model::{
    BuildState, Documentation, DocumentationFields, DocumentationId, NewPage, NewPageGroup, Page,
    PageEdit, PageGroup, PageGroupEdit, PageGroupId, PageId, SiteDetails, User, UserId,
};
pub use reorder::ReorderItem;
pub use store::{TreeStore, normalize_base_url};
#[cfg(any(test, feature = "mock"))]
pub use trigger::RecordingSink;
pub use trigger::{BuildTrigger, NullSink, TriggerSink};
pub use version::slugify;
