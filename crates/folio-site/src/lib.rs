//! Published site layout and request routing.
//!
//! [`SiteLayout`] names the directories the builder writes and the server
//! reads. [`SiteRouter`] maps request paths onto files of published sites by
//! longest base-URL prefix. Routing only reads documentation metadata and the
//! filesystem; it never touches the content tree.

mod layout;
mod router;

pub use layout::{SiteLayout, version_segment};
pub use router::{Route, RouteError, SiteRouter};
