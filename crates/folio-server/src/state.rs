//! Shared state for all request handlers.

use std::sync::Arc;

use folio_build::BuildScheduler;
use folio_site::SiteRouter;
use folio_tree::TreeStore;

use crate::auth::Authenticator;
use crate::sites::SiteIndex;

pub(crate) struct AppState {
    /// Tree store; mutations emit build triggers into the scheduler.
    pub(crate) store: TreeStore,
    pub(crate) scheduler: BuildScheduler,
    pub(crate) router: SiteRouter,
    /// Documentation table for `router`, dropped on every store mutation.
    pub(crate) sites: Arc<SiteIndex>,
    pub(crate) auth: Arc<dyn Authenticator>,
    /// Redirect target for requests no site serves.
    pub(crate) admin_path: String,
}
