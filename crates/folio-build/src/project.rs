//! Builds one documentation project: materialize, generate, publish.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use folio_site::SiteLayout;
use folio_tree::{
    BuildState, DocumentationId, TreeError, TreeErrorKind, TreeStore,
};

use crate::error::BuildError;
use crate::generator::GeneratorCommand;
use crate::materialize::{ProjectSnapshot, materialize};
use crate::scheduler::BuildExecutor;
use crate::status::Built;

/// File under the project source directory holding the fingerprint of the
/// last published build.
const FINGERPRINT_FILE: &str = ".fingerprint";

/// Executor that turns a project's tree into a published static site.
///
/// Generator output goes to a fresh staging directory and replaces the
/// published site with a rename, so readers see either the old or the new
/// site and never a partial one.
pub struct ProjectBuilder {
    store: TreeStore,
    layout: SiteLayout,
    generator: GeneratorCommand,
}

impl ProjectBuilder {
    #[must_use]
    pub fn new(store: TreeStore, layout: SiteLayout, generator: GeneratorCommand) -> Self {
        Self {
            store,
            layout,
            generator,
        }
    }

    /// Read a project and its versions. `None` if the project is gone.
    pub async fn snapshot(
        &self,
        project: DocumentationId,
    ) -> Result<Option<ProjectSnapshot>, BuildError> {
        let root = match self.store.load_tree(project).await {
            Ok(tree) => tree,
            Err(e) if e.kind() == TreeErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if root.documentation().is_version() {
            return Err(TreeError::InvalidStructure(format!(
                "documentation {project} is a version, build its project instead"
            ))
            .into());
        }

        let mut versions = Vec::new();
        for version in self.store.list_versions(project).await? {
            versions.push(self.store.load_tree(version.id).await?);
        }

        Ok(Some(ProjectSnapshot { root, versions }))
    }

    async fn purge(&self, project: DocumentationId) -> Result<(), BuildError> {
        for dir in [self.layout.source_dir(project), self.layout.site_dir(project)] {
            remove_dir_if_exists(&dir).await?;
        }
        tracing::info!(project, "Removed sources and site of deleted project");
        Ok(())
    }

    async fn build_project(&self, project: DocumentationId, force: bool) -> Result<Built, BuildError> {
        let Some(snapshot) = self.snapshot(project).await? else {
            self.purge(project).await?;
            return Ok(Built::Removed);
        };

        let layout = self.layout.clone();
        let materialized = snapshot.clone();
        let fingerprint = tokio::task::spawn_blocking(move || materialize(&layout, &materialized))
            .await
            .map_err(|e| BuildError::Io(io::Error::other(e)))??;

        let source = self.layout.source_dir(project);
        let site = self.layout.site_dir(project);
        let fingerprint_path = source.join(FINGERPRINT_FILE);

        if !force && site.is_dir() {
            let previous = tokio::fs::read_to_string(&fingerprint_path).await.ok();
            if previous.as_deref() == Some(fingerprint.as_str()) {
                tracing::debug!(project, "Content unchanged, skipping generator");
                self.record(&snapshot, BuildState::Succeeded).await;
                return Ok(Built::Unchanged);
            }
        }

        let staging = Staging::new(
            self.layout
                .staging_dir(project, &uuid::Uuid::new_v4().simple().to_string()),
        );
        if let Err(e) = self.generate_and_publish(&source, staging, &site).await {
            self.record(&snapshot, BuildState::Failed).await;
            return Err(e);
        }

        tokio::fs::write(&fingerprint_path, &fingerprint).await?;
        self.record(&snapshot, BuildState::Succeeded).await;
        Ok(Built::Published)
    }

    async fn generate_and_publish(
        &self,
        source: &Path,
        staging: Staging,
        site: &Path,
    ) -> Result<(), BuildError> {
        if let Some(parent) = staging.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.generator.run(source, &staging.path).await?;

        // The blocking task owns the staging directory and runs the swap to
        // completion even if this future is dropped.
        let site = site.to_path_buf();
        tokio::task::spawn_blocking(move || publish(&staging.path, &site))
            .await
            .map_err(|e| BuildError::Io(io::Error::other(e)))??;
        Ok(())
    }

    async fn record(&self, snapshot: &ProjectSnapshot, state: BuildState) {
        let at = Utc::now();
        for documentation in snapshot.documentations() {
            if let Err(e) = self.store.record_build(documentation.id, state, at).await {
                tracing::warn!(
                    documentation_id = documentation.id,
                    error = %e,
                    "Failed to record build state"
                );
            }
        }
    }
}

#[async_trait]
impl BuildExecutor for ProjectBuilder {
    async fn build(&self, project: DocumentationId, force: bool) -> Result<Built, BuildError> {
        self.build_project(project, force).await
    }
}

/// Generator output directory, removed when dropped unless it was
/// published.
struct Staging {
    path: PathBuf,
}

impl Staging {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if let Err(e) = remove_dir_if_exists_sync(&self.path) {
            tracing::warn!(error = %e, staging = %self.path.display(), "Failed to remove staging directory");
        }
    }
}

/// Swap `staging` in as `site`.
///
/// The previous site is moved aside first and put back if the swap fails.
fn publish(staging: &Path, site: &Path) -> io::Result<()> {
    let retired = retired_path(site);
    let had_site = site.exists();
    if had_site {
        remove_dir_if_exists_sync(&retired)?;
        std::fs::rename(site, &retired)?;
    }

    if let Err(e) = std::fs::rename(staging, site) {
        if had_site {
            std::fs::rename(&retired, site)?;
        }
        return Err(e);
    }

    if had_site {
        remove_dir_if_exists_sync(&retired)?;
    }
    Ok(())
}

fn retired_path(site: &Path) -> PathBuf {
    let name = site
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    site.with_file_name(format!(".{name}.retired"))
}

async fn remove_dir_if_exists(dir: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn remove_dir_if_exists_sync(dir: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
