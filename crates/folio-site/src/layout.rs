//! On-disk layout of project sources and published sites.
//!
//! ```text
//! <data_dir>/
//! ├── sources/<project>/        generator working directory
//! │   ├── folio.json
//! │   └── docs/
//! │       ├── ...               root documentation
//! │       └── <version>/        one directory per version
//! └── sites/<project>/          published output
//!     ├── index.html
//!     └── <version>/
//! ```
//!
//! `<project>` is the id of the root documentation. `<version>` is the
//! slugified version label of a cloned documentation.

use std::path::{Path, PathBuf};

use folio_tree::{Documentation, DocumentationId, slugify};

/// Directory layout under a data directory.
#[derive(Clone, Debug)]
pub struct SiteLayout {
    data_dir: PathBuf,
}

impl SiteLayout {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Parent of all generator working directories.
    #[must_use]
    pub fn sources_root(&self) -> PathBuf {
        self.data_dir.join("sources")
    }

    /// Parent of all published sites.
    #[must_use]
    pub fn sites_root(&self) -> PathBuf {
        self.data_dir.join("sites")
    }

    /// Generator working directory of a project.
    #[must_use]
    pub fn source_dir(&self, project: DocumentationId) -> PathBuf {
        self.sources_root().join(project.to_string())
    }

    /// Markdown root inside a project's working directory.
    #[must_use]
    pub fn docs_dir(&self, project: DocumentationId) -> PathBuf {
        self.source_dir(project).join("docs")
    }

    /// Published output of a project.
    #[must_use]
    pub fn site_dir(&self, project: DocumentationId) -> PathBuf {
        self.sites_root().join(project.to_string())
    }

    /// Private output directory for one build attempt.
    ///
    /// Lives next to the published site so it can be swapped in with a
    /// rename. The leading dot keeps it out of the id-named site
    /// directories.
    #[must_use]
    pub fn staging_dir(&self, project: DocumentationId, attempt: &str) -> PathBuf {
        self.sites_root().join(format!(".{project}.staging-{attempt}"))
    }

    /// Where the built output of a documentation is served from.
    ///
    /// Roots are served from their project site; versions from a
    /// subdirectory of it.
    #[must_use]
    pub fn output_dir(&self, documentation: &Documentation) -> PathBuf {
        let site = self.site_dir(documentation.project_id());
        match version_segment(documentation) {
            Some(segment) => site.join(segment),
            None => site,
        }
    }
}

/// Directory name of a version inside its project, `None` for roots.
///
/// Falls back to the id when the label has no usable characters.
#[must_use]
pub fn version_segment(documentation: &Documentation) -> Option<String> {
    if !documentation.is_version() {
        return None;
    }
    let slug = slugify(&documentation.version);
    Some(if slug.is_empty() {
        documentation.id.to_string()
    } else {
        slug
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{TimeZone, Utc};
    use folio_tree::{BuildState, SiteDetails};
    use pretty_assertions::assert_eq;

    use super::*;

    pub(crate) fn documentation(
        id: DocumentationId,
        base_url: &str,
        origin: Option<DocumentationId>,
        version: &str,
        created_secs: i64,
    ) -> Documentation {
        let created = Utc.timestamp_opt(created_secs, 0).unwrap();
        Documentation {
            id,
            name: format!("doc{id}"),
            description: String::new(),
            version: version.to_owned(),
            base_url: base_url.to_owned(),
            version_origin: origin,
            favicon: String::new(),
            meta_image: String::new(),
            nav_image: String::new(),
            custom_css: String::new(),
            copyright_text: String::new(),
            site: SiteDetails::default(),
            author_id: 1,
            last_editor_id: None,
            editors: Vec::new(),
            build_status: BuildState::Never,
            last_built_at: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_project_directories() {
        let layout = SiteLayout::new("/srv/folio");

        assert_eq!(layout.source_dir(3), PathBuf::from("/srv/folio/sources/3"));
        assert_eq!(layout.docs_dir(3), PathBuf::from("/srv/folio/sources/3/docs"));
        assert_eq!(layout.site_dir(3), PathBuf::from("/srv/folio/sites/3"));
        assert_eq!(
            layout.staging_dir(3, "abc"),
            PathBuf::from("/srv/folio/sites/.3.staging-abc")
        );
    }

    #[test]
    fn test_output_dir_of_root_and_version() {
        let layout = SiteLayout::new("/data");
        let root = documentation(1, "/docs/", None, "1.0", 0);
        let version = documentation(5, "/docs/v2/", Some(1), "V2", 10);

        assert_eq!(layout.output_dir(&root), PathBuf::from("/data/sites/1"));
        assert_eq!(layout.output_dir(&version), PathBuf::from("/data/sites/1/v2"));
    }

    #[test]
    fn test_version_segment_falls_back_to_id() {
        let version = documentation(9, "/docs/x/", Some(1), "***", 0);

        assert_eq!(version_segment(&version), Some("9".to_owned()));
    }
}
