//! Writes a project's content tree into the generator's working directory.
//!
//! Layout under `sources/<project>/`:
//!
//! - `folio.json`: project manifest (metadata of the root and its versions)
//! - `docs/`: root documentation, one `.md` file per page and one directory
//!   per page group
//! - `docs/<version>/`: the same for each version
//! - `_meta.json` in every directory: children in sibling order
//!
//! The intro page of a directory is written as `index.md`. Names are
//! slugified and de-duplicated within their directory.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use folio_site::{SiteLayout, version_segment};
use folio_tree::{Documentation, DocumentationTree, Page, SiteDetails, TreeNode, slugify};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Manifest file name inside the project source directory.
pub const MANIFEST_FILE: &str = "folio.json";

/// Root documentation and its versions, read in one pass.
#[derive(Clone, Debug)]
pub struct ProjectSnapshot {
    pub root: DocumentationTree,
    pub versions: Vec<DocumentationTree>,
}

impl ProjectSnapshot {
    /// Every documentation of the project, root first.
    pub fn documentations(&self) -> impl Iterator<Item = &Documentation> {
        std::iter::once(self.root.documentation())
            .chain(self.versions.iter().map(DocumentationTree::documentation))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Manifest<'a> {
    id: i64,
    name: &'a str,
    description: &'a str,
    version: &'a str,
    #[serde(rename = "baseURL")]
    base_url: &'a str,
    favicon: &'a str,
    meta_image: &'a str,
    nav_image: &'a str,
    #[serde(rename = "customCSS")]
    custom_css: &'a str,
    copyright_text: &'a str,
    #[serde(flatten)]
    site: &'a SiteDetails,
    versions: Vec<ManifestVersion<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestVersion<'a> {
    id: i64,
    version: &'a str,
    #[serde(rename = "baseURL")]
    base_url: &'a str,
    /// Directory under `docs/` and under the published site.
    path: String,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum MetaEntry {
    File { name: String, label: String },
    Dir { name: String, label: String },
}

/// Write a project snapshot into its source directory.
///
/// Replaces the previous `docs/` tree. Returns a fingerprint of everything
/// written, so unchanged projects can skip the generator.
pub fn materialize(layout: &SiteLayout, snapshot: &ProjectSnapshot) -> io::Result<String> {
    let root = snapshot.root.documentation();
    let source = layout.source_dir(root.id);
    let docs = layout.docs_dir(root.id);

    if docs.exists() {
        fs::remove_dir_all(&docs)?;
    }
    fs::create_dir_all(&docs)?;

    let mut writer = Writer {
        base: &source,
        hasher: Sha256::new(),
    };

    let versions: Vec<(String, &DocumentationTree)> = snapshot
        .versions
        .iter()
        .map(|tree| {
            let doc = tree.documentation();
            (
                version_segment(doc).unwrap_or_else(|| doc.id.to_string()),
                tree,
            )
        })
        .collect();

    let manifest = Manifest {
        id: root.id,
        name: &root.name,
        description: &root.description,
        version: &root.version,
        base_url: &root.base_url,
        favicon: &root.favicon,
        meta_image: &root.meta_image,
        nav_image: &root.nav_image,
        custom_css: &root.custom_css,
        copyright_text: &root.copyright_text,
        site: &root.site,
        versions: versions
            .iter()
            .map(|(segment, tree)| {
                let doc = tree.documentation();
                ManifestVersion {
                    id: doc.id,
                    version: &doc.version,
                    base_url: &doc.base_url,
                    path: segment.clone(),
                }
            })
            .collect(),
    };
    writer.write(&source.join(MANIFEST_FILE), &serde_json::to_vec_pretty(&manifest)?)?;

    // Version directories share `docs/` with the root's top level.
    let reserved: HashSet<String> = versions.iter().map(|(segment, _)| segment.clone()).collect();
    let top: Vec<&TreeNode> = snapshot.root.roots().collect();
    writer.write_level(&docs, &top, &snapshot.root, reserved)?;

    for (segment, tree) in &versions {
        let top: Vec<&TreeNode> = tree.roots().collect();
        writer.write_level(&docs.join(segment), &top, tree, HashSet::new())?;
    }

    let fingerprint = hex::encode(writer.hasher.finalize());
    tracing::debug!(
        project = root.id,
        versions = versions.len(),
        fingerprint = %fingerprint,
        "Project materialized"
    );
    Ok(fingerprint)
}

struct Writer<'a> {
    base: &'a Path,
    hasher: Sha256,
}

impl Writer<'_> {
    fn write(&mut self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let relative = path.strip_prefix(self.base).unwrap_or(path);
        self.hasher.update(relative.to_string_lossy().as_bytes());
        self.hasher.update((contents.len() as u64).to_le_bytes());
        self.hasher.update(contents);
        fs::write(path, contents)
    }

    fn write_level(
        &mut self,
        dir: &Path,
        nodes: &[&TreeNode],
        tree: &DocumentationTree,
        mut taken: HashSet<String>,
    ) -> io::Result<()> {
        fs::create_dir_all(dir)?;
        taken.insert("_meta".to_owned());

        let intro = nodes.iter().find_map(|node| match node {
            TreeNode::Page(page) if page.is_intro_page => Some(page.id),
            _ => None,
        });
        if intro.is_some() {
            taken.insert("index".to_owned());
        }

        let mut meta = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                TreeNode::Page(page) => {
                    let name = if Some(page.id) == intro {
                        "index".to_owned()
                    } else {
                        claim(&mut taken, &name_for(&page.slug, "page", page.id), page.id)
                    };
                    self.write(&dir.join(format!("{name}.md")), render_page(page).as_bytes())?;
                    meta.push(MetaEntry::File {
                        name,
                        label: page.title.clone(),
                    });
                }
                TreeNode::Group(group) => {
                    let name = claim(&mut taken, &name_for(&group.name, "group", group.id), group.id);
                    let children = tree.children_of(group.id);
                    self.write_level(&dir.join(&name), &children, tree, HashSet::new())?;
                    meta.push(MetaEntry::Dir {
                        name,
                        label: group.name.clone(),
                    });
                }
            }
        }

        self.write(&dir.join("_meta.json"), &serde_json::to_vec_pretty(&meta)?)
    }
}

fn name_for(raw: &str, kind: &str, id: i64) -> String {
    let slug = slugify(raw);
    if slug.is_empty() {
        format!("{kind}-{id}")
    } else {
        slug
    }
}

/// Reserve `base` in a directory, suffixing with the node id on collision.
fn claim(taken: &mut HashSet<String>, base: &str, id: i64) -> String {
    let mut candidate = base.to_owned();
    let mut n = 1;
    while taken.contains(&candidate) {
        candidate = if n == 1 {
            format!("{base}-{id}")
        } else {
            format!("{base}-{id}-{n}")
        };
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

fn render_page(page: &Page) -> String {
    // JSON strings are valid YAML scalars.
    let title = serde_json::to_string(&page.title).unwrap_or_else(|_| "\"\"".to_owned());
    format!("---\ntitle: {title}\n---\n\n{}\n", page.content.trim_end())
}
