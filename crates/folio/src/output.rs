//! Terminal reporting for the `folio` commands.
//!
//! Everything goes to stderr so stdout stays free for piping. Startup
//! settings print as aligned `label: value` rows.

use std::fmt::Display;
use std::path::Path;

use console::{Style, Term};
use folio_tree::DocumentationId;

/// Width the labels of [`Output::field`] rows are padded to.
const LABEL_WIDTH: usize = 10;

pub(crate) struct Output {
    term: Term,
    label: Style,
    published: Style,
    warning: Style,
    failure: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            label: Style::new().dim(),
            published: Style::new().green(),
            warning: Style::new().yellow(),
            failure: Style::new().red().bold(),
        }
    }

    /// One aligned setting row, e.g. `      port: 8080`.
    pub(crate) fn field(&self, label: &str, value: impl Display) {
        let label = self.label.apply_to(pad_label(label));
        self.line(&format!("{label} {value}"));
    }

    pub(crate) fn building(&self, project: DocumentationId) {
        self.line(&format!("Building project {project}..."));
    }

    pub(crate) fn published(&self, project: DocumentationId, site: &Path) {
        let msg = format!("Project {project} published to {}", site.display());
        self.line(&self.published.apply_to(msg).to_string());
    }

    pub(crate) fn warning(&self, msg: &str) {
        self.line(&self.warning.apply_to(msg).to_string());
    }

    pub(crate) fn error(&self, err: &dyn Display) {
        let msg = format!("error: {err}");
        self.line(&self.failure.apply_to(msg).to_string());
    }

    fn line(&self, text: &str) {
        // Nowhere left to report a broken stderr.
        let _ = self.term.write_line(text);
    }
}

fn pad_label(label: &str) -> String {
    format!("{:>LABEL_WIDTH$}:", label)
}
