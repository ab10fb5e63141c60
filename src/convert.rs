//! One-shot conversion of a static folder into a templated one.

use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static BOOTSTRAP_CSS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://cdn\.jsdelivr\.net/npm/bootstrap@5\.[^/]*/dist/css/bootstrap\.min\.css")
        .unwrap()
});

static BOOTSTRAP_JS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https://cdn\.jsdelivr\.net/npm/bootstrap@5\.[^/]*/dist/js/bootstrap\.bundle\.min\.js",
    )
    .unwrap()
});

const SCRIPT_SRC: &str = r#"src="script.js""#;

/// What [`convert_folder`] did.
#[derive(Debug, PartialEq, Eq)]
pub enum ConvertOutcome {
    /// `index.html` was rewritten into `index.jinja2`.
    Converted,
    /// No `index.html` to process; the folder is untouched. A folder that
    /// was already converted looks exactly like this.
    NothingToDo,
}

/// Convert the top-level `index.html` of `folder` into a template.
///
/// Rewrites the pinned bootstrap 5.x CDN URLs and the `script.js`
/// reference to placeholders, renames the file to `index.jinja2` and makes
/// sure an (initially empty) `.auth` allow-list file exists. Does not
/// recurse into subdirectories.
pub fn convert_folder(folder: &Path) -> Result<ConvertOutcome> {
    let html_file = folder.join("index.html");
    if !html_file.exists() {
        return Ok(ConvertOutcome::NothingToDo);
    }

    let content = fs::read_to_string(&html_file)
        .with_context(|| format!("failed to read {}", html_file.display()))?;

    let content = BOOTSTRAP_CSS.replace_all(&content, "{{ bootstrap5_css_url }}");
    let content = BOOTSTRAP_JS.replace_all(&content, "{{ bootstrap5_js_url }}");
    let content = content.replace(SCRIPT_SRC, r#"src="{{ script_js_url }}""#);

    let auth_file = folder.join(".auth");
    if !auth_file.exists() {
        fs::write(&auth_file, "")
            .with_context(|| format!("failed to create {}", auth_file.display()))?;
    }

    let template_file = folder.join("index.jinja2");
    fs::write(&template_file, &content)
        .with_context(|| format!("failed to write {}", template_file.display()))?;
    fs::remove_file(&html_file)
        .with_context(|| format!("failed to remove {}", html_file.display()))?;

    Ok(ConvertOutcome::Converted)
}
