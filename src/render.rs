//! Template rendering for converted pages.

use tera::{Context, Tera};

/// File extension marking a page as a template.
pub const TEMPLATE_EXT: &str = "jinja2";

/// Variables substituted into converted templates. The names mirror the
/// placeholders the converter writes; the defaults resolve them back to
/// the URLs it replaced.
#[derive(Debug, Clone)]
pub struct TemplateVars {
    pub bootstrap5_css_url: String,
    pub bootstrap5_js_url: String,
    pub script_js_url: String,
}

impl Default for TemplateVars {
    fn default() -> Self {
        Self {
            bootstrap5_css_url:
                "https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/css/bootstrap.min.css"
                    .to_string(),
            bootstrap5_js_url:
                "https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/js/bootstrap.bundle.min.js"
                    .to_string(),
            script_js_url: "script.js".to_string(),
        }
    }
}

impl TemplateVars {
    fn context(&self) -> Context {
        let mut context = Context::new();
        context.insert("bootstrap5_css_url", &self.bootstrap5_css_url);
        context.insert("bootstrap5_js_url", &self.bootstrap5_js_url);
        context.insert("script_js_url", &self.script_js_url);
        context
    }
}

/// Render template source with the conversion variables.
///
/// Autoescaping stays off: the variables are URLs destined for attribute
/// values the site author wrote, not user input.
pub fn render_str(source: &str, vars: &TemplateVars) -> Result<String, tera::Error> {
    Tera::one_off(source, &vars.context(), false)
}
