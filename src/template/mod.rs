//! Message template substitution.
//!
//! Templates carry `{{variable}}` placeholders. Substitution is a single
//! left-to-right pass, so a value that itself contains `{{...}}` (operator
//! text such as a justification) is inserted literally and never expanded.
//! Placeholders without a bound variable are left untouched.
//!
//! Values are inserted verbatim; callers encode them for the destination
//! format first with [`escape_mrkdwn`]. HTML goes through [`render_html`]
//! instead, which escapes every `{{value}}` on the way in.

use std::collections::HashMap;

use handlebars::{Handlebars, RenderError};
use lazy_static::lazy_static;

lazy_static! {
    static ref HTML_RENDERER: Handlebars<'static> = Handlebars::new();
}

/// Variables bound for one rendering pass
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    values: HashMap<&'static str, String>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable, replacing any previous value
    pub fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(name, value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Apply `encode` to every bound value
    pub fn encoded(&self, encode: fn(&str) -> String) -> Self {
        Self {
            values: self
                .values
                .iter()
                .map(|(name, value)| (*name, encode(value)))
                .collect(),
        }
    }
}

/// Substitute `{{variable}}` placeholders in `template`
pub fn substitute(template: &str, vars: &TemplateVars) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        let Some(end) = after_open.find("}}") else {
            result.push_str(&rest[start..]);
            return result;
        };

        let name = after_open[..end].trim();
        match vars.get(name) {
            Some(value) => result.push_str(value),
            None => result.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }

    result.push_str(rest);
    result
}

/// Render a handlebars template to HTML.
///
/// `{{name}}` values are HTML-escaped; `{{{name}}}` inserts markup that was
/// already built with [`escape_html`].
pub fn render_html(template: &str, data: &serde_json::Value) -> Result<String, RenderError> {
    HTML_RENDERER.render_template(template, data)
}

/// Encode text for insertion into HTML element content or attribute values
pub fn escape_html(value: &str) -> String {
    handlebars::html_escape(value)
}

/// Encode text for chat mrkdwn, where only `&`, `<` and `>` are control characters
pub fn escape_mrkdwn(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_simple() {
        let vars = TemplateVars::new().with("name", "World");
        assert_eq!(substitute("Hello, {{name}}!", &vars), "Hello, World!");
    }

    #[test]
    fn test_substitute_multiple() {
        let vars = TemplateVars::new()
            .with("requester", "alice@x.com")
            .with("account", "Testing (123456789012)");
        assert_eq!(
            substitute("{{requester}} requests access to AWS account {{account}}", &vars),
            "alice@x.com requests access to AWS account Testing (123456789012)"
        );
    }

    #[test]
    fn test_unbound_placeholder_left_alone() {
        let vars = TemplateVars::new().with("a", "1");
        assert_eq!(substitute("{{a}} and {{b}}", &vars), "1 and {{b}}");
        assert_eq!(substitute("dangling {{a", &vars), "dangling {{a");
    }

    #[test]
    fn test_values_not_reexpanded() {
        let vars = TemplateVars::new()
            .with("justification", "see {{error}}")
            .with("error", "boom");
        assert_eq!(
            substitute("{{justification}} / {{error}}", &vars),
            "see {{error}} / boom"
        );
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x & 'y'")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; &#x27;y&#x27;&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_render_html_escapes_values() {
        let data = serde_json::json!({
            "requester": "<b>mallory</b>",
            "link": "<a href=\"https://team.example\">TEAM</a>",
        });
        assert_eq!(
            render_html("{{requester}} opened {{{link}}}", &data).unwrap(),
            "&lt;b&gt;mallory&lt;/b&gt; opened <a href=\"https://team.example\">TEAM</a>"
        );
    }

    #[test]
    fn test_render_html_does_not_reexpand_values() {
        let data = serde_json::json!({ "justification": "see {{error}}", "error": "boom" });
        assert_eq!(
            render_html("{{justification}}", &data).unwrap(),
            "see {{error}}"
        );
    }

    #[test]
    fn test_escape_mrkdwn() {
        assert_eq!(escape_mrkdwn("<!channel> & *bold*"), "&lt;!channel&gt; &amp; *bold*");
    }

    #[test]
    fn test_encoded_vars() {
        let vars = TemplateVars::new().with("v", "<b>").encoded(escape_mrkdwn);
        assert_eq!(vars.get("v"), Some("&lt;b&gt;"));
    }
}
