//! Template rendering for configured names and line-item records.
//!
//! Two rendering modes share one engine:
//! - name templates ("Prebid {{bidder_code}} {{media_type}} {{cpm}}") render
//!   straight to strings;
//! - the line-item record template renders to YAML which is then parsed into
//!   ready-to-create [`Record`]s.
//!
//! Strict mode is on: a typo'd placeholder fails the run instead of silently
//! rendering an empty string into an object name.

use anyhow::Context;
use handlebars::{handlebars_helper, no_escape, Handlebars};
use lineforge_types::Record;
use serde::Serialize;
use serde_json::Value;

// Inlines any context value as JSON, which is valid YAML wherever a scalar
// or flow collection is expected. This is how ids and id arrays land inside
// the record template without per-field quoting rules.
handlebars_helper!(json: |v: Json| serde_json::to_string(v).unwrap_or_default());

/// The shared template engine.
pub struct Renderer {
    hbs: Handlebars<'static>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        let mut hbs = Handlebars::new();
        hbs.set_strict_mode(true);
        // Output is YAML and plain names, not HTML.
        hbs.register_escape_fn(no_escape);
        hbs.register_helper("json", Box::new(json));
        Self { hbs }
    }

    /// Render a name template against a context.
    pub fn render_name(&self, template: &str, ctx: &impl Serialize) -> anyhow::Result<String> {
        self.hbs
            .render_template(template, ctx)
            .with_context(|| format!("render name template '{}'", template))
    }

    /// Render a record template against a context and parse the YAML result.
    pub fn render_record(&self, template: &str, ctx: &impl Serialize) -> anyhow::Result<Record> {
        let rendered = self
            .hbs
            .render_template(template, ctx)
            .context("render record template")?;
        let value: Value =
            serde_yaml::from_str(&rendered).context("parse rendered record template as YAML")?;
        Record::from_value(value).context("record template did not render to a mapping")
    }

    /// Render one record per context, in context order.
    pub fn render_records(
        &self,
        template: &str,
        ctxs: &[Value],
    ) -> anyhow::Result<Vec<Record>> {
        ctxs.iter()
            .map(|ctx| self.render_record(template, ctx))
            .collect()
    }
}
