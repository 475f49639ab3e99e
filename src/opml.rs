//! OPML index of all known channels. Stateless, so it is safe to regenerate
//! unconditionally on every run.

use crate::atom::xml_escape;
use crate::types::Result;
use serde::Serialize;
use tera::{Context, Tera};

const OPML_TEMPLATE_NAME: &str = "registry.opml.xml";

const OPML_TEMPLATE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<opml version="2.0">
  <head>
    <title>{{ title }}</title>
  </head>
  <body>
    {%- for outline in outlines %}
    <outline text="{{ outline.text }}" title="{{ outline.title }}" type="rss" xmlUrl="{{ outline.xml_url }}" />
    {%- endfor %}
  </body>
</opml>
"#;

/// One channel in the registry.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelOutline {
    pub text: String,
    pub title: String,
    pub xml_url: String,
}

pub struct OpmlSerializer {
    tera: Tera,
}

impl OpmlSerializer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.set_escape_fn(xml_escape);
        tera.add_raw_template(OPML_TEMPLATE_NAME, OPML_TEMPLATE)?;
        Ok(Self { tera })
    }

    pub fn render(&self, title: &str, outlines: &[ChannelOutline]) -> Result<String> {
        let mut context = Context::new();
        context.insert("title", title);
        context.insert("outlines", outlines);
        Ok(self.tera.render(OPML_TEMPLATE_NAME, &context)?)
    }
}
