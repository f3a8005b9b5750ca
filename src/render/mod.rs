//! Server-side page templates
//!
//! Templates are compiled into the binary from `templates/` and can be
//! replaced at startup with a directory on disk.

use anyhow::{anyhow, Context, Result};
use rust_embed::RustEmbed;
use tera::Tera;

pub use tera::Context as TemplateContext;

#[derive(RustEmbed)]
#[folder = "templates"]
struct EmbeddedTemplates;

pub struct Templates {
    tera: Tera,
}

impl Templates {
    /// Templates from `dir` when given, otherwise the embedded set
    pub fn load(dir: Option<&str>) -> Result<Self> {
        match dir {
            Some(dir) => Self::from_dir(dir),
            None => Self::embedded(),
        }
    }

    pub fn embedded() -> Result<Self> {
        let mut sources = Vec::new();

        for name in EmbeddedTemplates::iter() {
            let file = EmbeddedTemplates::get(&name)
                .ok_or_else(|| anyhow!("embedded template '{}' disappeared", name))?;
            let source = String::from_utf8(file.data.into_owned())
                .with_context(|| format!("template '{}' is not UTF-8", name))?;
            sources.push((name.to_string(), source));
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(sources)
            .context("failed to compile embedded templates")?;

        Ok(Self { tera })
    }

    pub fn from_dir(dir: &str) -> Result<Self> {
        let pattern = format!("{}/**/*.html", dir.trim_end_matches('/'));
        let tera = Tera::new(&pattern)
            .with_context(|| format!("failed to load templates from '{}'", dir))?;

        Ok(Self { tera })
    }

    pub fn render(&self, name: &str, context: &TemplateContext) -> tera::Result<String> {
        self.tera.render(name, context)
    }
}
