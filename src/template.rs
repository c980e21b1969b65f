use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use minijinja::{path_loader, Environment};
use serde::Serialize;

use crate::error::Result;
use crate::value::Value;

/// Named variables substituted into a SQL template
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TemplateContext {
    pub values: BTreeMap<String, Value>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named value
    pub fn with_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }
}

/// Renders template files found under one directory.
pub struct TemplateRenderer {
    dir: PathBuf,
    env: Environment<'static>,
}

impl TemplateRenderer {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let mut env = Environment::new();
        env.set_loader(path_loader(&dir));
        Self { dir, env }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn render<C: Serialize>(&self, template_file: &str, context: C) -> Result<String> {
        let template = self.env.get_template(template_file)?;
        Ok(template.render(context)?)
    }
}

/// Render `template_file` from `template_dir` with `context`.
pub fn render_template<C: Serialize>(
    template_file: &str,
    template_dir: impl AsRef<Path>,
    context: C,
) -> Result<String> {
    TemplateRenderer::new(template_dir).render(template_file, context)
}
