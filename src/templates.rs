// ABOUTME: Template resolution with a compile-once cache per template slot
// ABOUTME: Handlebars sits behind a narrow engine trait so it can be swapped

use crate::{
    util::{link_alias, slugify},
    Error, Result,
};
use handlebars::{handlebars_helper, Handlebars, Template};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const INDEX_PATH: &str = "indexPathTemplate";
pub const INDEX_FILE: &str = "indexFileTemplate";
pub const HIGHLIGHT_PATH: &str = "highlightPathTemplate";
pub const HIGHLIGHT_FILE: &str = "highlightFileTemplate";

const DEFAULT_INDEX_PATH: &str = include_str!("../templates/index.path.hbs");
const DEFAULT_INDEX_FILE: &str = include_str!("../templates/index.file.hbs");
const DEFAULT_HIGHLIGHT_PATH: &str = include_str!("../templates/highlight.path.hbs");
const DEFAULT_HIGHLIGHT_FILE: &str = include_str!("../templates/highlight.file.hbs");

/// The four user-editable templates that drive a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSet {
    #[serde(rename = "indexPathTemplate")]
    pub index_path: String,
    #[serde(rename = "indexFileTemplate")]
    pub index_file: String,
    #[serde(rename = "highlightPathTemplate")]
    pub highlight_path: String,
    #[serde(rename = "highlightFileTemplate")]
    pub highlight_file: String,
}

impl Default for TemplateSet {
    fn default() -> Self {
        TemplateSet {
            index_path: DEFAULT_INDEX_PATH.trim().to_string(),
            index_file: DEFAULT_INDEX_FILE.to_string(),
            highlight_path: DEFAULT_HIGHLIGHT_PATH.trim().to_string(),
            highlight_file: DEFAULT_HIGHLIGHT_FILE.to_string(),
        }
    }
}

pub trait TemplateEngine {
    type Compiled;

    fn compile(&mut self, source: &str) -> Result<Self::Compiled>;

    fn render(&self, compiled: &Self::Compiled, context: &Value) -> Result<String>;
}

handlebars_helper!(slugify_helper: |text: str| slugify(text));
handlebars_helper!(link_alias_helper: |text: str| link_alias(text));

/// Handlebars with the `slugify` and `link_alias` helpers registered.
/// Compiled templates live in the registry under generated names; the
/// handle is that name.
pub struct HandlebarsEngine {
    registry: Handlebars<'static>,
    compiled: usize,
}

impl HandlebarsEngine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_helper("slugify", Box::new(slugify_helper));
        registry.register_helper("link_alias", Box::new(link_alias_helper));
        HandlebarsEngine {
            registry,
            compiled: 0,
        }
    }
}

impl Default for HandlebarsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for HandlebarsEngine {
    type Compiled = String;

    fn compile(&mut self, source: &str) -> Result<String> {
        let template = Template::compile(source).map_err(|e| Error::Template(e.to_string()))?;
        self.compiled += 1;
        let handle = format!("template-{}", self.compiled);
        self.registry.register_template(&handle, template);
        Ok(handle)
    }

    fn render(&self, compiled: &String, context: &Value) -> Result<String> {
        self.registry
            .render(compiled, context)
            .map_err(|e| Error::Template(e.to_string()))
    }
}

/// Caches compiled templates under (template name, source).
///
/// Entries are never evicted. The cache is keyed by the four template slots
/// and the sources they held during this resolver's lifetime, so it stays
/// small; settings changes replace the resolver instead of invalidating.
pub struct TemplateResolver<E: TemplateEngine = HandlebarsEngine> {
    engine: E,
    cache: HashMap<(String, String), E::Compiled>,
}

impl<E: TemplateEngine> TemplateResolver<E> {
    pub fn new(engine: E) -> Self {
        TemplateResolver {
            engine,
            cache: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, name: &str, source: &str, context: &Value) -> Result<String> {
        let key = (name.to_string(), source.to_string());
        if !self.cache.contains_key(&key) {
            log::debug!("compiling template {}", name);
            let compiled = self.engine.compile(source)?;
            self.cache.insert(key.clone(), compiled);
        }

        match self.cache.get(&key) {
            Some(compiled) => self.engine.render(compiled, context),
            None => Err(Error::Template(format!("template {} missing from cache", name))),
        }
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

impl<E: TemplateEngine + Default> Default for TemplateResolver<E> {
    fn default() -> Self {
        Self::new(E::default())
    }
}
