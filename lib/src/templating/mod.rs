pub mod minijinja;

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::value::{Dict, Value};

/// The outer template every page is embedded into.
pub const LAYOUT: &str = "layout.html";

/// Templates a project must provide.
pub const REQUIRED: &[&str] = &[LAYOUT, "post.html", "page.html"];

/// Optional listing templates.
pub const INDEX: &str = "index.html";
pub const TAG: &str = "tag.html";

pub trait EngineInit {
    type Engine: Engine + 'static;

    /// Compiles every template under `root`. Any failure, including a missing
    /// required template, is fatal.
    fn init(root: &Path) -> Result<Self::Engine>;
}

pub trait Engine: Send + Sync + Debug {
    fn has_template(&self, name: &str) -> bool;

    /// Renders `name` against `locals`, which shadow `globals`.
    fn render(&self, name: &str, globals: &Arc<Dict>, locals: Dict) -> Result<String>;

    /// Renders `template` with `locals`, then embeds the result as `content`
    /// in the layout alongside `page`.
    fn render_page(
        &self,
        template: &str,
        globals: &Arc<Dict>,
        locals: Dict,
        mut page: Dict,
    ) -> Result<String> {
        let content = self.render(template, globals, locals)?;
        page.insert("content".into(), Value::html(content));
        self.render(LAYOUT, globals, page)
    }
}
