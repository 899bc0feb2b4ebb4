use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Chainable, ErrorKind, Result};
use crate::value::{Dict, Format, Toml, Value};
use crate::dict;

pub const CONFIG_FILE: &str = "site.toml";
pub const POSTS_DIR: &str = "posts";
pub const PAGES_DIR: &str = "pages";
pub const TEMPLATE_DIR: &str = "templates";
pub const ASSETS_DIR: &str = "assets";
pub const OUTPUT_DIR: &str = "build";

/// Source extensions recognized as content.
pub const CONTENT_EXTS: &[&str] = &["md", "markdown"];

/// The project file, `site.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    pub site_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub author_email: String,
    #[serde(default = "default_server_root")]
    pub server_root: String,
    pub base_url: String,
    #[serde(default = "default_preview_length")]
    pub preview_length: usize,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Free-form values exposed to templates as `site.globals`.
    #[serde(default)]
    pub globals: Dict,
}

fn default_server_root() -> String { "/".into() }
fn default_preview_length() -> usize { 200 }
fn default_parallel() -> bool { true }

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Project {
    /// Reads and validates `<root>/site.toml`.
    pub fn load(root: &Path) -> Result<Project> {
        let path = root.join(CONFIG_FILE);
        let project: Project = Toml::read(&path)
            .map_err(|e| e.with_kind(ErrorKind::Project).fatal())?;

        project.validate()
            .chain_with(|| error!("invalid project file", "path" => path.display()))?;

        Ok(project)
    }

    pub fn parse(source: &str) -> Result<Project> {
        let project: Project = Toml::from_str(source)
            .chain_with(|| error!("failed to parse project file"))?;

        project.validate()?;
        Ok(project)
    }

    /// Checks every field, reporting all problems at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = vec![];
        if self.site_name.trim().is_empty() {
            problems.push("`site_name` must not be empty");
        }

        if !self.base_url.ends_with('/') {
            problems.push("`base_url` must end with `/`");
        }

        if !is_absolute(&self.absolute(&self.base_url)) {
            problems.push("`base_url` must be absolute or resolve against an absolute `server_root`");
        }

        if !self.server_root.ends_with('/') {
            problems.push("`server_root` must end with `/`");
        }

        if !self.author_email.is_empty() && !self.author_email.contains('@') {
            problems.push("`author_email` must be an email address");
        }

        if problems.is_empty() {
            return Ok(());
        }

        let mut error = error!("project validation failed");
        for problem in problems {
            error = error!(problem).chain(error);
        }

        Err(error.with_kind(ErrorKind::Project).fatal())
    }

    /// Resolves a site URL against `server_root` unless it is already absolute.
    pub fn absolute(&self, url: &str) -> String {
        if is_absolute(url) {
            return url.to_string();
        }

        format!("{}/{}", self.server_root.trim_end_matches('/'), url.trim_start_matches('/'))
    }

    /// The `site` binding handed to every template.
    pub fn site(&self) -> Arc<Dict> {
        Arc::new(dict! {
            "name" => self.site_name.as_str(),
            "description" => self.description.as_str(),
            "author" => self.author.as_str(),
            "author_email" => self.author_email.as_str(),
            "server_root" => self.server_root.as_str(),
            "base_url" => self.base_url.as_str(),
            "globals" => Value::from(self.globals.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        site_name = "Plume"
        base_url = "https://example.com/"
    "#;

    #[test]
    fn defaults_fill_optional_fields() {
        let project = Project::parse(MINIMAL).unwrap();
        assert_eq!(project.preview_length, 200);
        assert_eq!(project.server_root, "/");
        assert!(project.parallel);
        assert!(project.globals.is_empty());
    }

    #[test]
    fn globals_reach_the_site_binding() {
        let source = format!("{MINIMAL}\n[globals]\nnav = [\"home\", \"about\"]\n");
        let site = Value::from(Project::parse(&source).unwrap().site());
        assert_eq!(site.find("name").and_then(Value::as_str), Some("Plume"));

        let nav = site.find("globals.nav").and_then(Value::as_slice).unwrap();
        assert_eq!(nav[1].as_str(), Some("about"));
    }

    #[test]
    fn validation_reports_every_problem() {
        let error = Project::parse(r#"
            site_name = ""
            base_url = "https://example.com"
            server_root = "/blog"
            author_email = "nobody"
        "#).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Project);
        assert!(error.is_fatal());

        let line = error.line();
        assert!(line.starts_with("project_validator: "));
        for field in ["site_name", "base_url", "server_root", "author_email"] {
            assert!(line.contains(field), "{line}");
        }
    }

    #[test]
    fn relative_base_url_needs_absolute_server_root() {
        let error = Project::parse(r#"
            site_name = "Plume"
            base_url = "/"
        "#).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Project);
        assert!(error.line().contains("absolute"), "{}", error.line());

        let project = Project::parse(r#"
            site_name = "Plume"
            base_url = "/blog/"
            server_root = "https://example.com/"
        "#).unwrap();

        assert_eq!(project.absolute(&project.base_url), "https://example.com/blog/");
        assert_eq!(project.absolute("/blog/posts/a.html"), "https://example.com/blog/posts/a.html");
        assert_eq!(project.absolute("http://other.org/x"), "http://other.org/x");
    }

    #[test]
    fn unparsable_file_is_a_project_error() {
        let error = Project::parse("site_name = ").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Project);

        let error = Project::parse("base_url = \"https://example.com/\"").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Project);
    }

    #[test]
    fn load_reads_project_root() {
        let tmp = tempfile::tempdir().unwrap();
        let error = Project::load(tmp.path()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Project);
        assert!(error.is_fatal());

        std::fs::write(tmp.path().join(CONFIG_FILE), MINIMAL).unwrap();
        assert_eq!(Project::load(tmp.path()).unwrap().site_name, "Plume");
    }
}
