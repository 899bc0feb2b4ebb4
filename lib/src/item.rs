use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{POSTS_DIR, PAGES_DIR};
use crate::post::Extracted;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Post,
    Page,
}

impl Kind {
    /// The content template items of this kind render through.
    pub fn template(self) -> &'static str {
        match self {
            Kind::Post => "post.html",
            Kind::Page => "page.html",
        }
    }

    pub fn source_dir(self) -> &'static str {
        match self {
            Kind::Post => POSTS_DIR,
            Kind::Page => PAGES_DIR,
        }
    }
}

/// One source file on its way to becoming one output page.
///
/// Created by the first pass with everything but `rendered`, which the second
/// pass fills in.
#[derive(Debug, Clone)]
pub struct ContentItem {
    pub kind: Kind,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub url: Arc<str>,
    pub title: Arc<str>,
    pub preview: Arc<str>,
    /// Rendered markdown body.
    pub body: Arc<str>,
    /// Post metadata; `None` for pages.
    pub post: Option<Extracted>,
    pub rendered: Option<String>,
}

/// Maps a source path under `<project>/<kind dir>` to its output location and
/// its URL.
///
/// Pages keep their relative path with an `.html` extension. Posts keep their
/// subdirectory but are named by slug, dropping the timestamp.
#[derive(Debug, Clone)]
pub struct Layout<'a> {
    pub project: &'a Path,
    pub output: &'a Path,
    pub base_url: &'a str,
}

impl Layout<'_> {
    /// The relative output path of `source`, `None` if it lies outside the
    /// source directory of `kind`.
    pub fn relative(&self, kind: Kind, source: &Path, slug: Option<&str>) -> Option<PathBuf> {
        let relative = source.strip_prefix(self.project.join(kind.source_dir())).ok()?;
        let mut relative = match (kind, slug) {
            (Kind::Post, Some(slug)) => Path::new(POSTS_DIR).join(relative.with_file_name(slug)),
            (Kind::Post, None) => return None,
            (Kind::Page, _) => relative.to_path_buf(),
        };

        relative.set_extension("html");
        Some(relative)
    }

    pub fn destination(&self, relative: &Path) -> PathBuf {
        self.output.join(relative)
    }

    pub fn url(&self, relative: &Path) -> Arc<str> {
        let path = relative.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        format!("{}{path}", self.base_url).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Layout<'static> {
        Layout {
            project: Path::new("/site"),
            output: Path::new("/site/build"),
            base_url: "https://example.com/",
        }
    }

    #[test]
    fn posts_are_named_by_slug() {
        let source = Path::new("/site/posts/2024/2024-03-10-1530-hello-world.md");
        let rel = layout().relative(Kind::Post, source, Some("hello-world")).unwrap();

        assert_eq!(rel, Path::new("posts/2024/hello-world.html"));
        assert_eq!(layout().destination(&rel), Path::new("/site/build/posts/2024/hello-world.html"));
        assert_eq!(&*layout().url(&rel), "https://example.com/posts/2024/hello-world.html");
    }

    #[test]
    fn pages_keep_their_relative_path() {
        let rel = layout().relative(Kind::Page, Path::new("/site/pages/about/team.md"), None).unwrap();
        assert_eq!(rel, Path::new("about/team.html"));
    }

    #[test]
    fn foreign_sources_have_no_destination() {
        assert!(layout().relative(Kind::Page, Path::new("/elsewhere/a.md"), None).is_none());
        assert!(layout().relative(Kind::Post, Path::new("/site/posts/a.md"), None).is_none());
    }
}
