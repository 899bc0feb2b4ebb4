use std::path::Path;

use plume::config::{ASSETS_DIR, CONFIG_FILE, PAGES_DIR, POSTS_DIR, TEMPLATE_DIR};
use plume::error::{ErrorKind, Result};
use plume::{error, fs};

const SITE: &str = r#"site_name = "My Blog"
description = "Notes and essays."
author = "Anonymous"
author_email = "author@example.com"
base_url = "http://localhost:8000/"

[globals]
copyright = "All rights reserved."
"#;

const LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{{ title }} | {{ site.name }}</title>
  <link rel="stylesheet" href="{{ site.base_url }}css/site.css">
  <link rel="alternate" type="application/rss+xml" href="{{ site.base_url }}feed.xml">
</head>
<body>
  <header><a href="{{ site.base_url }}">{{ site.name }}</a></header>
  {{ content }}
  <footer>{{ site.globals.copyright }}</footer>
</body>
</html>
"#;

const POST: &str = r#"<article>
  <h1>{{ title }}</h1>
  <time>{{ date | date("%B %d, %Y") }}</time>
  {{ body }}
  {% if tags %}<ul class="tags">
  {% for tag in tags %}<li><a href="{{ tag.url }}">{{ tag.name }}</a></li>{% endfor %}
  </ul>{% endif %}
</article>
"#;

const PAGE: &str = r#"<main>
  {{ body }}
</main>
"#;

const INDEX: &str = r#"<main>
  {% for post in posts %}
  <section>
    <h2><a href="{{ post.url }}">{{ post.title }}</a></h2>
    <p>{{ post.preview }}</p>
  </section>
  {% endfor %}
  {% if pages %}<nav>
  {% for page in pages %}<a href="{{ page.url }}">{{ page.title }}</a>{% endfor %}
  </nav>{% endif %}
</main>
"#;

const TAG: &str = r#"<main>
  <h1>Posts tagged "{{ tag.name | deslug }}"</h1>
  <ul>
  {% for post in tag.posts %}<li><a href="{{ post.url }}">{{ post.title }}</a></li>{% endfor %}
  </ul>
</main>
"#;

const POST_BODY: &str = "# Hello, world\n# meta\nThis is the first post. Edit or delete it, then run `quill`.\n";

const ABOUT: &str = "# About\nThis blog is built with quill.\n";

const CSS: &str = "body { max-width: 40em; margin: 0 auto; font-family: sans-serif; }\n";

/// Writes a minimal buildable project into `dir`, which must be empty or
/// missing.
pub fn scaffold(dir: &Path) -> Result<()> {
    let occupied = std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);

    if occupied {
        return Err(error!("refusing to initialize a non-empty directory", "path" => dir.display())
            .with_kind(ErrorKind::Project));
    }

    let stamp = chrono::Local::now().format("%Y-%m-%d-%H%M");
    let files = [
        (CONFIG_FILE.to_owned(), SITE),
        (format!("{TEMPLATE_DIR}/layout.html"), LAYOUT),
        (format!("{TEMPLATE_DIR}/post.html"), POST),
        (format!("{TEMPLATE_DIR}/page.html"), PAGE),
        (format!("{TEMPLATE_DIR}/index.html"), INDEX),
        (format!("{TEMPLATE_DIR}/tag.html"), TAG),
        (format!("{POSTS_DIR}/{stamp}-hello-world.md"), POST_BODY),
        (format!("{PAGES_DIR}/about.md"), ABOUT),
        (format!("{ASSETS_DIR}/css/site.css"), CSS),
    ];

    for (path, contents) in files {
        fs::write(&dir.join(path), contents)?;
    }

    tracing::info!(path = %dir.display(), "initialized project");
    Ok(())
}
