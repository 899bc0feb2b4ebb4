//! The RSS 2.0 feed of a site's posts.

use rss::{CategoryBuilder, ChannelBuilder, GuidBuilder, ItemBuilder};
use rss::validation::Validate;

use crate::bindings::PostRef;
use crate::config::Project;
use crate::error::{Chainable, Result};

pub const FEED_FILE: &str = "feed.xml";

/// Renders `posts`, already in listing order, as an RSS channel.
pub fn render(project: &Project, posts: &[PostRef]) -> Result<String> {
    let author = match (project.author.is_empty(), project.author_email.is_empty()) {
        (_, true) => None,
        (true, false) => Some(project.author_email.clone()),
        (false, false) => Some(format!("{} ({})", project.author_email, project.author)),
    };

    let items: Vec<_> = posts.iter()
        .map(|post| {
            let link = project.absolute(&post.url);
            let categories = post.tags.iter()
                .map(|tag| CategoryBuilder::default()
                    .name(tag.name.to_string())
                    .domain(Some(project.absolute(&tag.url)))
                    .build())
                .collect::<Vec<_>>();

            ItemBuilder::default()
                .title(Some(post.title.to_string()))
                .link(Some(link.clone()))
                .guid(Some(GuidBuilder::default()
                    .permalink(true)
                    .value(link)
                    .build()))
                .description(Some(post.preview.to_string()))
                .pub_date(Some(post.timestamp.and_utc().to_rfc2822()))
                .author(author.clone())
                .categories(categories)
                .build()
        })
        .collect();

    let channel = ChannelBuilder::default()
        .title(project.site_name.clone())
        .link(project.absolute(&project.base_url))
        .description(project.description.clone())
        .managing_editor(author)
        .generator(Some(format!("plume {}", env!("CARGO_PKG_VERSION"))))
        .items(items)
        .build();

    channel.validate().chain_with(|| error!("generated feed is invalid"))?;
    Ok(channel.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use crate::post::Tag;

    fn project() -> Project {
        Project::parse(r#"
            site_name = "Plume"
            description = "Notes"
            author = "Ada"
            author_email = "ada@example.com"
            base_url = "https://example.com/"
        "#).unwrap()
    }

    #[test]
    fn feed_lists_posts_with_dates_and_tags() {
        let post = PostRef {
            title: "Hello & Welcome".into(),
            slug: "hello".into(),
            url: "https://example.com/posts/hello.html".into(),
            timestamp: NaiveDateTime::parse_from_str("2024-03-10 15:30", "%Y-%m-%d %H:%M").unwrap(),
            tags: vec![Tag::new("rust", "https://example.com/")],
            preview: "Body".into(),
        };

        let xml = render(&project(), &[post]).unwrap();
        assert!(xml.contains("<title>Plume</title>"));
        assert!(xml.contains("<title>Hello &amp; Welcome</title>"));
        assert!(xml.contains("<pubDate>Sun, 10 Mar 2024 15:30:00 +0000</pubDate>"));
        assert!(xml.contains("ada@example.com (Ada)"));
        assert!(xml.contains(">rust</category>"));
    }

    #[test]
    fn relative_urls_resolve_against_server_root() {
        let project = Project::parse(r#"
            site_name = "Plume"
            base_url = "/blog/"
            server_root = "https://example.com/"
        "#).unwrap();

        let post = PostRef {
            title: "Hello".into(),
            slug: "hello".into(),
            url: "/blog/posts/hello.html".into(),
            timestamp: NaiveDateTime::parse_from_str("2024-03-10 15:30", "%Y-%m-%d %H:%M").unwrap(),
            tags: vec![Tag::new("rust", "/blog/")],
            preview: "Body".into(),
        };

        let xml = render(&project, &[post]).unwrap();
        assert!(xml.contains("<link>https://example.com/blog/</link>"));
        assert!(xml.contains("<link>https://example.com/blog/posts/hello.html</link>"));
        assert!(xml.contains("domain=\"https://example.com/blog/tags/rust\""), "{xml}");
    }

    #[test]
    fn empty_feed_is_valid() {
        let xml = render(&project(), &[]).unwrap();
        assert!(xml.contains("<link>https://example.com/</link>"));
        assert!(!xml.contains("<item>"));
    }
}
