//! The build-scoped bindings store.
//!
//! [`Bindings`] is written concurrently during the first pass: site-wide
//! values by key, and posts and pages by registration. [`Bindings::freeze()`]
//! consumes the writer at the barrier and yields a [`Frozen`] view whose
//! indices are sorted; nothing can be written to a `Frozen`.

use std::borrow::Borrow;
use std::cmp::Reverse;
use std::sync::Arc;

use chrono::NaiveDateTime;
use dashmap::DashMap;

use crate::post::{timestamp_value, Tag};
use crate::value::{Dict, Value};
use crate::dict;

type Hasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;

pub trait BindingKey: 'static {
    const KEY: &'static str;

    type Value: TryFrom<Value> + Into<Value>;
}

#[macro_export]
macro_rules! define_binding_key {
    ($($(#[$attr:meta])* $v:vis $T:ident : $key:literal => $V:ty),+ $(,)?) => {
        $(
            $(#[$attr])*
            #[derive(Debug, Clone, Copy)]
            $v struct $T;

            impl $crate::bindings::BindingKey for $T {
                const KEY: &'static str = $key;
                type Value = $V;
            }
        )+
    }
}

define_binding_key! {
    /// Project metadata: name, description, author, URLs, and `globals`.
    pub Site: "site" => Arc<Dict>,
    /// Every post, newest first. Set at freeze.
    pub Posts: "posts" => Value,
    /// Every tag by name, each with its posts. Set at freeze.
    pub Tags: "tags" => Value,
    /// Every page, ordered by URL. Set at freeze.
    pub Pages: "pages" => Value,
}

/// What a listing needs to know about a post.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRef {
    pub title: Arc<str>,
    pub slug: Arc<str>,
    pub url: Arc<str>,
    pub timestamp: NaiveDateTime,
    pub tags: Vec<Tag>,
    pub preview: Arc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    pub title: Arc<str>,
    pub url: Arc<str>,
}

/// A tag and the posts carrying it, newest first.
#[derive(Debug, Clone)]
pub struct TagEntry {
    pub tag: Tag,
    pub posts: Vec<PostRef>,
}

#[derive(Debug)]
struct TagSlot {
    tag: Tag,
    posts: Vec<usize>,
}

/// The writable store, shared by reference across first-pass units.
#[derive(Debug, Default)]
pub struct Bindings {
    values: DashMap<Arc<str>, Value, Hasher>,
    posts: boxcar::Vec<PostRef>,
    pages: boxcar::Vec<PageRef>,
    tags: DashMap<Arc<str>, TagSlot, Hasher>,
}

/// The read-only store handed to every second-pass unit.
#[derive(Debug, Clone)]
pub struct Frozen {
    context: Arc<Dict>,
    posts: Arc<[PostRef]>,
    tags: Arc<[TagEntry]>,
    pages: Arc<[PageRef]>,
}

impl Bindings {
    pub fn new() -> Self {
        Bindings::default()
    }

    pub fn insert<K, V>(&self, _: K, value: V) -> Option<Value>
        where K: BindingKey, V: Into<K::Value>
    {
        let value: K::Value = value.into();
        self.insert_raw(K::KEY, value)
    }

    pub fn insert_raw<K, V>(&self, key: K, value: V) -> Option<Value>
        where K: Into<Arc<str>> + Borrow<str>, V: Into<Value>
    {
        self.values.insert(key.into(), value.into())
    }

    /// Records `post` in the post index and in the index of each of its tags.
    pub fn register_post(&self, post: PostRef) {
        let tags = post.tags.clone();
        let index = self.posts.push(post);
        for tag in tags {
            self.tags.entry(tag.name.clone())
                .or_insert_with(|| TagSlot { tag, posts: vec![] })
                .posts
                .push(index);
        }
    }

    pub fn register_page(&self, page: PageRef) {
        self.pages.push(page);
    }

    pub fn post_count(&self) -> usize {
        self.posts.count()
    }

    /// Ends the write phase. Posts are ordered newest first with ties broken
    /// by slug then URL, tags by name, and pages by URL, so the result does
    /// not depend on the order in which units registered.
    pub fn freeze(self) -> Frozen {
        let Bindings { values, posts, pages, tags } = self;

        let mut order: Vec<(usize, PostRef)> = posts.into_iter().enumerate().collect();
        order.sort_by(|(_, a), (_, b)| {
            (Reverse(a.timestamp), &a.slug, &a.url).cmp(&(Reverse(b.timestamp), &b.slug, &b.url))
        });

        let mut rank = vec![0; order.len()];
        for (position, (index, _)) in order.iter().enumerate() {
            rank[*index] = position;
        }

        let posts: Vec<PostRef> = order.into_iter().map(|(_, post)| post).collect();
        let post_values: Vec<Value> = posts.iter().map(Value::from).collect();

        let mut tags: Vec<TagEntry> = tags.into_iter()
            .map(|(_, slot)| {
                let mut ranks: Vec<usize> = slot.posts.iter().map(|&i| rank[i]).collect();
                ranks.sort_unstable();
                TagEntry {
                    tag: slot.tag,
                    posts: ranks.into_iter().map(|r| posts[r].clone()).collect(),
                }
            })
            .collect();

        tags.sort_by(|a, b| a.tag.cmp(&b.tag));

        let mut pages: Vec<PageRef> = pages.into_iter().collect();
        pages.sort_by(|a, b| a.url.cmp(&b.url));

        let mut context: Dict = values.into_iter().collect();
        context.insert(Posts::KEY.into(), post_values.into_iter().collect());
        context.insert(Tags::KEY.into(), tags.iter().map(Value::from).collect());
        context.insert(Pages::KEY.into(), pages.iter().map(Value::from).collect());

        tracing::debug!(posts = posts.len(), tags = tags.len(), pages = pages.len(), "bindings frozen");
        Frozen {
            context: Arc::new(context),
            posts: posts.into(),
            tags: tags.into(),
            pages: pages.into(),
        }
    }
}

impl Frozen {
    pub fn get_raw(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    pub fn get<K: BindingKey>(&self, _: K) -> Option<Result<K::Value, Value>> {
        let value = self.get_raw(K::KEY)?.clone();
        Some(value.clone().try_into().map_err(|_| value))
    }

    /// Every binding, as the global scope of a template context.
    pub fn context(&self) -> &Arc<Dict> {
        &self.context
    }

    pub fn posts(&self) -> &[PostRef] {
        &self.posts
    }

    pub fn tags(&self) -> &[TagEntry] {
        &self.tags
    }

    pub fn pages(&self) -> &[PageRef] {
        &self.pages
    }
}

impl From<&PostRef> for Value {
    fn from(post: &PostRef) -> Value {
        Value::from(dict! {
            "title" => post.title.clone(),
            "slug" => post.slug.clone(),
            "url" => post.url.clone(),
            "date" => timestamp_value(&post.timestamp),
            "tags" => post.tags.iter().map(Value::from).collect::<Value>(),
            "preview" => post.preview.clone(),
        })
    }
}

impl From<&PageRef> for Value {
    fn from(page: &PageRef) -> Value {
        Value::from(dict! {
            "title" => page.title.clone(),
            "url" => page.url.clone(),
        })
    }
}

impl From<&TagEntry> for Value {
    fn from(entry: &TagEntry) -> Value {
        Value::from(dict! {
            "name" => entry.tag.name.clone(),
            "url" => entry.tag.url.clone(),
            "posts" => entry.posts.iter().map(Value::from).collect::<Value>(),
        })
    }
}
