use std::path::Path;
use std::sync::Arc;

use minijinja::{Environment, UndefinedBehavior};
use minijinja::value::Value;

use crate::error::{Chainable, ErrorKind, Result};
use crate::templating::{Engine, EngineInit, REQUIRED};
use crate::value::Dict;

const TEMPLATE_EXTS: &[&str] = &["html", "xml", "txt", "jinja"];

#[derive(Debug)]
pub struct MiniJinjaEngine {
    env: Environment<'static>,
}

/// A template context: item locals over the frozen globals.
#[derive(Debug)]
pub struct Scope {
    pub locals: Dict,
    pub globals: Arc<Dict>,
}

impl MiniJinjaEngine {
    /// Compiles templates from `(name, source)` pairs.
    pub fn from_sources<I, N, S>(sources: I) -> Result<Self>
        where I: IntoIterator<Item = (N, S)>, N: Into<String>, S: Into<String>
    {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.add_filter("deslug", ext::deslug);
        env.add_filter("date", ext::date);

        for (name, source) in sources {
            let (name, source): (String, String) = (name.into(), source.into());
            env.add_template_owned(name.clone(), source)
                .map_err(|e| crate::error::Error::from(e).fatal())
                .chain_with(|| error!("failed to compile template", "template" => name))?;
        }

        for required in REQUIRED {
            if env.get_template(required).is_err() {
                return Err(error!("missing required template", "template" => required)
                    .with_kind(ErrorKind::Template)
                    .fatal());
            }
        }

        Ok(MiniJinjaEngine { env })
    }
}

impl EngineInit for MiniJinjaEngine {
    type Engine = Self;

    fn init(root: &Path) -> Result<Self::Engine> {
        let mut sources = vec![];
        let files = crate::fs::discover(root, TEMPLATE_EXTS)
            .map_err(|e| e.with_kind(ErrorKind::Template).fatal())?;

        for path in files {
            let Ok(relative) = path.strip_prefix(root) else { continue };
            let name = relative.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let source = crate::fs::read(&path).map_err(|e| e.fatal())?;
            tracing::debug!(template = %name, "loaded template");
            sources.push((name, source));
        }

        MiniJinjaEngine::from_sources(sources)
    }
}

impl Engine for MiniJinjaEngine {
    fn has_template(&self, name: &str) -> bool {
        self.env.get_template(name).is_ok()
    }

    fn render(&self, name: &str, globals: &Arc<Dict>, locals: Dict) -> Result<String> {
        let template = self.env.get_template(name)?;
        let scope = Scope { locals, globals: globals.clone() };
        Ok(template.render(Value::from_object(scope))?)
    }
}

mod ext {
    use chrono::{NaiveDate, NaiveDateTime};
    use minijinja::{Error, ErrorKind};

    pub fn deslug(value: &str) -> String {
        value.replace('-', " ")
    }

    pub fn date(value: &str, fmt: &str) -> Result<String, Error> {
        let datetime = value.parse::<NaiveDateTime>()
            .or_else(|_| value.parse::<NaiveDate>().map(|d| d.and_time(Default::default())))
            .map_err(|e| Error::new(
                ErrorKind::InvalidOperation,
                format!("failed to parse {value}: {e}")
            ))?;

        Ok(datetime.format(fmt).to_string())
    }
}

mod value_object {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use minijinja::value::{Enumerator, Object, ObjectRepr, Value};

    use super::Scope;
    use crate::value;

    #[derive(Debug)]
    struct Dict(Arc<value::Dict>);

    #[derive(Debug)]
    struct Array(Arc<Vec<value::Value>>);

    impl Object for Dict {
        fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
            self.0.get(key.as_str()?).map(Value::from)
        }

        fn enumerate(self: &Arc<Self>) -> Enumerator {
            Enumerator::Values(self.0.keys().cloned().map(Value::from).collect())
        }
    }

    impl Object for Array {
        fn repr(self: &Arc<Self>) -> ObjectRepr {
            ObjectRepr::Seq
        }

        fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
            self.0.get(key.as_usize()?).map(Value::from)
        }

        fn enumerate(self: &Arc<Self>) -> Enumerator {
            Enumerator::Seq(self.0.len())
        }
    }

    impl Object for Scope {
        fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
            let key = key.as_str()?;
            self.locals.get(key)
                .or_else(|| self.globals.get(key))
                .map(Value::from)
        }

        fn enumerate(self: &Arc<Self>) -> Enumerator {
            let keys: BTreeSet<_> = self.locals.keys().chain(self.globals.keys()).collect();
            Enumerator::Values(keys.into_iter().cloned().map(Value::from).collect())
        }
    }

    impl From<&value::Value> for Value {
        fn from(value: &value::Value) -> Self {
            use crate::value::Value as V;

            match value {
                V::Null => Value::from(()),
                V::Bool(b) => Value::from(*b),
                V::Int(n) => Value::from(*n),
                V::Float(n) => Value::from(*n),
                V::String(s) => Value::from(s.clone()),
                V::Html(s) => Value::from_safe_string(s.to_string()),
                V::Array(a) => Value::from_object(Array(a.clone())),
                V::Dict(d) => Value::from_object(Dict(d.clone())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use crate::dict;

    fn engine(extra: &[(&str, &str)]) -> Result<MiniJinjaEngine> {
        let mut sources = vec![
            ("layout.html", "<title>{{ title }}</title>{{ content }}"),
            ("post.html", "<h1>{{ title }}</h1>{{ body }}"),
            ("page.html", "{{ body }}"),
        ];

        sources.extend_from_slice(extra);
        MiniJinjaEngine::from_sources(sources.iter().copied())
    }

    #[test]
    fn locals_shadow_globals() {
        let engine = engine(&[("t.html", "{{ site.name }}/{{ title }}")]).unwrap();
        let globals = Arc::new(dict! {
            "site" => Value::from(dict! { "name" => "Plume" }),
            "title" => "global",
        });

        let out = engine.render("t.html", &globals, dict! { "title" => "local" }).unwrap();
        assert_eq!(out, "Plume/local");

        let out = engine.render("t.html", &globals, Dict::new()).unwrap();
        assert_eq!(out, "Plume/global");
    }

    #[test]
    fn page_composition_keeps_inner_html_unescaped() {
        let engine = engine(&[]).unwrap();
        let globals = Arc::new(Dict::new());
        let locals = dict! { "title" => "A & B", "body" => Value::html("<p>hi</p>") };
        let page = dict! { "title" => "A & B" };

        let out = engine.render_page("post.html", &globals, locals, page).unwrap();
        assert_eq!(out, "<title>A &amp; B</title><h1>A &amp; B</h1><p>hi</p>");
    }

    #[test]
    fn sequences_iterate_and_filters_apply() {
        let source = "{% for p in posts %}{{ p.slug | deslug }}@{{ p.date | date('%Y') }};{% endfor %}{{ posts | length }}";
        let engine = engine(&[("list.html", source)]).unwrap();
        let posts: Value = vec![
            Value::from(dict! { "slug" => "hello-world", "date" => "2024-03-10T15:30:00" }),
            Value::from(dict! { "slug" => "second", "date" => "2023-01-01T00:00:00" }),
        ].into();

        let globals = Arc::new(dict! { "posts" => posts });
        let out = engine.render("list.html", &globals, Dict::new()).unwrap();
        assert_eq!(out, "hello world@2024;second@2023;2");
    }

    #[test]
    fn undefined_binding_fails_render() {
        let engine = engine(&[("t.html", "{{ missing }}")]).unwrap();
        let error = engine.render("t.html", &Arc::new(Dict::new()), Dict::new()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Template);
        assert!(!error.is_fatal());
    }

    #[test]
    fn syntax_error_is_fatal_with_line() {
        let error = engine(&[("bad.html", "ok\n{% if %}")]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Template);
        assert!(error.is_fatal());
        assert_eq!(error.context_value("template").as_deref(), Some("bad.html"));
        assert_eq!(error.context_value("line").as_deref(), Some("2"));
    }

    #[test]
    fn missing_required_template_is_fatal() {
        let error = MiniJinjaEngine::from_sources([("layout.html", "")]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Template);
        assert!(error.is_fatal());
        assert_eq!(error.context_value("template").as_deref(), Some("post.html"));
    }
}
