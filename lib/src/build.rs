//! The two-pass build.
//!
//! The first pass reads every post and page, extracts its metadata, renders
//! its markdown, and registers it in the [`Bindings`]. Once every first-pass
//! unit has resolved, the bindings are frozen and the second pass renders
//! every item, listing, and the feed against the complete set.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bindings::{Bindings, Frozen, PageRef, PostRef, Site};
use crate::config::{Project, ASSETS_DIR, CONTENT_EXTS, OUTPUT_DIR, TEMPLATE_DIR};
use crate::error::{Error, Result};
use crate::item::{ContentItem, Kind, Layout};
use crate::launcher::{Launcher, Mode, Outcome};
use crate::templating::{Engine, EngineInit, INDEX, TAG};
use crate::templating::minijinja::MiniJinjaEngine;
use crate::value::Value;
use crate::{dict, feed, fs, markdown, post, preview};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Pass1Running,
    /// The barrier: every first-pass unit has resolved.
    Pass1Complete,
    Pass2Running,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    One,
    Two,
}

/// Watches a build. Unit hooks run on the worker executing the unit.
pub trait Observer: Send + Sync {
    fn phase(&self, _phase: Phase) { }

    fn unit_started(&self, _pass: Pass, _unit: &str) { }

    fn unit_finished(&self, _pass: Pass, _unit: &str, _ok: bool) { }
}

#[derive(Debug)]
struct Silent;

impl Observer for Silent { }

/// The outcome of one unit: the source it read (first pass) or the file it
/// wrote (second pass).
#[derive(Debug)]
pub struct UnitReport {
    pub unit: String,
    pub outcome: Outcome<PathBuf>,
}

#[derive(Debug)]
pub struct BuildReport {
    phase: Phase,
    first_pass: Vec<UnitReport>,
    second_pass: Vec<UnitReport>,
    assets: Vec<PathBuf>,
    fatal: Option<Error>,
}

impl BuildReport {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// `true` if the build reached [`Phase::Done`] without a single failure.
    pub fn is_success(&self) -> bool {
        self.phase == Phase::Done && self.failures().next().is_none()
    }

    pub fn fatal(&self) -> Option<&Error> {
        self.fatal.as_ref()
    }

    /// Every per-item failure, in unit order, first pass first.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.first_pass.iter()
            .chain(self.second_pass.iter())
            .filter_map(|u| Some((u.unit.as_str(), u.outcome.error()?)))
            .filter(|(_, e)| !e.is_fatal())
    }

    pub fn outcomes(&self, pass: Pass) -> &[UnitReport] {
        match pass {
            Pass::One => &self.first_pass,
            Pass::Two => &self.second_pass,
        }
    }

    /// Every file the build wrote to the output directory.
    pub fn written(&self) -> Vec<&Path> {
        self.second_pass.iter()
            .filter_map(|u| match &u.outcome {
                Outcome::Done(path) => Some(path.as_path()),
                _ => None,
            })
            .chain(self.assets.iter().map(|p| p.as_path()))
            .collect()
    }
}

struct Source {
    kind: Kind,
    path: PathBuf,
}

enum Job {
    Item(ContentItem),
    Index,
    Tag(usize),
    Feed,
}

pub struct Build {
    root: PathBuf,
    output: PathBuf,
    project: Project,
    mode: Mode,
    observer: Arc<dyn Observer>,
}

impl Build {
    /// A build of the project at `root` into `<root>/build`.
    pub fn new<P: AsRef<Path>>(root: P, project: Project) -> Self {
        let root = root.as_ref().to_path_buf();
        let mode = match project.parallel {
            true => Mode::Parallel,
            false => Mode::Sequential,
        };

        Build {
            output: root.join(OUTPUT_DIR),
            root,
            project,
            mode,
            observer: Arc::new(Silent),
        }
    }

    /// Loads `<root>/site.toml` and prepares a build of it.
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self> {
        let project = Project::load(root.as_ref())?;
        Ok(Build::new(root, project))
    }

    pub fn output<P: AsRef<Path>>(mut self, output: P) -> Self {
        self.output = output.as_ref().to_path_buf();
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn output_dir(&self) -> &Path {
        &self.output
    }

    pub fn run(&self) -> BuildReport {
        self.run_with::<MiniJinjaEngine>()
    }

    pub fn run_with<E: EngineInit>(&self) -> BuildReport {
        let mut report = BuildReport {
            phase: Phase::Idle,
            first_pass: vec![],
            second_pass: vec![],
            assets: vec![],
            fatal: None,
        };

        self.enter(&mut report, Phase::Idle);
        if let Err(e) = self.execute::<E>(&mut report) {
            tracing::error!("{}", e.line());
            report.fatal = Some(e);
            self.enter(&mut report, Phase::Failed);
        }

        report
    }

    /// Compiles templates and runs the first pass without writing anything,
    /// returning every problem found.
    pub fn check(&self) -> Vec<Error> {
        self.check_with::<MiniJinjaEngine>()
    }

    pub fn check_with<E: EngineInit>(&self) -> Vec<Error> {
        let mut errors = vec![];
        if let Err(e) = E::init(&self.root.join(TEMPLATE_DIR)) {
            errors.push(e);
        }

        match self.sources() {
            Ok(sources) => {
                let bindings = Bindings::new();
                errors.extend(sources.iter().filter_map(|s| self.first_pass(&bindings, s).err()));
            }
            Err(e) => errors.push(e),
        }

        errors
    }

    fn execute<E: EngineInit>(&self, report: &mut BuildReport) -> Result<()> {
        let launcher = Launcher::new(self.mode)?;
        fs::clean(&self.output, &self.root).map_err(|e| e.fatal())?;
        let engine = E::init(&self.root.join(TEMPLATE_DIR))?;
        let sources = self.sources()?;

        self.enter(report, Phase::Pass1Running);
        let bindings = Bindings::new();
        bindings.insert(Site, self.project.site());

        let names: Vec<String> = sources.iter().map(|s| self.unit_name(&s.path)).collect();
        let outcomes = launcher.run(sources, |source| {
            let unit = self.unit_name(&source.path);
            self.observe(Pass::One, &unit, || self.first_pass(&bindings, &source))
        });

        let mut items = vec![];
        for (unit, outcome) in names.into_iter().zip(outcomes) {
            let outcome = outcome.map(|item| {
                let source = item.source.clone();
                items.push(item);
                source
            });

            report.first_pass.push(UnitReport { unit, outcome });
        }

        summarize(Pass::One, &report.first_pass);
        escalate(&report.first_pass)?;

        self.enter(report, Phase::Pass1Complete);
        let frozen = bindings.freeze();

        self.enter(report, Phase::Pass2Running);
        let mut jobs: Vec<Job> = items.into_iter().map(Job::Item).collect();
        if engine.has_template(INDEX) {
            jobs.push(Job::Index);
        }

        if engine.has_template(TAG) {
            jobs.extend((0..frozen.tags().len()).map(Job::Tag));
        }

        jobs.push(Job::Feed);

        let names: Vec<String> = jobs.iter().map(|job| self.job_name(&frozen, job)).collect();
        let destinations: Vec<PathBuf> = jobs.iter().map(|job| self.job_destination(&frozen, job)).collect();
        let mut claims: HashMap<&Path, usize> = HashMap::new();
        for destination in &destinations {
            *claims.entry(destination.as_path()).or_default() += 1;
        }

        let units: Vec<(Job, PathBuf)> = jobs.into_iter().zip(destinations.iter().cloned()).collect();
        let (outcomes, assets) = rayon::join(
            || launcher.run(units, |(job, destination)| {
                let unit = self.job_name(&frozen, &job);
                self.observe(Pass::Two, &unit, || {
                    if claims.get(destination.as_path()).copied().unwrap_or(0) > 1 {
                        return Err(error! {
                            "output path is claimed by more than one unit",
                            "path" => destination.display(),
                        });
                    }

                    self.second_pass(&engine, &frozen, job, destination)
                })
            }),
            || fs::copy_tree(&self.root.join(ASSETS_DIR), &self.output),
        );

        report.second_pass = names.into_iter()
            .zip(outcomes)
            .map(|(unit, outcome)| UnitReport { unit, outcome })
            .collect();

        summarize(Pass::Two, &report.second_pass);
        escalate(&report.second_pass)?;
        report.assets = assets.map_err(|e| e.fatal())?;

        self.enter(report, Phase::Done);
        Ok(())
    }

    fn first_pass(&self, bindings: &Bindings, source: &Source) -> Result<ContentItem> {
        let raw = fs::read(&source.path)?;
        let layout = self.layout();
        let outside = || error! {
            "content file lies outside its source directory",
            "path" => source.path.display(),
        };

        match source.kind {
            Kind::Post => {
                let extracted = post::extract(&source.path, &raw, &self.project.base_url)?;
                let body = markdown::render(&extracted.body);
                let preview = preview::preview(&body, self.project.preview_length);
                let relative = layout.relative(Kind::Post, &source.path, Some(&extracted.slug))
                    .ok_or_else(outside)?;

                let url = layout.url(&relative);
                bindings.register_post(PostRef {
                    title: extracted.title.as_str().into(),
                    slug: extracted.slug.as_str().into(),
                    url: url.clone(),
                    timestamp: extracted.timestamp,
                    tags: extracted.tags.clone(),
                    preview: preview.as_str().into(),
                });

                Ok(ContentItem {
                    kind: Kind::Post,
                    source: source.path.clone(),
                    destination: layout.destination(&relative),
                    url,
                    title: extracted.title.as_str().into(),
                    preview: preview.into(),
                    body: body.into(),
                    post: Some(extracted),
                    rendered: None,
                })
            }
            Kind::Page => {
                let (title, text) = page_header(&source.path, &raw);
                let body = markdown::render(text);
                let preview = preview::preview(&body, self.project.preview_length);
                let relative = layout.relative(Kind::Page, &source.path, None)
                    .ok_or_else(outside)?;

                let url = layout.url(&relative);
                let title: Arc<str> = title.into();
                bindings.register_page(PageRef { title: title.clone(), url: url.clone() });

                Ok(ContentItem {
                    kind: Kind::Page,
                    source: source.path.clone(),
                    destination: layout.destination(&relative),
                    url,
                    title,
                    preview: preview.into(),
                    body: body.into(),
                    post: None,
                    rendered: None,
                })
            }
        }
    }

    fn second_pass(
        &self,
        engine: &dyn Engine,
        frozen: &Frozen,
        job: Job,
        destination: PathBuf,
    ) -> Result<PathBuf> {
        let globals = frozen.context();
        let contents = match job {
            Job::Item(mut item) => {
                let mut locals = match &item.post {
                    Some(post) => post.locals(),
                    None => dict! { "title" => item.title.clone() },
                };

                locals.insert("url".into(), item.url.clone().into());
                locals.insert("preview".into(), item.preview.clone().into());
                locals.insert("body".into(), Value::html(item.body.clone()));
                let page = dict! {
                    "title" => item.title.clone(),
                    "url" => item.url.clone(),
                };

                let rendered = engine.render_page(item.kind.template(), globals, locals, page)?;
                item.rendered = Some(rendered);
                item.rendered.unwrap_or_default()
            }
            Job::Index => {
                let title = self.project.site_name.as_str();
                let locals = dict! { "title" => title };
                let page = dict! { "title" => title, "url" => self.project.base_url.as_str() };
                engine.render_page(INDEX, globals, locals, page)?
            }
            Job::Tag(i) => {
                let entry = &frozen.tags()[i];
                let name = &*entry.tag.name;
                if name.contains(['/', '\\']) || name.starts_with('.') {
                    return Err(error!("tag name cannot be used as a path", "tag" => name));
                }

                let locals = dict! { "title" => name, "tag" => Value::from(entry) };
                let page = dict! { "title" => name, "url" => entry.tag.url.clone() };
                engine.render_page(TAG, globals, locals, page)?
            }
            Job::Feed => feed::render(&self.project, frozen.posts())?,
        };

        fs::write(&destination, &contents).map_err(|e| e.fatal())?;
        Ok(destination)
    }

    fn sources(&self) -> Result<Vec<Source>> {
        let mut sources = vec![];
        for kind in [Kind::Post, Kind::Page] {
            let files = fs::discover(&self.root.join(kind.source_dir()), CONTENT_EXTS)
                .map_err(|e| e.fatal())?;

            sources.extend(files.into_iter().map(|path| Source { kind, path }));
        }

        Ok(sources)
    }

    fn layout(&self) -> Layout<'_> {
        Layout {
            project: &self.root,
            output: &self.output,
            base_url: &self.project.base_url,
        }
    }

    fn unit_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.root).unwrap_or(path).display().to_string()
    }

    fn job_destination(&self, frozen: &Frozen, job: &Job) -> PathBuf {
        match job {
            Job::Item(item) => item.destination.clone(),
            Job::Index => self.output.join(INDEX),
            Job::Tag(i) => self.output.join("tags").join(&*frozen.tags()[*i].tag.name).join(INDEX),
            Job::Feed => self.output.join(feed::FEED_FILE),
        }
    }

    fn job_name(&self, frozen: &Frozen, job: &Job) -> String {
        match job {
            Job::Item(item) => self.unit_name(&item.source),
            Job::Index => INDEX.into(),
            Job::Tag(i) => format!("tags/{}", frozen.tags()[*i].tag.name),
            Job::Feed => feed::FEED_FILE.into(),
        }
    }

    fn enter(&self, report: &mut BuildReport, phase: Phase) {
        tracing::info!(?phase, "build phase");
        report.phase = phase;
        self.observer.phase(phase);
    }

    fn observe<T, F>(&self, pass: Pass, unit: &str, f: F) -> Result<T>
        where F: FnOnce() -> Result<T>
    {
        self.observer.unit_started(pass, unit);
        tracing::debug!(?pass, unit, "unit started");

        let result = f();
        if let Err(e) = &result {
            tracing::warn!(?pass, unit, "{}", e.line());
        }

        self.observer.unit_finished(pass, unit, result.is_ok());
        result
    }
}

/// A page's title is its leading `# Title` line, if any, or its file stem.
fn page_header<'a>(path: &Path, raw: &'a str) -> (String, &'a str) {
    let (first, rest) = raw.split_once('\n').unwrap_or((raw, ""));
    match first.trim_end_matches('\r').strip_prefix('#').map(str::trim) {
        Some(title) if !title.is_empty() && !title.starts_with('#') => (title.into(), rest),
        _ => {
            let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
            (stem.replace('-', " "), raw)
        }
    }
}

fn summarize(pass: Pass, units: &[UnitReport]) {
    let done = units.iter().filter(|u| u.outcome.is_done()).count();
    let failed = units.iter().filter(|u| u.outcome.error().is_some()).count();
    let skipped = units.len() - done - failed;
    tracing::info!(?pass, done, failed, skipped, "pass complete");
}

fn escalate(units: &[UnitReport]) -> Result<()> {
    match units.iter().filter_map(|u| u.outcome.error()).find(|e| e.is_fatal()) {
        Some(e) => Err(e.clone()),
        None => Ok(()),
    }
}
