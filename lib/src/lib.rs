//! A library for two-pass static site builds.
//!
//! # Overview
//!
//! Plume turns a project directory of posts, pages, templates, and assets into
//! a rendered static site:
//!
//! ```text
//!   site.toml  posts/  pages/  templates/  assets/
//!       |        |       |         |          |
//!       |        +---+---+         |          |
//!       |            |             |          |
//!       |     +------v------+      |          |
//!       +----->   pass 1    |      |          |
//!             | extract,    |      |          |
//!             | render md   |      |          |
//!             +------+------+      |          |
//!                    |             |          |
//!              Bindings::freeze    |          |
//!                    |             |          |
//!             +------v------+      |          |
//!             |   pass 2    <------+          |
//!             | templates,  |                 |
//!             | write files |     copy        |
//!             +------+------+ <---------------+
//!                    |
//!                 build/
//! ```
//!
//! The first pass reads every content item, extracts its metadata (a post's
//! timestamp and slug from its filename, its title and tags from its first two
//! lines), renders its markdown, and registers it in the build's
//! [`Bindings`](bindings::Bindings). Every first-pass unit resolves before the
//! bindings are frozen, so listings rendered by the second pass always see the
//! complete set of posts, tags, and pages.
//!
//! Both passes run through a [`Launcher`](launcher::Launcher), sequentially or
//! on a wide worker pool. A unit that fails is reported without disturbing its
//! siblings; a fatal failure stops the build.
//!
//! ```rust,no_run
//! use plume::build::Build;
//!
//! let report = Build::load("my-site")?.run();
//! for (unit, error) in report.failures() {
//!     eprintln!("{unit}: {}", error.line());
//! }
//! # Ok::<(), plume::error::Error>(())
//! ```

#[macro_use]
pub mod error;
pub mod util;
pub mod value;
pub mod fs;
pub mod markdown;
pub mod html;
pub mod preview;
pub mod post;
pub mod bindings;
pub mod config;
pub mod item;
pub mod templating;
pub mod launcher;
pub mod feed;
pub mod build;

pub use build::{Build, BuildReport, Phase, Pass, Observer};
pub use launcher::{Mode, Outcome};

pub use rayon;
