use std::{fmt, io};
use std::error::Error as StdError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    fatal: bool,
    detail: Vec<Box<dyn ErrorDetail>>,
    prev: Option<Box<Error>>,
}

/// The class of a failure, as reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An I/O failure on a source or destination path.
    File,
    /// A content item whose filename or header is malformed.
    Post(PostError),
    /// A template failed to compile or to render.
    Template,
    /// The project file is missing, unparsable, or invalid.
    Project,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostError {
    InvalidFilename,
    InvalidHeader,
}

pub trait ErrorDetail: fmt::Display + fmt::Debug + Send + Sync {
    fn context(&self) -> Vec<(Option<String>, String)> { vec![] }

    fn kind(&self) -> ErrorKind { ErrorKind::Other }
}

impl Error {
    pub fn from_std<E>(error: E) -> Self
        where E: StdError + Send + Sync + 'static
    {
        Error::from(Box::new(error) as Box<dyn StdError + Send + Sync>)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Marks `self` as fatal: the pass that observes it stops scheduling work.
    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    /// Places `self` behind `other`: `other` becomes the outermost error.
    ///
    /// The resulting kind is `other`'s unless it is `Other`, in which case the
    /// more specific kind of `self` is kept. Fatality is sticky.
    pub fn chain(self, mut other: Error) -> Self {
        #[inline]
        fn _chain(error: Error, behind: &mut Error) {
            if let Some(prev) = behind.prev.as_mut() {
                _chain(error, prev);
            } else {
                behind.prev = Some(Box::new(error));
            }
        }

        if other.kind == ErrorKind::Other {
            other.kind = self.kind;
        }

        other.fatal |= self.fatal;
        _chain(self, &mut other);
        other
    }

    /// Iterates from the outermost error to the innermost cause.
    pub fn causes(&self) -> impl Iterator<Item = &Error> {
        std::iter::successors(Some(self), |e| e.prev.as_deref())
    }

    /// Looks up the first context value recorded under `key`, outermost first.
    pub fn context_value(&self, key: &str) -> Option<String> {
        self.causes()
            .flat_map(|e| e.detail.iter())
            .flat_map(|d| d.context())
            .find(|(k, _)| k.as_deref() == Some(key))
            .map(|(_, v)| v)
    }

    /// Renders `self` as a single human-readable line:
    /// `<kind>: <message>: <cause> (key: value, ...)`.
    pub fn line(&self) -> String {
        let mut messages = vec![];
        let mut params = vec![];
        for error in self.causes() {
            for detail in &error.detail {
                let message = detail.to_string().replace('\n', " ");
                if !message.is_empty() && !messages.contains(&message) {
                    messages.push(message);
                }

                for (key, value) in detail.context() {
                    let value = value.replace('\n', " ");
                    match key {
                        Some(key) => params.push(format!("{key}: {value}")),
                        None if !messages.contains(&value) => messages.push(value),
                        None => {}
                    }
                }
            }
        }

        let mut line = format!("{}: {}", self.kind, messages.join(": "));
        if !params.is_empty() {
            line.push_str(&format!(" ({})", params.join(", ")));
        }

        line
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::File => write!(f, "file_error"),
            ErrorKind::Post(PostError::InvalidFilename) => write!(f, "post_error(invalid_filename)"),
            ErrorKind::Post(PostError::InvalidHeader) => write!(f, "post_error(invalid_header)"),
            ErrorKind::Template => write!(f, "template_error"),
            ErrorKind::Project => write!(f, "project_validator"),
            ErrorKind::Other => write!(f, "error"),
        }
    }
}

impl ErrorDetail for &(dyn StdError + Send + Sync) {
    fn context(&self) -> Vec<(Option<String>, String)> {
        let mut ctxt = vec![];
        let mut error = self.source();
        while let Some(e) = error {
            ctxt.push((None, e.to_string()));
            error = e.source();
        }

        ctxt
    }
}

impl ErrorDetail for Box<dyn StdError + Send + Sync> {
    fn context(&self) -> Vec<(Option<String>, String)> {
        let error: &(dyn StdError + Send + Sync) = &**self;
        error.context()
    }
}

macro_rules! impl_error_detail_with_std_error {
    ($T:ty => $kind:expr) => {
        impl $crate::error::ErrorDetail for $T {
            fn context(&self) -> Vec<(Option<String>, String)> {
                let error: &(dyn std::error::Error + Send + Sync) = self;
                error.context()
            }

            fn kind(&self) -> $crate::error::ErrorKind {
                $kind
            }
        }
    }
}

impl_error_detail_with_std_error!(io::Error => ErrorKind::File);
impl_error_detail_with_std_error!(toml::de::Error => ErrorKind::Project);
impl_error_detail_with_std_error!(rss::validation::ValidationError => ErrorKind::Other);

impl ErrorDetail for minijinja::Error {
    fn context(&self) -> Vec<(Option<String>, String)> {
        let mut ctxt = vec![];
        if let Some(name) = self.name() {
            ctxt.push((Some("template".into()), name.to_string()));
        }

        if let Some(line) = self.line() {
            ctxt.push((Some("line".into()), line.to_string()));
        }

        let mut error = self.source();
        while let Some(e) = error {
            ctxt.push((None, e.to_string()));
            error = e.source();
        }

        ctxt
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::Template
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        Error {
            kind: self.kind,
            fatal: self.fatal,
            detail: self.detail.iter()
                .map(|detail| MakeshiftError::from(&**detail))
                .map(|error| Box::new(error) as Box<dyn ErrorDetail>)
                .collect(),
            prev: self.prev.clone(),
        }
    }
}

impl<T: ErrorDetail + 'static> From<T> for Error {
    fn from(detail: T) -> Self {
        Error {
            kind: detail.kind(),
            fatal: false,
            prev: None,
            detail: vec![Box::new(detail)],
        }
    }
}

/// Renders the outermost error first, each cause indented beneath it.
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        for (depth, error) in self.causes().enumerate() {
            let pad = "    ".repeat(depth);
            for detail in &error.detail {
                write!(f, "\n{pad}{detail}")?;
                for (key, value) in detail.context() {
                    match key {
                        Some(key) => write!(f, "\n{pad}  {key}: {value}")?,
                        None => write!(f, "\n{pad}  {value}")?,
                    }
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct MakeshiftError {
    pub message: String,
    pub kind: ErrorKind,
    pub parameters: Vec<(Option<String>, String)>,
}

impl From<&dyn ErrorDetail> for MakeshiftError {
    #[inline]
    fn from(detail: &dyn ErrorDetail) -> Self {
        MakeshiftError {
            message: detail.to_string(),
            kind: detail.kind(),
            parameters: detail.context()
        }
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! err {
    ($($token:tt)*) => (Err($crate::error!($($token)*)));
}

#[doc(hidden)]
#[macro_export]
macro_rules! error {
    ($msg:expr, $($rest:tt)*) => (
        $crate::error::Error::from($crate::error::MakeshiftError {
            message: $msg.to_string(),
            kind: $crate::error::ErrorKind::Other,
            parameters: {
                #[allow(unused_mut)]
                let mut v: Vec<(Option<String>, String)> = Vec::new();
                $crate::error!(@param v $($rest)*);
                v
            },
        })
    );

    ($msg:expr) => ( $crate::error!($msg,) );

    (@param $v:ident $key:expr => $value:expr, $($rest:tt)*) => {
        $crate::error!(@param $v $key => $value);
        $crate::error!(@param $v $($rest)*);
    };

    (@param $v:ident $key:expr => $value:expr) => {
        $v.push((Some($key.to_string()), $value.to_string()));
    };

    (@param $v:ident $value:expr, $($rest:tt)*) => {
        $crate::error!(@param $v $value);
        $crate::error!(@param $v $($rest)*);
    };

    (@param $v:ident $value:expr) => {
        $v.push((None, $value.to_string()));
    };

    (@param $v:ident $(,)?) => { };
}

impl fmt::Display for MakeshiftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}

impl ErrorDetail for MakeshiftError {
    fn context(&self) -> Vec<(Option<String>, String)> {
        self.parameters.clone()
    }

    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub trait Chainable<T> {
    fn chain(self, other: impl Into<Error>) -> Result<T>;

    fn chain_with<F, E>(self, f: F) -> Result<T>
        where F: FnOnce() -> E, E: Into<Error>;
}

impl<T, E: Into<Error>> Chainable<T> for Result<T, E> {
    fn chain(self, other: impl Into<Error>) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().chain(other.into()))
        }
    }

    fn chain_with<F, Err>(self, f: F) -> Result<T>
        where F: FnOnce() -> Err, Err: Into<Error>,
     {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().chain(f().into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(Error: Send, Sync, Clone);

    #[test]
    fn chained_kind_prefers_specific_cause() {
        let io = io::Error::new(io::ErrorKind::NotFound, "gone");
        let error = Err::<(), _>(io)
            .chain(error!("failed to read post", "path" => "posts/a.md"))
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::File);
        assert_eq!(error.context_value("path").as_deref(), Some("posts/a.md"));
    }

    #[test]
    fn fatal_is_sticky_across_chains() {
        let error = error!("disk full").fatal().chain(error!("failed to write page"));
        assert!(error.is_fatal());
    }

    #[test]
    fn line_is_single_line_with_context() {
        let error = error!("invalid post filename", "path" => "posts/x.md")
            .with_kind(ErrorKind::Post(PostError::InvalidFilename));

        let line = error.line();
        assert!(!line.contains('\n'));
        assert_eq!(line, "post_error(invalid_filename): invalid post filename (path: posts/x.md)");
    }

    #[test]
    fn display_indents_causes() {
        let error = error!("disk full").chain(error!("failed to write page", "path" => "out/a.html"));
        assert_eq!(error.to_string(), "[error]\nfailed to write page\n  path: out/a.html\n    disk full");
    }
}
