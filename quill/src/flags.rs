use std::path::PathBuf;

xflags::xflags! {
    /// Builds a blog from posts, pages, and templates.
    cmd quill {
        /// Log build progress to stderr.
        optional -v, --verbose

        /// Build the site in `project` (default: the current directory).
        default cmd build {
            optional project: PathBuf
            /// Write the site here instead of `<project>/build`.
            optional -o, --output output: PathBuf
            /// Run every unit on the calling thread.
            optional --sequential
        }

        /// Validate the project and its content without writing anything.
        cmd check {
            optional project: PathBuf
        }

        /// Scaffold a new project in `dir`.
        cmd init {
            required dir: PathBuf
        }
    }
}
