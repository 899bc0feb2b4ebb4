mod value;
mod format;

pub use value::*;
pub use format::*;
