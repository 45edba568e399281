pub mod json;

pub use json::{JsonLibrary, LibraryEntry, LibraryFile};
