pub mod error;
pub mod library;
pub mod traits;
pub mod trakt;

pub use error::{ErrorClass, SourceError};
pub use library::JsonLibrary;
pub use traits::{LocalLibrary, RemoteService};
pub use trakt::TraktClient;
