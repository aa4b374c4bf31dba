pub mod error;
pub mod output;
pub mod types;
pub mod value;

pub use error::DictWikiError;
pub use output::*;
pub use types::*;
pub use value::*;
