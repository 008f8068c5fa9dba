pub mod backend;
pub mod error;
mod models;
mod path;

pub use crate::backend::FileSystem;
pub use crate::models::{Dimensions, FileStat};
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type FsHandle = Arc<dyn FileSystem + Send + Sync>;
