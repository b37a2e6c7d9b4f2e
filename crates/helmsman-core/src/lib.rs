pub mod artifact;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod io;
pub mod launcher;
pub mod paths;
pub mod probe;
pub mod process;
pub mod supervisor;

pub use error::{HelmsmanError, Result};
