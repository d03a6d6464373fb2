//! PDF processing tasks: split, merge, rotate, watermark, encrypt, OCR and
//! conversions to and from HTML and images.
//!
//! Every task is a function `run(Params, &TaskContext) -> Result<Output>` in
//! [`tasks`]. The binary exposes them as CLI subcommands and as MCP tools.

pub mod batch;
pub mod collab;
pub mod config;
pub mod context;
pub mod error;
pub mod page_range;
pub mod pdf;
pub mod tasks;

pub use config::Config;
pub use context::TaskContext;
pub use error::{ErrorKind, Result, TaskError};
pub use tasks::TaskKind;
