pub mod attachments;
pub mod channels;
pub mod emojis;
pub mod error;
pub mod json_array_stream;
pub mod messages;
pub mod pipeline;
pub mod reactions;
pub mod users;
pub mod zip_extract;

pub use error::ImportError;
pub use pipeline::{run_import, PipelineCtx};
