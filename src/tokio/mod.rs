mod executor;
mod reader;

pub use executor::TokioExecutor;
pub use reader::{read_frames, spawn_reader};
