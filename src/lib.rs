pub mod cache;
pub mod cli;
pub mod codec;
pub mod config;
pub mod db;
pub mod detection;
pub mod error;
pub mod histogram;
pub mod matcher;
mod metrics;
pub mod pipeline;
pub mod recognizer;
pub mod server;
pub mod similarity;
pub mod store;
pub mod utils;

pub use config::Opts;
pub use error::LabelError;
pub use recognizer::{Label, Recognition, Recognizer, RecognizerBuilder};
