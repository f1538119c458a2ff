// Topical: streaming topic discovery for comment threads.
//
// This is the library root. Each module corresponds to a stage of the
// analysis pipeline or the shell around it.

pub mod config;
pub mod download;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod representation;
pub mod summary;
pub mod topics;

#[cfg(feature = "web")]
pub mod web;
