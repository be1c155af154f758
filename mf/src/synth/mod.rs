//! SQL logic synthesis
//!
//! Resolves each candidate's metadata, renders the synthesis request, calls
//! the text-generation service and attaches the result to the row.

mod failure;
mod request;
mod synthesizer;

pub use failure::SynthesisFailure;
pub use request::RequestBuilder;
pub use synthesizer::{SqlSynthesizer, SynthesisReport, SynthesisSettings};
