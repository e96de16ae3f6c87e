//! Multimodal analysis for vlens.
//!
//! Builds size-bounded requests from keyframes, sends them to the
//! content-understanding service and recovers structured analysis from its
//! response.

pub mod builder;
pub mod client;
pub mod error;
pub mod parse;
pub mod policy;

pub use builder::{
    build_request, plan_request, resample_indices, AnalysisRequest, BuildOutcome, PreparedRequest,
};
pub use client::{AnalysisConfig, AnalysisService, HttpAnalysisClient, DEFAULT_INSTRUCTIONS};
pub use error::{AnalysisError, AnalysisResult};
pub use parse::{attach_timestamps, parse_response};
pub use policy::RequestPolicy;
