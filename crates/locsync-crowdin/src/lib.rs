//! Crowdin v2 REST implementation of [`locsync::ProjectClient`].

pub mod classify;
pub mod client;
pub mod model;

pub use classify::{RawFailure, RequestError, RetryPolicy};
pub use client::{CrowdinClient, CrowdinClientConfig, PAGE_LIMIT};
