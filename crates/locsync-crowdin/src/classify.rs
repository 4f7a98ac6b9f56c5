//! Maps raw Crowdin error payloads onto [`ClientError`] outcomes.
//!
//! Classification is string-based against server messages, so it breaks
//! silently if the wording changes upstream. Every pattern lives in one of
//! the rule tables below; call sites only pick a table.

use std::future::Future;
use std::time::Duration;

use locsync::ClientError;

use crate::model::{SingleErrorResponse, ValidationErrorResponse};

/// A rejected request: HTTP status plus every message the body carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFailure {
    pub status: u16,
    pub messages: Vec<String>,
}

impl RawFailure {
    /// Parse either error shape the API returns, falling back to the raw body.
    pub fn from_body(status: u16, body: &str) -> Self {
        let messages = if let Ok(single) = serde_json::from_str::<SingleErrorResponse>(body) {
            vec![single.error.message]
        } else if let Ok(validation) = serde_json::from_str::<ValidationErrorResponse>(body) {
            validation
                .errors
                .into_iter()
                .flat_map(|entry| {
                    let key = entry.error.key;
                    entry.error.errors.into_iter().map(move |e| {
                        if key.is_empty() {
                            e.message
                        } else {
                            format!("{key}: {}", e.message)
                        }
                    })
                })
                .collect()
        } else {
            vec![body.trim().to_owned()]
        };
        Self { status, messages }
    }

    pub fn message(&self) -> String {
        self.messages.join("; ")
    }

    fn contains(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.contains(needle))
    }
}

/// Why a request did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Never reached the server or the response could not be read.
    Transport(ClientError),
    /// The server answered with a non-success status.
    Rejected(RawFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    ContainsAny(&'static [&'static str]),
    /// The storage object referenced by the request is not visible yet.
    StorageMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    AlreadyExists,
    WaitAndRetry,
    StorageNotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub matcher: Matcher,
    pub outcome: Outcome,
}

pub const DIRECTORY_RULES: &[Rule] = &[
    Rule {
        matcher: Matcher::ContainsAny(&["Name must be unique", "This file is currently being updated"]),
        outcome: Outcome::AlreadyExists,
    },
    Rule {
        matcher: Matcher::ContainsAny(&["Already creating directory"]),
        outcome: Outcome::WaitAndRetry,
    },
];

pub const BRANCH_RULES: &[Rule] = &[Rule {
    matcher: Matcher::ContainsAny(&["Name must be unique"]),
    outcome: Outcome::AlreadyExists,
}];

pub const STORAGE_RULES: &[Rule] = &[Rule {
    matcher: Matcher::StorageMissing,
    outcome: Outcome::StorageNotReady,
}];

impl Matcher {
    fn matches(&self, failure: &RawFailure, storage_id: Option<u64>) -> bool {
        match self {
            Self::ContainsAny(needles) => needles.iter().any(|n| failure.contains(n)),
            Self::StorageMissing => storage_id.is_some_and(|id| {
                failure.contains(&format!("File from storage with id #{id} was not found"))
            }),
        }
    }
}

/// First matching rule wins; unmatched failures surface verbatim.
pub fn classify(rules: &[Rule], failure: &RawFailure, storage_id: Option<u64>) -> ClientError {
    let outcome = rules
        .iter()
        .find(|rule| rule.matcher.matches(failure, storage_id))
        .map(|rule| rule.outcome);

    match outcome {
        Some(Outcome::AlreadyExists) => ClientError::AlreadyExists,
        Some(Outcome::WaitAndRetry) => ClientError::WaitAndRetry,
        Some(Outcome::StorageNotReady) => ClientError::StorageNotReady {
            storage_id: storage_id.unwrap_or_default(),
        },
        None => ClientError::Remote {
            status: failure.status,
            message: failure.message(),
        },
    }
}

/// Collapse a request error with the given rules.
pub fn resolve(rules: &[Rule], error: RequestError, storage_id: Option<u64>) -> ClientError {
    match error {
        RequestError::Transport(e) => e,
        RequestError::Rejected(failure) => classify(rules, &failure, storage_id),
    }
}

/// Bounded retry for calls racing a storage upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(500),
        }
    }
}

/// Run `call`, retrying while the server reports `storage_id` as missing.
pub async fn with_storage_retry<T, F, Fut>(
    policy: RetryPolicy,
    storage_id: u64,
    mut call: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let mut attempt = 1;
    loop {
        let error = match call().await {
            Ok(value) => return Ok(value),
            Err(e) => resolve(STORAGE_RULES, e, Some(storage_id)),
        };

        match error {
            ClientError::StorageNotReady { .. } if attempt < policy.attempts => {
                tracing::info!(storage_id, attempt, "storage not visible yet, retrying");
                attempt += 1;
                tokio::time::sleep(policy.delay).await;
            }
            other => return Err(other),
        }
    }
}
