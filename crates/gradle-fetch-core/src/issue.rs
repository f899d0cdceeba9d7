//! Transferable failures and uniform per-builder results.
//!
//! A builder failure must survive the trip from the daemon back to the IDE
//! even though the original error type does not exist on the other side.
//! [`TransferableIssue`] keeps the message, the error chain and a captured
//! backtrace, and drops the type identity.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;

use crate::value::{TransferValue, Transferable};

/// An error detached from its concrete type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferableIssue {
    type_name: String,
    message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    stack: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cause: Option<Box<TransferableIssue>>,
}

impl TransferableIssue {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack: Vec::new(),
            cause: None,
        }
    }

    /// Captures `err` and its `source()` chain.
    ///
    /// A backtrace is attached when backtraces are enabled for the process.
    pub fn from_error<E: Error + ?Sized>(err: &E) -> Self {
        let mut issue = Self::new(std::any::type_name::<E>(), err.to_string());
        issue.cause = err.source().map(|source| Box::new(Self::from_source(source)));
        issue.stack = capture_stack();
        issue
    }

    fn from_source(err: &(dyn Error + 'static)) -> Self {
        let mut issue = Self::new("caused by", err.to_string());
        issue.cause = err.source().map(|source| Box::new(Self::from_source(source)));
        issue
    }

    /// Converts a payload caught by `std::panic::catch_unwind`.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "panic with non-string payload".to_string()
        };
        let mut issue = Self::new("panic", message);
        issue.stack = capture_stack();
        issue
    }

    #[must_use]
    pub fn with_cause(mut self, cause: Self) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack(&self) -> &[String] {
        &self.stack
    }

    pub fn cause(&self) -> Option<&Self> {
        self.cause.as_deref()
    }

    /// Iterates over this issue followed by its causes.
    pub fn chain(&self) -> impl Iterator<Item = &Self> {
        std::iter::successors(Some(self), |issue| issue.cause.as_deref())
    }
}

fn capture_stack() -> Vec<String> {
    let backtrace = Backtrace::capture();
    if backtrace.status() != BacktraceStatus::Captured {
        return Vec::new();
    }
    backtrace
        .to_string()
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

impl fmt::Display for TransferableIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for TransferableIssue {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn Error + 'static))
    }
}

/// A failure attributed to one builder.
///
/// `name` is what the builder reported about itself, so a warning can say
/// which contributed extension broke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderIssue {
    name: String,
    issue: TransferableIssue,
}

impl BuilderIssue {
    pub fn new(name: impl Into<String>, issue: TransferableIssue) -> Self {
        Self {
            name: name.into(),
            issue,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn issue(&self) -> &TransferableIssue {
        &self.issue
    }
}

impl Transferable for BuilderIssue {
    const TYPE_TAG: &'static str = "gradle-fetch.BuilderIssue";
}

impl fmt::Display for BuilderIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "builder '{}' failed: {}", self.name, self.issue)
    }
}

impl Error for BuilderIssue {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.issue)
    }
}

/// Outcome of a single builder invocation: a value, nothing, or an issue.
///
/// Never carries both a value and an issue.
#[derive(Debug, Clone, Default)]
pub struct BuilderResult {
    result: Option<TransferValue>,
    issue: Option<BuilderIssue>,
}

impl BuilderResult {
    pub fn value(value: TransferValue) -> Self {
        Self {
            result: Some(value),
            issue: None,
        }
    }

    /// The builder had nothing to report for this target.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failed(issue: BuilderIssue) -> Self {
        Self {
            result: None,
            issue: Some(issue),
        }
    }

    /// Classifies a decoded value: a transferred [`BuilderIssue`] becomes a
    /// failed result, anything else a successful one.
    pub fn from_transferred(value: TransferValue) -> Self {
        match value.downcast_ref::<BuilderIssue>() {
            Some(issue) => Self::failed(issue.clone()),
            None => Self::value(value),
        }
    }

    pub fn result(&self) -> Option<&TransferValue> {
        self.result.as_ref()
    }

    pub fn issue(&self) -> Option<&BuilderIssue> {
        self.issue.as_ref()
    }

    pub fn has_issue(&self) -> bool {
        self.issue.is_some()
    }

    /// Returns the value, or the captured issue as an error.
    pub fn result_if_no_issue(&self) -> Result<Option<&TransferValue>, BuilderIssue> {
        match &self.issue {
            Some(issue) => Err(issue.clone()),
            None => Ok(self.result.as_ref()),
        }
    }

    /// Like [`result_if_no_issue`](Self::result_if_no_issue), downcast to `T`.
    ///
    /// A value of another type is reported as `Ok(None)`.
    pub fn typed_result<T: Transferable>(&self) -> Result<Option<&T>, BuilderIssue> {
        Ok(self
            .result_if_no_issue()?
            .and_then(|value| value.downcast_ref::<T>()))
    }
}
