//! Exception records raised inside a transaction.
//!
//! There are two kinds of exception, distinguished by who raises them:
//!
//! - **Sender** exceptions come from library code that does not know the
//!   context it runs in. It cannot tell who is in charge of the problem, so it
//!   limits itself to an integer category plus a description and detail.
//! - **Recipient** exceptions come from application code that knows its
//!   context. It names the audience responsible for the problem (user,
//!   administrator, or the implementation itself) and proposes a solution.
//!
//! Both kinds share the fields in [`ExceptionInfo`]. Records are stamped with a
//! creation timestamp and a process-unique serial number when built.

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{ExceptionError, ExceptionResult};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Sender category for a failed tracked allocation.
pub const ALLOCATION_FAILURE: u32 = 1;

/// Range reserved for application-defined sender categories.
pub const CUSTOM_SENDER_CATEGORIES: RangeInclusive<u32> = 2_000_000..=3_000_000;

/// The two exception kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    Sender,
    Recipient,
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionKind::Sender => write!(f, "sender"),
            ExceptionKind::Recipient => write!(f, "recipient"),
        }
    }
}

/// Who is in charge of solving a recipient exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// The end user can fix it (bad input, missing file, ...).
    User,
    /// An administrator must act (configuration, quotas, ...).
    Admin,
    /// A programming error; the target is the bug tracker.
    Implementation,
}

impl Audience {
    /// The integer category code of this audience.
    pub fn code(&self) -> u32 {
        match self {
            Audience::User => 1_100_000,
            Audience::Admin => 1_200_000,
            Audience::Implementation => 1_300_000,
        }
    }

    /// Look up an audience by its category code.
    pub fn from_code(code: u32) -> ExceptionResult<Self> {
        match code {
            1_100_000 => Ok(Audience::User),
            1_200_000 => Ok(Audience::Admin),
            1_300_000 => Ok(Audience::Implementation),
            other => Err(ExceptionError::UnknownAudience(other)),
        }
    }
}

impl TryFrom<u32> for Audience {
    type Error = ExceptionError;

    fn try_from(code: u32) -> ExceptionResult<Self> {
        Self::from_code(code)
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Audience::User => write!(f, "user"),
            Audience::Admin => write!(f, "admin"),
            Audience::Implementation => write!(f, "implementation"),
        }
    }
}

/// Fields shared by both exception kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    /// Category code.
    pub category: u32,
    /// Human readable summary.
    pub description: String,
    /// Human readable detail.
    pub detail: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Originating thread (informational only).
    pub thread: Option<String>,
    /// Process-unique, increasing serial number.
    pub serial_number: u64,
}

impl ExceptionInfo {
    fn stamped(category: u32, description: String, detail: String) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            category,
            description,
            detail,
            timestamp_ms,
            thread: None,
            serial_number: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// An exception attached to an aborting transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExceptionRecord {
    /// Raised by context-unaware (library) code.
    Sender {
        #[serde(flatten)]
        info: ExceptionInfo,
    },
    /// Raised by context-aware (application) code.
    Recipient {
        #[serde(flatten)]
        info: ExceptionInfo,
        audience: Audience,
        solution: String,
    },
}

impl ExceptionRecord {
    /// Build a sender exception.
    pub fn sender(category: u32, description: impl Into<String>, detail: impl Into<String>) -> Self {
        ExceptionRecord::Sender {
            info: ExceptionInfo::stamped(category, description.into(), detail.into()),
        }
    }

    /// Build a recipient exception. Its category is the audience code.
    pub fn recipient(
        audience: Audience,
        description: impl Into<String>,
        detail: impl Into<String>,
        solution: impl Into<String>,
    ) -> Self {
        ExceptionRecord::Recipient {
            info: ExceptionInfo::stamped(audience.code(), description.into(), detail.into()),
            audience,
            solution: solution.into(),
        }
    }

    /// Record the originating thread.
    pub fn with_thread(mut self, thread: impl Into<String>) -> Self {
        self.info_mut().thread = Some(thread.into());
        self
    }

    /// Record the current thread, by name if it has one.
    pub fn with_current_thread(self) -> Self {
        let current = std::thread::current();
        let label = match current.name() {
            Some(name) => name.to_string(),
            None => format!("{:?}", current.id()),
        };
        self.with_thread(label)
    }

    /// The exception kind.
    pub fn kind(&self) -> ExceptionKind {
        match self {
            ExceptionRecord::Sender { .. } => ExceptionKind::Sender,
            ExceptionRecord::Recipient { .. } => ExceptionKind::Recipient,
        }
    }

    /// Fields shared by both kinds.
    pub fn info(&self) -> &ExceptionInfo {
        match self {
            ExceptionRecord::Sender { info } => info,
            ExceptionRecord::Recipient { info, .. } => info,
        }
    }

    fn info_mut(&mut self) -> &mut ExceptionInfo {
        match self {
            ExceptionRecord::Sender { info } => info,
            ExceptionRecord::Recipient { info, .. } => info,
        }
    }

    pub fn category(&self) -> u32 {
        self.info().category
    }

    pub fn description(&self) -> &str {
        &self.info().description
    }

    pub fn detail(&self) -> &str {
        &self.info().detail
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.info().timestamp_ms
    }

    pub fn thread(&self) -> Option<&str> {
        self.info().thread.as_deref()
    }

    pub fn serial_number(&self) -> u64 {
        self.info().serial_number
    }

    /// The responsible audience, for recipient exceptions.
    pub fn audience(&self) -> Option<Audience> {
        match self {
            ExceptionRecord::Sender { .. } => None,
            ExceptionRecord::Recipient { audience, .. } => Some(*audience),
        }
    }

    /// The proposed solution, for recipient exceptions.
    pub fn solution(&self) -> Option<&str> {
        match self {
            ExceptionRecord::Sender { .. } => None,
            ExceptionRecord::Recipient { solution, .. } => Some(solution),
        }
    }

    /// Returns true if this is an allocation failure raised with the default
    /// [`ALLOCATION_FAILURE`] category.
    pub fn is_allocation_failure(&self) -> bool {
        self.is_allocation_failure_for(ALLOCATION_FAILURE)
    }

    /// Returns true if this is a sender exception in the given allocation
    /// failure category.
    pub fn is_allocation_failure_for(&self, category: u32) -> bool {
        self.kind() == ExceptionKind::Sender && self.category() == category
    }
}

impl fmt::Display for ExceptionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionRecord::Sender { info } => {
                write!(f, "sender exception {}: {}", info.category, info.description)?;
            }
            ExceptionRecord::Recipient { info, audience, .. } => {
                write!(f, "{} exception: {}", audience, info.description)?;
            }
        }
        if !self.detail().is_empty() {
            write!(f, " ({})", self.detail())?;
        }
        Ok(())
    }
}
