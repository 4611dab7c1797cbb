use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::Event;

/// Hard ceiling on a stored value. Web localStorage quotas sit around this
/// size; larger writes are rejected in the core before reaching the shell.
pub const MAX_RECORD_BYTES: usize = 10 * 1024 * 1024;

/// Single-key persistence. The shell maps this onto whatever local store the
/// platform has (localStorage, UserDefaults, SharedPreferences).
#[derive(Clone)]
pub struct Storage<E> {
    context: CapabilityContext<StorageOperation, E>,
}

impl<Ev> Capability<Ev> for Storage<Ev> {
    type Operation = StorageOperation;
    type MappedSelf<MappedEv> = Storage<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Storage::new(self.context.map_event(f))
    }
}

impl<E> Storage<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<StorageOperation, E>) -> Self {
        Self { context }
    }

    pub fn read<F>(&self, key: &str, make_event: F)
    where
        F: FnOnce(StorageResult) -> E + Send + 'static,
    {
        let context = self.context.clone();
        let key = key.to_string();
        self.context.spawn(async move {
            let response = context
                .request_from_shell(StorageOperation::Read { key })
                .await;
            context.update_app(make_event(response));
        });
    }

    pub fn write<F>(&self, key: &str, value: Vec<u8>, make_event: F)
    where
        F: FnOnce(StorageResult) -> E + Send + 'static,
    {
        // Reject oversized values without a shell round trip.
        if value.len() > MAX_RECORD_BYTES {
            let err = StorageError::ValueTooLarge {
                size: value.len(),
                max: MAX_RECORD_BYTES,
            };
            let context = self.context.clone();
            self.context.spawn(async move {
                context.update_app(make_event(Err(err)));
            });
            return;
        }

        let context = self.context.clone();
        let key = key.to_string();
        self.context.spawn(async move {
            let response = context
                .request_from_shell(StorageOperation::Write { key, value })
                .await;
            context.update_app(make_event(response));
        });
    }

    pub fn delete<F>(&self, key: &str, make_event: F)
    where
        F: FnOnce(StorageResult) -> E + Send + 'static,
    {
        let context = self.context.clone();
        let key = key.to_string();
        self.context.spawn(async move {
            let response = context
                .request_from_shell(StorageOperation::Delete { key })
                .await;
            context.update_app(make_event(response));
        });
    }
}

pub type StorageCapability = Storage<Event>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StorageOperation {
    Read {
        key: String,
    },
    Write {
        key: String,
        #[serde(with = "serde_bytes")]
        value: Vec<u8>,
    },
    Delete {
        key: String,
    },
}

impl Operation for StorageOperation {
    type Output = StorageResult;
}

pub type StorageResult = Result<StorageOutput, StorageError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StorageOutput {
    /// `None` when the key does not exist.
    Value(#[serde(with = "serde_bytes")] Option<Vec<u8>>),
    Written,
    Deleted { existed: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage backend error ({code:?}): {message}")]
    Backend {
        code: StorageErrorCode,
        message: String,
        retryable: bool,
    },
    #[error("storage quota exceeded: {used} of {limit} bytes")]
    QuotaExceeded { used: u64, limit: u64 },
    #[error("value is {size} bytes, larger than the {max} byte limit")]
    ValueTooLarge { size: usize, max: usize },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StorageErrorCode {
    Unavailable,
    AccessDenied,
    Corrupted,
    Io,
    Unknown,
}

impl StorageErrorCode {
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            StorageErrorCode::Unavailable | StorageErrorCode::Io | StorageErrorCode::Unknown
        )
    }
}

impl StorageError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Backend { retryable, .. } => *retryable,
            StorageError::QuotaExceeded { .. } | StorageError::ValueTooLarge { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_codes_are_retryable() {
        assert!(StorageErrorCode::Unavailable.is_retryable());
        assert!(StorageErrorCode::Io.is_retryable());
        assert!(StorageErrorCode::Unknown.is_retryable());
        assert!(!StorageErrorCode::AccessDenied.is_retryable());
        assert!(!StorageErrorCode::Corrupted.is_retryable());
    }

    #[test]
    fn size_and_quota_failures_are_terminal() {
        let err = StorageError::ValueTooLarge { size: 11, max: 10 };
        assert!(!err.is_retryable());

        let err = StorageError::QuotaExceeded {
            used: 100,
            limit: 50,
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn operations_serialize_for_the_shell_boundary() {
        let op = StorageOperation::Write {
            key: "k".into(),
            value: vec![1, 2, 3],
        };
        let json = serde_json::to_string(&op).unwrap();
        let back: StorageOperation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn missing_value_round_trips() {
        let out = StorageOutput::Value(None);
        let json = serde_json::to_string(&out).unwrap();
        assert_eq!(serde_json::from_str::<StorageOutput>(&json).unwrap(), out);
    }
}
