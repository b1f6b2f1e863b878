//! Post-processing error types.

use thiserror::Error;

use crate::backend::BackendError;
use crate::effect::InjectionPoint;
use crate::history::HistoryId;

/// Errors raised by the scheduler, the history ring and effects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PostFxError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("unknown effect identifier: {0}")]
    UnknownEffect(String),
    #[error("effect {effect} cannot be injected at {point:?}")]
    UnsupportedInjectionPoint {
        effect: String,
        point: InjectionPoint,
    },
    #[error("history buffer {0:?} is not allocated")]
    HistoryNotAllocated(HistoryId),
    #[error("history buffer {id:?} holds {buffer_count} frames, requested {frames_ago} frames ago")]
    FramesAgoOutOfRange {
        id: HistoryId,
        frames_ago: usize,
        buffer_count: usize,
    },
    #[error("effect {effect} failed: {reason}")]
    EffectFailed { effect: String, reason: String },
}

pub type PostFxResult<T> = Result<T, PostFxError>;
