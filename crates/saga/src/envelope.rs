//! Broker messages: a step name plus the envelope it carries.

use std::fmt;

use common::{SagaStateId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::SagaError;
use crate::step::Step;

/// What a message is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    /// An in-flight checkout, identified by its saga state.
    SagaState(SagaStateId),
    /// A bare user id, carried by the account deletion flow.
    User(UserId),
    /// No subject. Used by the stateless orphaned-product sweep.
    Unscoped,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::SagaState(id) => write!(f, "saga_state:{id}"),
            Subject::User(id) => write!(f, "user:{id}"),
            Subject::Unscoped => f.write_str("unscoped"),
        }
    }
}

/// The data a step message carries.
///
/// On the wire this is `{sagaStateId, retryCount?}` or `{userId, retryCount?}`.
/// A missing `retryCount` reads as 0. It grows by one on each re-emission of
/// the same step and resets to 0 when control passes to another step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireEnvelope", into = "WireEnvelope")]
pub struct StepEnvelope {
    pub subject: Subject,
    pub retry_count: u32,
}

impl StepEnvelope {
    /// Creates a first-attempt envelope.
    pub fn new(subject: Subject) -> Self {
        Self {
            subject,
            retry_count: 0,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saga_state_id: Option<SagaStateId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<UserId>,
    #[serde(default)]
    retry_count: u32,
}

impl TryFrom<WireEnvelope> for StepEnvelope {
    type Error = SagaError;

    fn try_from(wire: WireEnvelope) -> Result<Self, Self::Error> {
        let subject = match (wire.saga_state_id, wire.user_id) {
            (Some(id), None) => Subject::SagaState(id),
            (None, Some(user_id)) => Subject::User(user_id),
            (None, None) => Subject::Unscoped,
            (Some(_), Some(_)) => {
                return Err(SagaError::InvalidSubject(
                    "both sagaStateId and userId present".to_string(),
                ));
            }
        };
        Ok(Self {
            subject,
            retry_count: wire.retry_count,
        })
    }
}

impl From<StepEnvelope> for WireEnvelope {
    fn from(envelope: StepEnvelope) -> Self {
        let (saga_state_id, user_id) = match envelope.subject {
            Subject::SagaState(id) => (Some(id), None),
            Subject::User(user_id) => (None, Some(user_id)),
            Subject::Unscoped => (None, None),
        };
        Self {
            saga_state_id,
            user_id,
            retry_count: envelope.retry_count,
        }
    }
}

/// A step to run and the envelope it runs with.
///
/// Serialized as `{"pattern": "<topic>", "data": {...}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaMessage {
    #[serde(rename = "pattern")]
    pub step: Step,
    #[serde(rename = "data")]
    pub envelope: StepEnvelope,
}

impl SagaMessage {
    /// Creates a first-attempt message for a checkout saga state.
    pub fn for_saga(step: Step, id: SagaStateId) -> Self {
        Self {
            step,
            envelope: StepEnvelope::new(Subject::SagaState(id)),
        }
    }

    /// Creates a first-attempt message carrying a bare user id.
    pub fn for_user(step: Step, user_id: UserId) -> Self {
        Self {
            step,
            envelope: StepEnvelope::new(Subject::User(user_id)),
        }
    }

    /// Creates a first-attempt message without a subject.
    pub fn unscoped(step: Step) -> Self {
        Self {
            step,
            envelope: StepEnvelope::new(Subject::Unscoped),
        }
    }

    /// Returns the same step and subject with the retry count incremented.
    pub fn retried(&self) -> Self {
        Self {
            step: self.step,
            envelope: StepEnvelope {
                subject: self.envelope.subject,
                retry_count: self.envelope.retry_count + 1,
            },
        }
    }

    /// Returns the same subject on `step`, as a first attempt.
    pub fn advance(&self, step: Step) -> Self {
        Self {
            step,
            envelope: StepEnvelope::new(self.envelope.subject),
        }
    }

    /// Returns the failure message for this step, if it has one.
    pub fn failed(&self) -> Option<Self> {
        self.step.failed().map(|step| self.advance(step))
    }

    /// Returns the saga state id, if this message carries one.
    pub fn saga_state_id(&self) -> Option<SagaStateId> {
        match self.envelope.subject {
            Subject::SagaState(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the user id, if this message carries one.
    pub fn user_id(&self) -> Option<UserId> {
        match self.envelope.subject {
            Subject::User(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the saga state id, logging the message as dropped otherwise.
    pub(crate) fn require_saga_state(&self) -> Option<SagaStateId> {
        let id = self.saga_state_id();
        if id.is_none() {
            tracing::warn!(
                step = %self.step,
                subject = %self.envelope.subject,
                "dropping message without a saga state id"
            );
        }
        id
    }

    /// Returns the user id, logging the message as dropped otherwise.
    pub(crate) fn require_user(&self) -> Option<UserId> {
        let id = self.user_id();
        if id.is_none() {
            tracing::warn!(
                step = %self.step,
                subject = %self.envelope.subject,
                "dropping message without a user id"
            );
        }
        id
    }

    /// Encodes the message in its wire form.
    pub fn to_json(&self) -> Result<String, SagaError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a message from its wire form.
    pub fn from_json(raw: &str) -> Result<Self, SagaError> {
        Ok(serde_json::from_str(raw)?)
    }
}
