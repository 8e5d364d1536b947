//! RegisterDeviceUseCase: the PIM setup flow.
//!
//! The coordinator turns form input into either a new registration, an abort,
//! or a form redisplay with an error token.
//!
//! # Flow
//!
//! ```text
//!                      ┌────────────── no input ───────────────┐
//!                      ▼                                        │
//!  AwaitingInput ── input ──► host key already registered? ── yes ──► Duplicate (abort)
//!        ▲                              │ no
//!        │                              ▼
//!        │                         Validating ── error ──► Failed ──┐
//!        │                              │ ok                        │
//!        └──────────── form + error token ◄─────────────────────────┘
//!                                       ▼
//!                        network id already registered? ── yes ──► Duplicate (abort)
//!                                       │ no
//!                                       ▼
//!                                    Success (record created)
//! ```
//!
//! The host check runs before validation so an obvious duplicate never costs
//! a connection attempt.  The network-id check runs after, because the same
//! bus can be reached through a different address.
//!
//! # Freshness
//!
//! Both checks read a snapshot of the store.  Two coordinators registering
//! the same PIM at once can both pass the checks; the store's atomic
//! `create_if_absent` then lets only one of them through and the other ends
//! as a duplicate.  Callers that need the host check to be race-free must
//! serialize flows themselves.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use upb_core::{
    data_schema, url_already_configured, AbortReason, ConnectionParameters, ErrorToken,
    FormSchema, RegistrationRecord, BASE_ERROR_KEY,
};

use super::validate_connection::{Validate, ValidationError, VALIDATE_TIMEOUT};

/// Error type for registration store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error accessing registrations at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("registration store is unreadable: {0}")]
    Corrupt(String),
    #[error("registration store lock poisoned")]
    Poisoned,
}

/// Persistence for registration records.
pub trait RegistrationStore: Send + Sync {
    /// All current records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing storage cannot be read.
    fn records(&self) -> Result<Vec<RegistrationRecord>, StoreError>;

    /// Stores `record` unless one with the same `id` exists.  Returns whether
    /// it was stored.  Check and insert happen atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing storage cannot be updated.
    fn create_if_absent(&self, record: RegistrationRecord) -> Result<bool, StoreError>;
}

/// Errors that end a flow without an outcome.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("setup flow already finished ({0:?})")]
    Finished(FlowState),
}

/// Which entry point started the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowSource {
    /// Interactive form.
    #[default]
    User,
    /// Bulk import of pre-built parameters.
    Import,
}

/// Where the flow is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    AwaitingInput,
    Validating,
    Failed(ErrorToken),
    Duplicate,
    Success,
}

impl FlowState {
    /// Whether the flow is over.  `Failed` is not: it falls back to
    /// `AwaitingInput` so the user can correct the form.
    pub fn is_terminal(self) -> bool {
        matches!(self, FlowState::Duplicate | FlowState::Success)
    }
}

/// What the host should do after a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowResult {
    /// Show (or redisplay) the form.  `errors` maps field names to tokens.
    ShowForm {
        schema: FormSchema,
        errors: BTreeMap<String, ErrorToken>,
    },
    /// End the flow without creating anything.
    Abort { reason: AbortReason },
    /// A registration was created.
    CreateEntry { record: RegistrationRecord },
}

impl FlowResult {
    fn show_form(error: Option<ErrorToken>) -> Self {
        let errors = error
            .map(|token| BTreeMap::from([(BASE_ERROR_KEY.to_string(), token)]))
            .unwrap_or_default();
        FlowResult::ShowForm {
            schema: data_schema(),
            errors,
        }
    }

    fn already_configured() -> Self {
        FlowResult::Abort {
            reason: AbortReason::AlreadyConfigured,
        }
    }
}

/// Drives one PIM setup flow.
///
/// Step methods take `&mut self`, so at most one validation is in flight per
/// coordinator.
pub struct RegistrationCoordinator {
    validator: Arc<dyn Validate>,
    store: Arc<dyn RegistrationStore>,
    deadline: Duration,
    source: FlowSource,
    state: FlowState,
}

impl RegistrationCoordinator {
    /// Creates a user-driven flow with the default deadline.
    pub fn new(validator: Arc<dyn Validate>, store: Arc<dyn RegistrationStore>) -> Self {
        Self {
            validator,
            store,
            deadline: VALIDATE_TIMEOUT,
            source: FlowSource::User,
            state: FlowState::AwaitingInput,
        }
    }

    /// Overrides the validation deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn source(&self) -> FlowSource {
        self.source
    }

    /// Handles the form step.  `None` asks for the empty form.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Finished`] once the flow has ended.  Store
    /// failures are not errors here: they are logged and the form comes back
    /// with the `unknown` token.
    pub async fn handle_user_step(
        &mut self,
        input: Option<ConnectionParameters>,
    ) -> Result<FlowResult, RegistrationError> {
        if self.state.is_terminal() {
            return Err(RegistrationError::Finished(self.state));
        }
        let Some(input) = input else {
            self.transition(FlowState::AwaitingInput);
            return Ok(FlowResult::show_form(None));
        };

        let url = input.effective_url();
        let existing = match self.store.records() {
            Ok(records) => records,
            Err(e) => return Ok(self.store_failure(&e)),
        };
        if url_already_configured(&url, &existing) {
            info!("UPB PIM at {url} is already configured");
            self.transition(FlowState::Duplicate);
            return Ok(FlowResult::already_configured());
        }

        self.transition(FlowState::Validating);
        let result = match self.validator.validate(&input, self.deadline).await {
            Ok(result) => result,
            Err(e) => {
                self.report_failure(&e);
                return Ok(self.fail(e.token()));
            }
        };

        let network_id = result.network_id.clone();
        let existing = match self.store.records() {
            Ok(records) => records,
            Err(e) => return Ok(self.store_failure(&e)),
        };
        if existing.iter().any(|r| r.id == network_id) {
            info!("UPB network {network_id} is already configured");
            self.transition(FlowState::Duplicate);
            return Ok(FlowResult::already_configured());
        }

        let record = match self.source {
            FlowSource::User => RegistrationRecord::from_user(result, &input),
            FlowSource::Import => RegistrationRecord::from_import(result, input),
        };
        let created = match self.store.create_if_absent(record.clone()) {
            Ok(created) => created,
            Err(e) => return Ok(self.store_failure(&e)),
        };
        if !created {
            warn!("UPB network {network_id} was registered concurrently");
            self.transition(FlowState::Duplicate);
            return Ok(FlowResult::already_configured());
        }

        info!("registered UPB network {network_id} at {}", record.host);
        self.transition(FlowState::Success);
        Ok(FlowResult::CreateEntry { record })
    }

    /// Handles an import: the same step, storing the raw parameters.
    ///
    /// # Errors
    ///
    /// See [`handle_user_step`](Self::handle_user_step).
    pub async fn handle_import(
        &mut self,
        input: ConnectionParameters,
    ) -> Result<FlowResult, RegistrationError> {
        self.source = FlowSource::Import;
        self.handle_user_step(Some(input)).await
    }

    fn transition(&mut self, next: FlowState) {
        debug!("setup flow {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Back to the form with `token`, ready for another submission.
    fn fail(&mut self, token: ErrorToken) -> FlowResult {
        self.transition(FlowState::Failed(token));
        self.transition(FlowState::AwaitingInput);
        FlowResult::show_form(Some(token))
    }

    fn store_failure(&mut self, err: &StoreError) -> FlowResult {
        error!("unexpected exception while accessing UPB registrations: {err}");
        self.fail(ErrorToken::Unknown)
    }

    fn report_failure(&self, err: &ValidationError) {
        match err {
            ValidationError::Unclassified(detail) => {
                error!("unexpected exception while validating UPB PIM: {detail}");
            }
            other => warn!("UPB PIM validation failed: {other}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
