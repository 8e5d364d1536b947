//! ValidateConnectionUseCase: one bounded-time connection attempt to a PIM.
//!
//! The PIM client library reports a successful connection through a callback
//! rather than a return value.  The validator bridges that into async code:
//!
//! ```text
//! validate(params, deadline)
//!   ├─ factory.create(url, export_file)      build the client
//!   ├─ client.config_ok()?                   export file usable?  else InvalidConfiguration
//!   ├─ client.connect(callback)              callback fires a oneshot sender
//!   ├─ timeout_at(expiry, receiver)          wait for the signal or the deadline
//!   └─ client.disconnect()                   always, on every exit path
//! ```
//!
//! Exactly one attempt is made per call.  There is no retry and no progress
//! reporting.  Only the signal ends the wait early: an attempt that gives up
//! before the deadline still fails at the deadline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error};
use upb_core::{ConnectionParameters, ErrorToken, ValidationResult, DEFAULT_TITLE};

/// Deadline for a single validation attempt.
pub const VALIDATE_TIMEOUT: Duration = Duration::from_secs(15);

/// Invoked by a [`DeviceController`] once its connection is up.
pub type ConnectedCallback = Box<dyn FnOnce() + Send + 'static>;

/// Why a validation attempt failed.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The export file is missing or unusable.  Retrying will not help.
    #[error("missing or invalid UPB export file: '{file_path}'")]
    InvalidConfiguration { file_path: String },

    /// The PIM did not report a connection in time.
    #[error("timed out after {}s trying to connect with UPB PIM at {url}", .deadline.as_secs_f64())]
    CannotConnect { url: String, deadline: Duration },

    /// Anything else.  The text is for logs only and never reaches the form.
    #[error("unexpected validation failure: {0}")]
    Unclassified(String),
}

impl ValidationError {
    /// Token shown to the user for this failure.
    pub fn token(&self) -> ErrorToken {
        match self {
            ValidationError::InvalidConfiguration { .. } => ErrorToken::InvalidUpbFile,
            ValidationError::CannotConnect { .. } => ErrorToken::CannotConnect,
            ValidationError::Unclassified(_) => ErrorToken::Unknown,
        }
    }
}

/// Raised when a PIM client cannot even be constructed.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("invalid PIM URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unsupported PIM URL scheme '{0}'")]
    UnsupportedScheme(String),
}

/// The PIM client, as seen by the validator.
///
/// Implementations live in the infrastructure layer.  `connect` must not
/// block: it starts the attempt and returns, later invoking `on_connected`
/// at most once.  Dropping the callback without calling it means the attempt
/// is over and will never succeed.
pub trait DeviceController: Send {
    /// Whether the export file was accepted.
    fn config_ok(&self) -> bool;

    /// Starts connecting.
    fn connect(&mut self, on_connected: ConnectedCallback);

    /// Stops any attempt in progress and closes the transport.  Must be safe
    /// to call before `connect` and more than once.
    fn disconnect(&mut self);

    /// Network id of the bus, known once the export file has been read.
    fn network_id(&self) -> Option<String>;
}

/// Builds PIM clients for a URL and export file.
pub trait ControllerFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ControllerError`] when the URL cannot be used at all.
    fn create(
        &self,
        url: &str,
        export_file_path: &str,
    ) -> Result<Box<dyn DeviceController>, ControllerError>;
}

/// Seam between the registration flow and the validator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Validate: Send + Sync {
    /// Checks that `params` reach a working PIM within `deadline`.
    async fn validate(
        &self,
        params: &ConnectionParameters,
        deadline: Duration,
    ) -> Result<ValidationResult, ValidationError>;
}

/// Disconnects the wrapped controller when dropped.
///
/// Covers early returns, errors, and the validation future itself being
/// dropped mid-wait.
struct Session {
    controller: Box<dyn DeviceController>,
}

impl Session {
    fn close(self) {}
}

impl Drop for Session {
    fn drop(&mut self) {
        self.controller.disconnect();
    }
}

/// Validates connection parameters against a real (or mock) PIM client.
pub struct ConnectionValidator {
    factory: Arc<dyn ControllerFactory>,
}

impl ConnectionValidator {
    pub fn new(factory: Arc<dyn ControllerFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl Validate for ConnectionValidator {
    async fn validate(
        &self,
        params: &ConnectionParameters,
        deadline: Duration,
    ) -> Result<ValidationResult, ValidationError> {
        let url = params.effective_url();
        let file_path = params.file_path.clone();

        let controller = self
            .factory
            .create(&url, &file_path)
            .map_err(|e| ValidationError::Unclassified(e.to_string()))?;
        let mut session = Session { controller };

        if !session.controller.config_ok() {
            error!("missing or invalid UPB file: '{file_path}'");
            return Err(ValidationError::InvalidConfiguration { file_path });
        }

        let (tx, rx) = oneshot::channel::<()>();
        session.controller.connect(Box::new(move || {
            let _ = tx.send(());
        }));
        debug!("waiting up to {deadline:?} for UPB PIM at {url}");

        // A dropped callback means the attempt is over, but the caller is
        // still owed the full deadline before hearing `CannotConnect`.
        let expires = Instant::now() + deadline;
        let connected = match tokio::time::timeout_at(expires, rx).await {
            Ok(Ok(())) => true,
            Ok(Err(_)) => {
                debug!("connection attempt to UPB PIM at {url} gave up early");
                tokio::time::sleep_until(expires).await;
                false
            }
            Err(_) => false,
        };
        let network_id = session.controller.network_id();
        session.close();

        if !connected {
            error!(
                "timed out after {} seconds trying to connect with UPB PIM at {url}",
                deadline.as_secs()
            );
            return Err(ValidationError::CannotConnect { url, deadline });
        }

        let network_id = network_id.ok_or_else(|| {
            ValidationError::Unclassified(format!(
                "UPB PIM at {url} connected without reporting a network id"
            ))
        })?;
        Ok(ValidationResult {
            network_id,
            title: DEFAULT_TITLE.to_string(),
            url,
            file_path,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::pim::mock::{ConnectBehavior, MockControllerFactory};
    use tokio_test::assert_err;
    use upb_core::TransportKind;

    /// Paused-clock timers land on millisecond ticks.
    fn assert_elapsed(start: Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(elapsed >= expected, "finished early: {elapsed:?} < {expected:?}");
        assert!(
            elapsed < expected + Duration::from_millis(5),
            "finished late: {elapsed:?} vs {expected:?}"
        );
    }

    fn tcp_params() -> ConnectionParameters {
        ConnectionParameters::new(TransportKind::Tcp, "192.0.2.5:2101", "")
    }

    fn validator(factory: &Arc<MockControllerFactory>) -> ConnectionValidator {
        ConnectionValidator::new(Arc::clone(factory) as Arc<dyn ControllerFactory>)
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_returns_network_id_when_connected_in_time() {
        // Arrange
        let factory = Arc::new(MockControllerFactory::new(
            ConnectBehavior::After(Duration::from_secs(2)),
            Some("NET42"),
        ));

        // Act
        let result = validator(&factory)
            .validate(&tcp_params(), VALIDATE_TIMEOUT)
            .await
            .unwrap();

        // Assert
        assert_eq!(result.network_id, "NET42");
        assert_eq!(result.title, "UPB");
        assert_eq!(result.url, "tcp://192.0.2.5:2101");
        assert_eq!(result.file_path, "");
        assert_eq!(factory.created_urls(), vec!["tcp://192.0.2.5:2101".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_returns_as_soon_as_signal_fires() {
        let factory = Arc::new(MockControllerFactory::new(
            ConnectBehavior::After(Duration::from_secs(2)),
            Some("NET42"),
        ));
        let start = Instant::now();

        validator(&factory)
            .validate(&tcp_params(), VALIDATE_TIMEOUT)
            .await
            .unwrap();

        assert_elapsed(start, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_times_out_exactly_at_deadline() {
        // Arrange
        let factory = Arc::new(MockControllerFactory::new(ConnectBehavior::Never, Some("NET42")));
        let start = Instant::now();

        // Act
        let err = validator(&factory)
            .validate(&tcp_params(), VALIDATE_TIMEOUT)
            .await
            .unwrap_err();

        // Assert
        assert_elapsed(start, VALIDATE_TIMEOUT);
        assert_eq!(err.token(), ErrorToken::CannotConnect);
        match err {
            ValidationError::CannotConnect { url, deadline } => {
                assert_eq!(url, "tcp://192.0.2.5:2101");
                assert_eq!(deadline, VALIDATE_TIMEOUT);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_disconnects_after_timeout() {
        let factory = Arc::new(MockControllerFactory::new(ConnectBehavior::Never, Some("NET42")));

        let _ = validator(&factory).validate(&tcp_params(), VALIDATE_TIMEOUT).await;

        let probe = factory.last_probe().unwrap();
        assert_eq!(probe.connect_calls(), 1);
        assert_eq!(probe.disconnect_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validate_disconnects_after_success() {
        let factory = Arc::new(MockControllerFactory::new(ConnectBehavior::Immediately, Some("N1")));

        validator(&factory)
            .validate(&tcp_params(), VALIDATE_TIMEOUT)
            .await
            .unwrap();

        assert_eq!(factory.last_probe().unwrap().disconnect_calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_export_file_fails_without_connecting() {
        // Arrange
        let factory = Arc::new(
            MockControllerFactory::new(ConnectBehavior::Immediately, Some("NET42"))
                .with_config_ok(false),
        );
        let params = ConnectionParameters::new(TransportKind::Tcp, "192.0.2.5:2101", "/missing.upe");

        // Act
        let err = validator(&factory)
            .validate(&params, VALIDATE_TIMEOUT)
            .await
            .unwrap_err();

        // Assert
        assert_eq!(err.token(), ErrorToken::InvalidUpbFile);
        let probe = factory.last_probe().unwrap();
        assert_eq!(probe.connect_calls(), 0, "must not attempt a connection");
        assert_eq!(probe.disconnect_calls(), 1, "client is still released");
    }

    #[tokio::test]
    async fn test_factory_error_is_unclassified() {
        let factory = Arc::new(
            MockControllerFactory::new(ConnectBehavior::Immediately, None).failing_create(),
        );

        let err = validator(&factory)
            .validate(&tcp_params(), VALIDATE_TIMEOUT)
            .await
            .unwrap_err();

        assert!(matches!(err, ValidationError::Unclassified(_)));
        assert_eq!(err.token(), ErrorToken::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_callback_still_waits_out_the_deadline() {
        // Arrange: the controller gives up at once, as a refused TCP connect does
        let factory = Arc::new(MockControllerFactory::new(ConnectBehavior::Refuse, Some("NET42")));
        let start = Instant::now();

        // Act
        let result = validator(&factory).validate(&tcp_params(), VALIDATE_TIMEOUT).await;

        // Assert
        let err = assert_err!(result);
        assert_eq!(err.token(), ErrorToken::CannotConnect);
        assert_elapsed(start, VALIDATE_TIMEOUT);
        assert_eq!(factory.last_probe().unwrap().disconnect_calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_network_id_after_connect_is_unclassified() {
        let factory = Arc::new(MockControllerFactory::new(ConnectBehavior::Immediately, None));

        let err = validator(&factory)
            .validate(&tcp_params(), VALIDATE_TIMEOUT)
            .await
            .unwrap_err();

        assert_eq!(err.token(), ErrorToken::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_validation_mid_wait_still_disconnects() {
        // Arrange
        let factory = Arc::new(MockControllerFactory::new(ConnectBehavior::Never, Some("NET42")));
        let v = validator(&factory);
        let params = tcp_params();

        // Act: give up on the validation before the deadline
        let _ = tokio::time::timeout(
            Duration::from_secs(1),
            v.validate(&params, VALIDATE_TIMEOUT),
        )
        .await;

        // Assert
        assert_eq!(factory.last_probe().unwrap().disconnect_calls(), 1);
    }

    #[test]
    fn test_error_display_carries_deadline_and_url() {
        let err = ValidationError::CannotConnect {
            url: "tcp://pim:2101".to_string(),
            deadline: Duration::from_secs(15),
        };
        assert_eq!(
            err.to_string(),
            "timed out after 15s trying to connect with UPB PIM at tcp://pim:2101"
        );
    }
}
