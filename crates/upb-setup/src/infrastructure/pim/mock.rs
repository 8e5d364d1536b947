//! Scriptable PIM client for tests.
//!
//! # Why a mock controller?
//!
//! The real client opens sockets and serial ports and needs a PIM on the
//! other end.  `MockController` replaces all of that with a scripted
//! [`ConnectBehavior`] and counts every `connect` / `disconnect` call in a
//! shared [`ControllerProbe`], so tests can assert that a connection was (or
//! was not) attempted and that it was always released.
//!
//! # Usage in tests
//!
//! ```ignore
//! let factory = Arc::new(MockControllerFactory::new(
//!     ConnectBehavior::After(Duration::from_secs(2)),
//!     Some("NET42"),
//! ));
//! let validator = ConnectionValidator::new(factory.clone());
//!
//! validator.validate(&params, VALIDATE_TIMEOUT).await?;
//!
//! assert_eq!(factory.create_count(), 1);
//! assert_eq!(factory.last_probe().unwrap().disconnect_calls(), 1);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::application::validate_connection::{
    ConnectedCallback, ControllerError, ControllerFactory, DeviceController,
};

/// How a mock controller reacts to `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    /// Fires the callback inside `connect`.
    Immediately,
    /// Fires the callback from a spawned task after the delay.
    After(Duration),
    /// Holds on to the callback until `disconnect`.
    Never,
    /// Drops the callback without firing it.
    Refuse,
}

/// Call counters shared between a mock controller and the test.
#[derive(Debug, Default)]
pub struct ControllerProbe {
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl ControllerProbe {
    pub fn connect_calls(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

/// A PIM client that follows a script instead of touching hardware.
pub struct MockController {
    config_ok: bool,
    network_id: Option<String>,
    behavior: ConnectBehavior,
    probe: Arc<ControllerProbe>,
    pending: Option<ConnectedCallback>,
    task: Option<JoinHandle<()>>,
}

impl MockController {
    pub fn new(
        behavior: ConnectBehavior,
        network_id: Option<String>,
        config_ok: bool,
        probe: Arc<ControllerProbe>,
    ) -> Self {
        Self {
            config_ok,
            network_id,
            behavior,
            probe,
            pending: None,
            task: None,
        }
    }
}

impl DeviceController for MockController {
    fn config_ok(&self) -> bool {
        self.config_ok
    }

    fn connect(&mut self, on_connected: ConnectedCallback) {
        self.probe.connects.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            ConnectBehavior::Immediately => on_connected(),
            ConnectBehavior::After(delay) => {
                self.task = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    on_connected();
                }));
            }
            ConnectBehavior::Never => self.pending = Some(on_connected),
            ConnectBehavior::Refuse => drop(on_connected),
        }
    }

    fn disconnect(&mut self) {
        self.probe.disconnects.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.pending = None;
    }

    fn network_id(&self) -> Option<String> {
        self.network_id.clone()
    }
}

/// Hands out [`MockController`]s and remembers what it was asked for.
pub struct MockControllerFactory {
    behavior: ConnectBehavior,
    network_id: Option<String>,
    network_ids_by_url: HashMap<String, String>,
    config_ok: bool,
    fail_create: bool,
    created: Mutex<Vec<String>>,
    probes: Mutex<Vec<Arc<ControllerProbe>>>,
}

impl MockControllerFactory {
    /// Every controller follows `behavior` and reports `network_id`.
    pub fn new(behavior: ConnectBehavior, network_id: Option<&str>) -> Self {
        Self {
            behavior,
            network_id: network_id.map(str::to_string),
            network_ids_by_url: HashMap::new(),
            config_ok: true,
            fail_create: false,
            created: Mutex::new(Vec::new()),
            probes: Mutex::new(Vec::new()),
        }
    }

    /// Sets what `config_ok` reports.
    pub fn with_config_ok(mut self, config_ok: bool) -> Self {
        self.config_ok = config_ok;
        self
    }

    /// Controllers built for `url` report `network_id` instead of the default.
    pub fn with_network_id_for(mut self, url: &str, network_id: &str) -> Self {
        self.network_ids_by_url
            .insert(url.to_string(), network_id.to_string());
        self
    }

    /// Makes `create` fail, as for an unusable URL.
    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// URLs passed to `create`, in call order.
    pub fn created_urls(&self) -> Vec<String> {
        self.created.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn create_count(&self) -> usize {
        self.created.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Probe of the most recently created controller.
    pub fn last_probe(&self) -> Option<Arc<ControllerProbe>> {
        self.probes.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }
}

impl ControllerFactory for MockControllerFactory {
    fn create(
        &self,
        url: &str,
        _export_file_path: &str,
    ) -> Result<Box<dyn DeviceController>, ControllerError> {
        self.created.lock().unwrap_or_else(PoisonError::into_inner).push(url.to_string());
        if self.fail_create {
            return Err(ControllerError::UnsupportedScheme("mock".to_string()));
        }

        let probe = Arc::new(ControllerProbe::default());
        self.probes.lock().unwrap_or_else(PoisonError::into_inner).push(Arc::clone(&probe));
        let network_id = self
            .network_ids_by_url
            .get(url)
            .cloned()
            .or_else(|| self.network_id.clone());

        Ok(Box::new(MockController::new(
            self.behavior,
            network_id,
            self.config_ok,
            probe,
        )))
    }
}
