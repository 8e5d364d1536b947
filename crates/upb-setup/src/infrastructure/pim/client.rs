//! PIM client over TCP or a serial port.
//!
//! A PIM is reachable in two ways:
//!
//! - `tcp://host[:port]` – through a serial-to-TCP server.  The port defaults
//!   to 2101, the usual serial-server port.
//! - `serial://<device>` – a local port such as `serial:///dev/ttyUSB0` or
//!   `serial://COM3`, opened at 4800 baud 8N1.  Needs the `serial` feature.
//!
//! The client opens the transport on a spawned Tokio task, parks it in a slot
//! shared with the client, and then fires the connected callback.
//! `disconnect` aborts a task that is still opening and drops whatever sits
//! in the slot, so an open transport is closed by the time it returns.
//! If the transport cannot be opened the callback is dropped unfired.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::export_file::{read_export_file, ExportSummary};
use crate::application::validate_connection::{
    ConnectedCallback, ControllerError, ControllerFactory, DeviceController,
};

/// Port used when a `tcp://` URL does not name one.
pub const DEFAULT_TCP_PORT: u16 = 2101;

/// Line speed of a serial PIM.
pub const SERIAL_BAUD_RATE: u32 = 4800;

/// Where the PIM lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PimTarget {
    Tcp { host: String, port: u16 },
    Serial { device: String },
}

impl PimTarget {
    /// Parses a PIM URL.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::InvalidUrl`] for unparseable or incomplete
    /// URLs and [`ControllerError::UnsupportedScheme`] for anything other
    /// than `tcp` and `serial`.
    pub fn parse(url: &str) -> Result<Self, ControllerError> {
        let invalid = |reason: &str| ControllerError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };
        let parsed = Url::parse(url.trim()).map_err(|e| invalid(&e.to_string()))?;

        match parsed.scheme() {
            "tcp" => {
                let host = parsed
                    .host_str()
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| invalid("missing host"))?;
                let host = host.trim_start_matches('[').trim_end_matches(']');
                Ok(PimTarget::Tcp {
                    host: host.to_string(),
                    port: parsed.port().unwrap_or(DEFAULT_TCP_PORT),
                })
            }
            "serial" => {
                let host = parsed.host_str().unwrap_or_default();
                let device = format!("{host}{}", parsed.path());
                if device.is_empty() || device == "/" {
                    return Err(invalid("missing serial device"));
                }
                Ok(PimTarget::Serial { device })
            }
            other => Err(ControllerError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// An open transport.  Dropping it closes the connection.
type Transport = Box<dyn Send>;

/// Slot shared between the client and its connect task.
#[derive(Default)]
struct Link {
    closed: bool,
    transport: Option<Transport>,
}

impl Link {
    /// Parks `transport` unless the client has already disconnected.
    fn attach(link: &Mutex<Link>, transport: Transport) -> bool {
        let mut link = link.lock().unwrap_or_else(PoisonError::into_inner);
        if link.closed {
            return false;
        }
        link.transport = Some(transport);
        true
    }

    /// Marks the link closed and hands back the transport, if any.
    fn close(link: &Mutex<Link>) -> Option<Transport> {
        let mut link = link.lock().unwrap_or_else(PoisonError::into_inner);
        link.closed = true;
        link.transport.take()
    }
}

/// A PIM client for one URL and export file.
pub struct PimClient {
    target: PimTarget,
    export: Option<ExportSummary>,
    link: Arc<Mutex<Link>>,
    task: Option<JoinHandle<()>>,
}

impl PimClient {
    /// Parses the URL and reads the export file.
    ///
    /// An unreadable export file is not an error here; it shows up as
    /// `config_ok() == false`.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError`] when the URL is unusable.
    pub fn new(url: &str, export_file_path: &str) -> Result<Self, ControllerError> {
        let target = PimTarget::parse(url)?;
        let export = match read_export_file(export_file_path) {
            Ok(summary) => {
                debug!(
                    "UPStart export for network {} lists {} device(s)",
                    summary.network_id, summary.device_count
                );
                Some(summary)
            }
            Err(e) => {
                warn!("cannot use UPStart export '{export_file_path}': {e}");
                None
            }
        };
        Ok(Self {
            target,
            export,
            link: Arc::default(),
            task: None,
        })
    }
}

impl DeviceController for PimClient {
    fn config_ok(&self) -> bool {
        self.export.is_some()
    }

    fn connect(&mut self, on_connected: ConnectedCallback) {
        self.disconnect();
        self.link = Arc::default();
        let target = self.target.clone();
        let link = Arc::clone(&self.link);
        self.task = Some(tokio::spawn(open(target, link, on_connected)));
    }

    fn disconnect(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(transport) = Link::close(&self.link) {
            drop(transport);
            debug!("closed connection to {:?}", self.target);
        }
    }

    fn network_id(&self) -> Option<String> {
        self.export.as_ref().map(|e| e.network_id.clone())
    }
}

impl Drop for PimClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Opens the transport, parks it on `link`, and reports success.
async fn open(target: PimTarget, link: Arc<Mutex<Link>>, on_connected: ConnectedCallback) {
    match target {
        PimTarget::Tcp { host, port } => {
            match tokio::net::TcpStream::connect((host.as_str(), port)).await {
                Ok(stream) => {
                    if Link::attach(&link, Box::new(stream)) {
                        info!("connected to UPB PIM at tcp://{host}:{port}");
                        on_connected();
                    }
                }
                Err(e) => warn!("could not connect to UPB PIM at tcp://{host}:{port}: {e}"),
            }
        }
        PimTarget::Serial { device } => open_serial(device, &link, on_connected),
    }
}

#[cfg(feature = "serial")]
fn open_serial(device: String, link: &Mutex<Link>, on_connected: ConnectedCallback) {
    use tokio_serial::SerialPortBuilderExt;

    match tokio_serial::new(device.as_str(), SERIAL_BAUD_RATE).open_native_async() {
        Ok(port) => {
            if Link::attach(link, Box::new(port)) {
                info!("opened UPB PIM on serial port {device}");
                on_connected();
            }
        }
        Err(e) => warn!("could not open serial port {device}: {e}"),
    }
}

#[cfg(not(feature = "serial"))]
fn open_serial(device: String, _link: &Mutex<Link>, _on_connected: ConnectedCallback) {
    warn!(
        "serial port {device} requested at {SERIAL_BAUD_RATE} baud, but this build has no serial support (enable the `serial` feature)"
    );
}

/// Builds [`PimClient`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct PimClientFactory;

impl ControllerFactory for PimClientFactory {
    fn create(
        &self,
        url: &str,
        export_file_path: &str,
    ) -> Result<Box<dyn DeviceController>, ControllerError> {
        Ok(Box::new(PimClient::new(url, export_file_path)?))
    }
}
