//! Client options: server address, timeouts, reconnect rule, window
//! parameters, TLS and connection hooks.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Default IEC 104 port.
pub const DEFAULT_PORT: u16 = 2404;

/// Default TCP/TLS connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wait for control and command confirmations.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(15);

/// Default reconnect attempts (disabled).
pub const DEFAULT_RECONNECT_RETRIES: u32 = 0;

/// Default pause between reconnect attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(60);

/// Default idle interval before a TESTFR heartbeat (t3).
pub const DEFAULT_IDLE_TEST_INTERVAL: Duration = Duration::from_secs(20);

/// Default maximum unacknowledged sent I-frames (k).
pub const DEFAULT_K: u16 = 12;

/// Default received I-frames before a forced S-frame (w).
pub const DEFAULT_W: u16 = 8;

/// Capacity of the outbound frame queue feeding the writer.
pub const DEFAULT_SEND_QUEUE: usize = 32;

/// Hook invoked on connection establishment/loss.
pub type ConnectionHook = Arc<dyn Fn() + Send + Sync>;

/// Configuration for a [`Client`](crate::Client).
///
/// Accepted server forms: `host:port`, `:port` (loopback assumed) and
/// URLs with scheme `tcp`, `ssl`, `tls` or `tcps`. The secure schemes
/// require a rustls client configuration.
#[derive(Clone)]
pub struct ClientOption {
    pub(crate) server: Url,
    pub(crate) connect_timeout: Duration,
    pub(crate) confirm_timeout: Duration,
    pub(crate) reconnect_retries: u32,
    pub(crate) reconnect_interval: Duration,
    pub(crate) idle_test_interval: Option<Duration>,
    pub(crate) k: u16,
    pub(crate) w: u16,
    pub(crate) send_queue: usize,
    pub(crate) common_address: u16,
    pub(crate) originator: u8,
    pub(crate) tls: Option<Arc<rustls::ClientConfig>>,
    pub(crate) on_connect: Option<ConnectionHook>,
    pub(crate) on_disconnect: Option<ConnectionHook>,
}

impl ClientOption {
    /// Parse and normalize the server address.
    pub fn new(server: &str) -> Result<Self> {
        let mut normalized = if server.starts_with(':') {
            format!("127.0.0.1{server}")
        } else {
            server.to_string()
        };
        if !normalized.contains("://") {
            normalized = format!("tcp://{normalized}");
        }

        let url = Url::parse(&normalized)
            .map_err(|err| Error::Config(format!("invalid server address: {err}").into()))?;
        match url.scheme() {
            "tcp" | "ssl" | "tls" | "tcps" => {}
            other => {
                return Err(Error::Config(
                    format!("unknown URL scheme: {other}").into(),
                ));
            }
        }
        if url.host_str().is_none() {
            return Err(Error::config_static("server address has no host"));
        }

        Ok(Self {
            server: url,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            reconnect_retries: DEFAULT_RECONNECT_RETRIES,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            idle_test_interval: Some(DEFAULT_IDLE_TEST_INTERVAL),
            k: DEFAULT_K,
            w: DEFAULT_W,
            send_queue: DEFAULT_SEND_QUEUE,
            common_address: 1,
            originator: 0,
            tls: None,
            on_connect: None,
            on_disconnect: None,
        })
    }

    /// TCP/TLS connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Wait applied to STARTDT/STOPDT/TESTFR and command confirmations.
    pub fn confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    /// Reconnect rule: `retries` attempts spaced by `interval` after a
    /// transport failure. Zero retries disables reconnecting.
    pub fn auto_reconnect(mut self, retries: u32, interval: Duration) -> Self {
        self.reconnect_retries = retries;
        self.reconnect_interval = interval;
        self
    }

    /// Idle time before a TESTFR-act heartbeat; `None` disables it.
    pub fn idle_test_interval(mut self, interval: Option<Duration>) -> Self {
        self.idle_test_interval = interval;
        self
    }

    /// Sliding-window parameters: `k` unacknowledged sends allowed,
    /// S-frame forced after `w` unacknowledged receives.
    pub fn window(mut self, k: u16, w: u16) -> Self {
        self.k = k;
        self.w = w;
        self
    }

    /// Common (station) address used by outgoing commands.
    pub fn common_address(mut self, address: u16) -> Self {
        self.common_address = address;
        self
    }

    /// Originator address stamped on outgoing ASDUs.
    pub fn originator(mut self, originator: u8) -> Self {
        self.originator = originator;
        self
    }

    /// TLS configuration for the `ssl`/`tls`/`tcps` schemes.
    pub fn tls_config(mut self, config: Arc<rustls::ClientConfig>) -> Self {
        self.tls = Some(config);
        self
    }

    /// Hook invoked after the session reaches the started state.
    pub fn on_connect(mut self, hook: ConnectionHook) -> Self {
        self.on_connect = Some(hook);
        self
    }

    /// Hook invoked when the session tears down.
    pub fn on_disconnect(mut self, hook: ConnectionHook) -> Self {
        self.on_disconnect = Some(hook);
        self
    }

    /// Whether the scheme selects TLS.
    pub fn is_secure(&self) -> bool {
        matches!(self.server.scheme(), "ssl" | "tls" | "tcps")
    }

    /// Host part of the server address.
    pub(crate) fn host(&self) -> &str {
        self.server.host_str().unwrap_or("127.0.0.1")
    }

    /// `host:port` dial target.
    pub(crate) fn endpoint(&self) -> String {
        format!("{}:{}", self.host(), self.server.port().unwrap_or(DEFAULT_PORT))
    }

    /// Reject impossible parameter combinations before dialing.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() || self.confirm_timeout.is_zero() {
            return Err(Error::config_static("timeouts must be non-zero"));
        }
        if self.k == 0 || self.w == 0 || self.w > self.k {
            return Err(Error::config_static(
                "window parameters require 0 < w <= k",
            ));
        }
        if self.is_secure() && self.tls.is_none() {
            return Err(Error::config_static(
                "secure scheme requires a TLS configuration",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ClientOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOption")
            .field("server", &self.server.as_str())
            .field("connect_timeout", &self.connect_timeout)
            .field("confirm_timeout", &self.confirm_timeout)
            .field("reconnect_retries", &self.reconnect_retries)
            .field("reconnect_interval", &self.reconnect_interval)
            .field("idle_test_interval", &self.idle_test_interval)
            .field("k", &self.k)
            .field("w", &self.w)
            .field("common_address", &self.common_address)
            .field("originator", &self.originator)
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_host_port() {
        let option = ClientOption::new("192.168.1.100:2404").unwrap();
        assert_eq!(option.server.scheme(), "tcp");
        assert_eq!(option.endpoint(), "192.168.1.100:2404");
        assert!(!option.is_secure());
    }

    #[test]
    fn test_port_only_assumes_loopback() {
        let option = ClientOption::new(":2404").unwrap();
        assert_eq!(option.endpoint(), "127.0.0.1:2404");
    }

    #[test]
    fn test_default_port() {
        let option = ClientOption::new("tcp://substation.example").unwrap();
        assert_eq!(option.endpoint(), "substation.example:2404");
    }

    #[test]
    fn test_secure_schemes() {
        for scheme in ["ssl", "tls", "tcps"] {
            let option = ClientOption::new(&format!("{scheme}://host:2404")).unwrap();
            assert!(option.is_secure(), "{scheme} should be secure");
        }
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        assert!(matches!(
            ClientOption::new("http://host:2404"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_secure_without_tls_config_rejected() {
        let option = ClientOption::new("tls://host:2404").unwrap();
        assert!(matches!(option.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let option = ClientOption::new(":2404")
            .unwrap()
            .connect_timeout(Duration::ZERO);
        assert!(matches!(option.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_window_validation() {
        let option = ClientOption::new(":2404").unwrap().window(8, 12);
        assert!(option.validate().is_err());

        let option = ClientOption::new(":2404").unwrap().window(12, 8);
        assert!(option.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let option = ClientOption::new("10.0.0.1:2404")
            .unwrap()
            .connect_timeout(Duration::from_secs(5))
            .auto_reconnect(3, Duration::from_secs(10))
            .common_address(7)
            .originator(2);
        assert_eq!(option.connect_timeout, Duration::from_secs(5));
        assert_eq!(option.reconnect_retries, 3);
        assert_eq!(option.common_address, 7);
        assert_eq!(option.originator, 2);
        assert!(option.validate().is_ok());
    }
}
