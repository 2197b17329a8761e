// Path: crates/control/src/client.rs

//! The mTLS client side of the control plane.

use anyhow::{Context, Result};
use holomush_ipc::control::control_client::ControlClient as ControlTonicClient;
use holomush_ipc::control::{ShutdownRequest, StatusRequest, StatusResponse};
use std::time::Duration;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

/// A short-lived client to one component's control server.
pub struct ControlClient {
    inner: ControlTonicClient<Channel>,
}

impl ControlClient {
    /// Dials `addr` with the given client identity, failing after `timeout`.
    pub async fn connect(addr: &str, tls: ClientTlsConfig, timeout: Duration) -> Result<Self> {
        let endpoint = Endpoint::from_shared(format!("https://{addr}"))
            .with_context(|| format!("invalid control address {addr}"))?
            .tls_config(tls)
            .context("control client TLS configuration")?
            .connect_timeout(timeout)
            .timeout(timeout);
        let channel = endpoint
            .connect()
            .await
            .with_context(|| format!("dial {addr}"))?;
        Ok(Self {
            inner: ControlTonicClient::new(channel),
        })
    }

    /// Issues `Status` and returns the raw response.
    pub async fn status(&mut self) -> Result<StatusResponse> {
        let response = self
            .inner
            .status(StatusRequest {})
            .await
            .context("Status RPC")?;
        Ok(response.into_inner())
    }

    /// Issues `Shutdown` and returns the acknowledgement message.
    pub async fn shutdown(&mut self, graceful: bool) -> Result<String> {
        let response = self
            .inner
            .shutdown(ShutdownRequest { graceful })
            .await
            .context("Shutdown RPC")?;
        Ok(response.into_inner().message)
    }
}
