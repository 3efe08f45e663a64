//! Binds the TLS listener on a chosen private IPv4 address, restarts the
//! HTTP surface and mDNS advertisement on address change, and exposes an
//! observable `HostState` for the controlling UI.
//!
//! Address selection and bind/restart loop are grounded in the teacher
//! pack's LAN transport service (interface enumeration via `get_if_addrs`),
//! adapted from a one-shot bind into a polling supervisor since MediaBus
//! must notice a laptop moving between networks without a restart.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum_server::tls_rustls::RustlsConfig;
use get_if_addrs::{get_if_addrs, IfAddr};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use mediabus_core::{Runtime, TransferSummary};
use mediabus_identity::TlsIdentity;
use mediabus_mdns::MdnsAdvertiser;

use crate::api;
use crate::state::AppState;

pub const PORT: u16 = 8443;
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const BIND_RETRY_DELAY: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HostState {
    pub running: bool,
    pub transitioning: bool,
    pub hostname: String,
    pub ip_address: Option<String>,
    pub port: u16,
    pub status_text: String,
    pub error: Option<String>,
    pub available_ips: Vec<String>,
    pub paired_device_count: usize,
    pub transfer_summary: TransferSummaryView,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransferSummaryView {
    pub upload_transferred: u64,
    pub upload_total: u64,
    pub download_transferred: u64,
    pub download_total: u64,
}

impl From<TransferSummary> for TransferSummaryView {
    fn from(s: TransferSummary) -> Self {
        Self {
            upload_transferred: s.upload.transferred_bytes,
            upload_total: s.upload.total_bytes,
            download_transferred: s.download.transferred_bytes,
            download_total: s.download.total_bytes,
        }
    }
}

/// Returns every private IPv4 address (RFC1918 site-local or 169.254/16
/// link-local) bound to a local interface, sorted by dotted-quad string.
pub fn private_ipv4_candidates() -> Vec<Ipv4Addr> {
    let mut addrs = match get_if_addrs() {
        Ok(ifaces) => ifaces
            .into_iter()
            .filter_map(|iface| match iface.addr {
                IfAddr::V4(v4) => Some(v4.ip),
                IfAddr::V6(_) => None,
            })
            .filter(|ip| is_private_or_link_local(*ip))
            .collect::<Vec<_>>(),
        Err(err) => {
            warn!(error = %err, "failed to enumerate network interfaces");
            Vec::new()
        }
    };
    addrs.sort_by_key(|ip| ip.to_string());
    addrs.dedup();
    addrs
}

fn is_private_or_link_local(ip: Ipv4Addr) -> bool {
    ip.is_private() || ip.is_link_local()
}

pub struct Supervisor {
    runtime: Runtime,
    hostname: String,
    port: u16,
    identity: Arc<TlsIdentity>,
    state_tx: watch::Sender<HostState>,
}

impl Supervisor {
    /// `port` is fixed at 8443 in every real deployment; it remains a
    /// parameter only so tests can bind an ephemeral port.
    pub fn new(runtime: Runtime, hostname: String, port: u16, identity: TlsIdentity) -> (Self, watch::Receiver<HostState>) {
        let (state_tx, state_rx) = watch::channel(HostState {
            hostname: hostname.clone(),
            port,
            status_text: "starting".into(),
            ..Default::default()
        });
        (Self { runtime, hostname, port, identity: Arc::new(identity), state_tx }, state_rx)
    }

    /// Runs forever: binds on the first available address, serves, and
    /// rebinds whenever the chosen address is no longer the best candidate.
    pub async fn run(&self) {
        let mut bound_ip: Option<Ipv4Addr> = None;
        let mut mdns: Option<MdnsAdvertiser> = None;
        let mut server_handle: Option<tokio::task::JoinHandle<()>> = None;

        loop {
            let candidates = private_ipv4_candidates();
            self.publish(|s| s.available_ips = candidates.iter().map(|ip| ip.to_string()).collect());

            let best = candidates.first().copied();
            if best != bound_ip {
                self.publish(|s| {
                    s.transitioning = true;
                    s.status_text = "restarting".into();
                });

                if let Some(handle) = server_handle.take() {
                    handle.abort();
                }
                if let Some(advertiser) = mdns.take() {
                    advertiser.stop();
                }

                match best {
                    Some(ip) => match self.bind_and_serve(ip).await {
                        Ok((handle, advertiser)) => {
                            server_handle = Some(handle);
                            mdns = Some(advertiser);
                            bound_ip = Some(ip);
                            self.publish(|s| {
                                s.running = true;
                                s.transitioning = false;
                                s.ip_address = Some(ip.to_string());
                                s.status_text = "running".into();
                                s.error = None;
                            });
                            info!(%ip, "host bound");
                        }
                        Err(err) => {
                            error!(error = %err, "bind failed");
                            bound_ip = None;
                            self.publish(|s| {
                                s.running = false;
                                s.transitioning = false;
                                s.status_text = "error".into();
                                s.error = Some(err.clone());
                            });
                        }
                    },
                    None => {
                        bound_ip = None;
                        self.publish(|s| {
                            s.running = false;
                            s.transitioning = false;
                            s.status_text = "no private address available".into();
                        });
                    }
                }
            }

            self.refresh_summary().await;
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn bind_and_serve(
        &self,
        ip: Ipv4Addr,
    ) -> Result<(tokio::task::JoinHandle<()>, MdnsAdvertiser), String> {
        let config = RustlsConfig::from_der(
            self.identity.cert_chain.iter().map(|c| c.to_vec()).collect(),
            self.identity.private_key.secret_der().to_vec(),
        )
        .await
        .map_err(|e| e.to_string())?;

        let addr = SocketAddr::new(IpAddr::V4(ip), self.port);
        let state = AppState::new(self.runtime.clone(), self.hostname.clone(), self.port);
        let app = api::router(state);

        let handle = bind_with_retry(addr, config, app).await?;

        let advertiser = MdnsAdvertiser::start(ip, self.port, &self.hostname).map_err(|e| e.to_string())?;

        Ok((handle, advertiser))
    }

    async fn refresh_summary(&self) {
        let devices = self.runtime.host_snapshot().await.len();
        let summary = self.runtime.transfer_summary().await;
        self.publish(|s| {
            s.paired_device_count = devices;
            s.transfer_summary = summary.clone().into();
        });
    }

    fn publish(&self, mutate: impl FnOnce(&mut HostState)) {
        self.state_tx.send_modify(mutate);
    }
}

/// `axum_server` only binds the socket lazily inside `.serve()`, so the
/// "address in use" probe is a real preflight bind-and-drop. There is a
/// small race between the probe and the handoff to `axum_server`, acceptable
/// here because a lost race simply falls through to the same retry path on
/// the next supervisor tick.
async fn bind_with_retry(
    addr: SocketAddr,
    config: RustlsConfig,
    app: axum::Router,
) -> Result<tokio::task::JoinHandle<()>, String> {
    match preflight_bind(addr).await {
        Ok(()) => Ok(spawn_server(addr, config, app)),
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            warn!(%addr, "bind address in use, retrying once");
            tokio::time::sleep(BIND_RETRY_DELAY).await;
            preflight_bind(addr).await.map_err(|e| e.to_string())?;
            Ok(spawn_server(addr, config, app))
        }
        Err(err) => Err(err.to_string()),
    }
}

async fn preflight_bind(addr: SocketAddr) -> std::io::Result<()> {
    tokio::net::TcpListener::bind(addr).await.map(|_| ())
}

fn spawn_server(addr: SocketAddr, config: RustlsConfig, app: axum::Router) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = axum_server::bind_rustls(addr, config)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
        {
            error!(error = %err, "http surface exited");
        }
    })
}
