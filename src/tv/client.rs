use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tokio::process::Command;
use tokio::time::{sleep, sleep_until, timeout, Instant};

use crate::color::zones::ZoneModel;
use crate::config::TvConfig;
use crate::error::AmbiError;
use crate::tv::protocol::Processed;
use crate::tv::AmbilightSource;

/// Upper bound on a single request to the TV
const FETCH_TIMEOUT: Duration = Duration::from_millis(200);
/// Cadence of the reachability checks while waiting for the TV
const PROBE_INTERVAL: Duration = Duration::from_secs(3);
/// Hard stop for a single ping, which itself waits 1s for a reply
const PING_TIMEOUT: Duration = Duration::from_secs(2);

/// Basic "is the host up" check used before streaming starts.
pub trait Reachability {
    async fn reachable(&mut self, host: &str) -> bool;
}

/// One ICMP echo through the system `ping`.
pub struct Ping;

impl Reachability for Ping {
    async fn reachable(&mut self, host: &str) -> bool {
        let status = Command::new("ping")
            .args(["-c", "1", "-W", "1", host])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match timeout(PING_TIMEOUT, status).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                log::warn!("Failed to run ping: {}", e);
                false
            }
            Err(_) => false,
        }
    }
}

pub struct AmbilightTv<R = Ping> {
    /// Reused for every request, the connection stays open between ticks
    client: reqwest::Client,
    host: String,
    url: String,
    wait_for_startup: Duration,
    power_on_time: Duration,
    probe: R,
}

impl AmbilightTv<Ping> {
    pub fn new(config: &TvConfig) -> Result<AmbilightTv<Ping>> {
        AmbilightTv::with_probe(config, Ping)
    }
}

impl<R: Reachability> AmbilightTv<R> {
    pub fn with_probe(config: &TvConfig, probe: R) -> Result<AmbilightTv<R>> {
        let client = reqwest::Client::builder()
            // TVs ship self-signed certificates
            .danger_accept_invalid_certs(true)
            .timeout(FETCH_TIMEOUT)
            .tcp_nodelay(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(AmbilightTv {
            client,
            host: config.ip.clone(),
            url: config.url(),
            wait_for_startup: Duration::from_secs(config.wait_for_startup_s),
            power_on_time: Duration::from_secs(config.power_on_time_s),
            probe,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Pings the TV every few seconds until it answers.
    ///
    /// One ping is started every 3s that fits in `wait_for_startup`, at least
    /// one, and the last miss gives up right away. With the default 8s that is
    /// two pings and a failure after roughly 3s.
    ///
    /// A TV that only starts answering after a failed ping was just switched
    /// on, so its API gets `power_on_time` more to come up.
    pub async fn wait_for_startup(&mut self) -> Result<(), AmbiError> {
        let timeout_s = self.wait_for_startup.as_secs();
        let attempts = (timeout_s / PROBE_INTERVAL.as_secs()).max(1);

        for attempt in 0..attempts {
            let started = Instant::now();

            if self.probe.reachable(&self.host).await {
                if attempt > 0 {
                    log::warn!("TV is powering on, waiting {}s more", self.power_on_time.as_secs());
                    sleep(self.power_on_time).await;
                }

                return Ok(());
            }

            log::error!(
                "TV is not responding to ping {}/{} ({}s after the first)",
                attempt + 1,
                attempts,
                attempt * PROBE_INTERVAL.as_secs()
            );

            if attempt + 1 < attempts {
                sleep_until(started + PROBE_INTERVAL).await;
            }
        }

        Err(AmbiError::DeviceUnreachable {
            host: self.host.clone(),
            timeout_s,
        })
    }

    pub async fn fetch_raw(&self) -> Result<String, AmbiError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AmbiError::Connectivity(e.to_string()))?;

        response
            .text()
            .await
            .map_err(|e| AmbiError::Connectivity(e.to_string()))
    }

    pub async fn fetch_json(&self) -> Result<Map<String, Value>, AmbiError> {
        let body = self.fetch_raw().await?;

        parse_document(&body)
    }
}

/// Parses a response body that must be a JSON object.
pub fn parse_document(body: &str) -> Result<Map<String, Value>, AmbiError> {
    match serde_json::from_str(body) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(_) => Err(AmbiError::MalformedPayload("response is not a JSON object".into())),
        Err(e) => {
            log::debug!("Undecodable response body: {}", body);
            Err(AmbiError::MalformedPayload(e.to_string()))
        }
    }
}

impl<R: Reachability> AmbilightSource for AmbilightTv<R> {
    async fn wait_for_startup(&mut self) -> Result<(), AmbiError> {
        AmbilightTv::wait_for_startup(self).await
    }

    async fn poll(&mut self) -> Result<ZoneModel, AmbiError> {
        let document = self.fetch_json().await?;
        let processed = Processed::from_document(document)?;

        ZoneModel::from_layer(&processed.layer1)
    }

    fn close(self) {
        log::debug!("Closing connection to {}", self.url);
        drop(self.client);
    }
}
