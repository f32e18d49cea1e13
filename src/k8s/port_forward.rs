/// kubectl port-forward sessions
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::debug;

use super::client::Kubectl;
use super::resources::PodRef;

/// A running port-forward to a pod; the kubectl process dies with this value
pub struct PortForward {
    local_port: u16,
    drains: Vec<JoinHandle<()>>,
    _child: Child,
}

impl PortForward {
    /// Forward an ephemeral local port to `remote_port` on the pod
    pub async fn open(
        kubectl: &Kubectl,
        pod: &PodRef,
        remote_port: u16,
        timeout: Duration,
    ) -> Result<Self> {
        let mut child = kubectl
            .command()
            .args([
                "port-forward",
                "-n",
                &pod.namespace,
                &format!("pod/{}", pod.name),
                &format!(":{}", remote_port),
            ])
            .context(format!("Failed to start port-forward to {}", pod))
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .context("port-forward stdout was not captured")?;
        let stderr = child
            .stderr
            .take()
            .context("port-forward stderr was not captured")?;
        let stderr_drain = tokio::spawn(drain(
            BufReader::new(stderr).lines(),
            format!("{} stderr", pod),
        ));

        let mut lines = BufReader::new(stdout).lines();
        let local_port = match wait_for_port(&mut lines, pod, timeout).await {
            Ok(port) => port,
            Err(e) => {
                stderr_drain.abort();
                return Err(e);
            }
        };

        // kubectl reports every accepted connection on stdout and dies once that pipe closes
        let stdout_drain = tokio::spawn(drain(lines, format!("{} stdout", pod)));

        Ok(Self {
            local_port,
            drains: vec![stdout_drain, stderr_drain],
            _child: child,
        })
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }
}

impl Drop for PortForward {
    fn drop(&mut self) {
        for drain in &self.drains {
            drain.abort();
        }
    }
}

async fn wait_for_port<R>(lines: &mut Lines<R>, pod: &PodRef, timeout: Duration) -> Result<u16>
where
    R: AsyncBufRead + Unpin,
{
    tokio::time::timeout(timeout, async {
        while let Some(line) = lines.next_line().await? {
            debug!("port-forward {}: {}", pod, line);
            if let Some(port) = parse_forwarded_port(&line) {
                return Ok::<u16, anyhow::Error>(port);
            }
        }
        anyhow::bail!("port-forward to {} exited before it was ready", pod)
    })
    .await
    .with_context(|| format!("Timed out waiting for port-forward to {}", pod))?
}

async fn drain<R>(mut lines: Lines<R>, source: String)
where
    R: AsyncBufRead + Unpin,
{
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("port-forward {}: {}", source, line);
    }
}

/// Extract the local port from `Forwarding from 127.0.0.1:54321 -> 15000`
pub fn parse_forwarded_port(line: &str) -> Option<u16> {
    let rest = line.trim().strip_prefix("Forwarding from ")?;
    let (local, _) = rest.split_once(" -> ")?;
    let (_, port) = local.rsplit_once(':')?;
    port.parse().ok()
}
