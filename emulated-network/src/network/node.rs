//! The node capability an emulation engine provides, and the lifecycle contract it drives

use crate::network::router::LifecycleError;
use anyhow::{Context, bail};
use std::process::{Command, Output};
use std::sync::Arc;
use tracing::debug;

/// A generic node as materialized by an emulation engine.
///
/// Nodes have their own startup and shutdown, and can run administrative commands against their
/// own network namespace.
pub trait NetworkNode {
    fn id(&self) -> &str;

    fn start(&mut self) -> anyhow::Result<()>;

    fn stop(&mut self) -> anyhow::Result<()>;

    /// Runs a command inside the node, returning its stdout. Fails if the command could not be
    /// run or exited unsuccessfully.
    fn cmd(&mut self, args: &[&str]) -> anyhow::Result<String>;
}

/// The lifecycle hooks the engine invokes as part of its own node startup and shutdown
pub trait NodeBehavior {
    fn id(&self) -> &str;

    fn activate(&mut self) -> Result<(), LifecycleError>;

    fn deactivate(&mut self) -> Result<(), LifecycleError>;
}

/// A node living in a Linux network namespace the engine already created.
///
/// Commands run via `sudo ip netns exec <namespace> ...`.
pub struct NamespaceNode {
    id: Arc<str>,
    namespace: String,
}

impl NamespaceNode {
    pub fn new(id: &str, namespace: &str) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.to_string(),
        }
    }

    fn command_line<'a>(&'a self, args: &[&'a str]) -> Vec<&'a str> {
        let mut full_args = vec!["ip", "netns", "exec", self.namespace.as_str()];
        full_args.extend_from_slice(args);
        full_args
    }
}

impl NetworkNode for NamespaceNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn start(&mut self) -> anyhow::Result<()> {
        self.cmd(&["ip", "link", "set", "lo", "up"])
            .context("bring loopback up")?;
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        self.cmd(&["ip", "link", "set", "lo", "down"])
            .context("bring loopback down")?;
        Ok(())
    }

    fn cmd(&mut self, args: &[&str]) -> anyhow::Result<String> {
        let full_args = self.command_line(args);
        debug!(node = %self.id, ns = self.namespace, "sudo {}", full_args.join(" "));
        let output = sudo_checked(&full_args)
            .with_context(|| format!("exec `{}` in ns `{}`", args.join(" "), self.namespace))?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Run `sudo <args>`, returning output on success or bailing with stderr
fn sudo_checked(args: &[&str]) -> anyhow::Result<Output> {
    let output = Command::new("sudo")
        .args(args)
        .output()
        .with_context(|| format!("sudo {}", args.join(" ")))?;

    if !output.status.success() {
        bail!(
            "command failed: sudo {}\n{}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(output)
}

/// A node that runs nothing, only recording what it was asked to do.
///
/// Used to preview the commands a lifecycle would run, and to simulate failures.
#[derive(Debug)]
pub struct RecordingNode {
    id: Arc<str>,
    log: Vec<String>,
    /// Commands containing this text fail instead of being recorded
    fail_on: Option<String>,
}

impl RecordingNode {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.into(),
            log: Vec::new(),
            fail_on: None,
        }
    }

    pub fn failing_on(mut self, pattern: &str) -> Self {
        self.fail_on = Some(pattern.to_string());
        self
    }

    /// Everything the node was asked to do, in order
    pub fn log(&self) -> &[String] {
        &self.log
    }
}

impl NetworkNode for RecordingNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn start(&mut self) -> anyhow::Result<()> {
        self.log.push("<start>".to_string());
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        self.log.push("<stop>".to_string());
        Ok(())
    }

    fn cmd(&mut self, args: &[&str]) -> anyhow::Result<String> {
        let line = args.join(" ");
        if let Some(pattern) = &self.fail_on
            && line.contains(pattern.as_str())
        {
            bail!("permission denied: {line}");
        }

        self.log.push(line);
        Ok(String::new())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_namespace_command_line() {
        let node = NamespaceNode::new("r-core", "mn-r-core");
        assert_eq!(
            node.command_line(&["sysctl", "-w", "net.ipv4.ip_forward=1"]),
            ["ip", "netns", "exec", "mn-r-core", "sysctl", "-w", "net.ipv4.ip_forward=1"]
        );
    }

    #[test]
    fn test_recording_node_fails_on_pattern() {
        let mut node = RecordingNode::new("r-core").failing_on("ip_forward");
        assert!(node.cmd(&["ip", "link"]).is_ok());
        assert!(node.cmd(&["sysctl", "-w", "net.ipv4.ip_forward=1"]).is_err());
        assert_eq!(node.log(), ["ip link"]);
    }
}
