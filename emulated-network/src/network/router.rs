use crate::network::node::{NetworkNode, NodeBehavior};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use tracing::{info, warn};

const FORWARDING_SYSCTL: &str = "net.ipv4.ip_forward";

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("router `{router_id}` could not {toggle} IP forwarding: {reason}")]
    ForwardingToggleFailed {
        router_id: String,
        toggle: ForwardingToggle,
        reason: String,
    },
    #[error("node `{node_id}` failed to {phase}: {reason}")]
    BaseNode {
        node_id: String,
        phase: &'static str,
        reason: String,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ForwardingToggle {
    Enable,
    Disable,
}

impl ForwardingToggle {
    /// The `sysctl` invocation applying the toggle
    pub fn command(self) -> [&'static str; 3] {
        match self {
            ForwardingToggle::Enable => ["sysctl", "-w", "net.ipv4.ip_forward=1"],
            ForwardingToggle::Disable => ["sysctl", "-w", "net.ipv4.ip_forward=0"],
        }
    }
}

impl Display for ForwardingToggle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ForwardingToggle::Enable => f.write_str("enable"),
            ForwardingToggle::Disable => f.write_str("disable"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum RouterState {
    /// The base node has not been started (or has been stopped again)
    Inactive,
    /// The base node is running, but it does not forward packets
    Started,
    Forwarding,
}

/// A node that forwards IP packets between its links.
///
/// Wraps the engine's generic node: activation runs the node's own startup before enabling
/// forwarding, and deactivation disables forwarding before running the node's own shutdown.
pub struct Router<N> {
    node: N,
    state: RouterState,
}

impl<N: NetworkNode> Router<N> {
    pub fn new(node: N) -> Self {
        Self {
            node,
            state: RouterState::Inactive,
        }
    }

    pub fn is_forwarding(&self) -> bool {
        self.state == RouterState::Forwarding
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    pub fn into_node(self) -> N {
        self.node
    }

    fn toggle_forwarding(&mut self, toggle: ForwardingToggle) -> Result<(), LifecycleError> {
        self.node.cmd(&toggle.command()).map_err(|e| {
            warn!(router = self.node.id(), %toggle, "failed to toggle {FORWARDING_SYSCTL}: {e:#}");
            LifecycleError::ForwardingToggleFailed {
                router_id: self.node.id().to_string(),
                toggle,
                reason: format!("{e:#}"),
            }
        })?;

        Ok(())
    }
}

impl<N: NetworkNode> NodeBehavior for Router<N> {
    fn id(&self) -> &str {
        self.node.id()
    }

    fn activate(&mut self) -> Result<(), LifecycleError> {
        if self.state == RouterState::Inactive {
            self.node.start().map_err(|e| LifecycleError::BaseNode {
                node_id: self.node.id().to_string(),
                phase: "start",
                reason: format!("{e:#}"),
            })?;
            self.state = RouterState::Started;
        }

        if self.state == RouterState::Started {
            self.toggle_forwarding(ForwardingToggle::Enable)?;
            self.state = RouterState::Forwarding;
            info!(router = self.node.id(), "IP forwarding enabled");
        }

        Ok(())
    }

    fn deactivate(&mut self) -> Result<(), LifecycleError> {
        if self.state == RouterState::Forwarding {
            self.toggle_forwarding(ForwardingToggle::Disable)?;
            self.state = RouterState::Started;
            info!(router = self.node.id(), "IP forwarding disabled");
        }

        if self.state == RouterState::Started {
            self.node.stop().map_err(|e| LifecycleError::BaseNode {
                node_id: self.node.id().to_string(),
                phase: "stop",
                reason: format!("{e:#}"),
            })?;
            self.state = RouterState::Inactive;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::network::node::RecordingNode;

    #[test]
    fn test_activate_starts_node_before_forwarding() {
        let mut router = Router::new(RecordingNode::new("r-core"));
        router.activate().unwrap();

        assert!(router.is_forwarding());
        assert_eq!(
            router.node().log(),
            ["<start>", "sysctl -w net.ipv4.ip_forward=1"]
        );
    }

    #[test]
    fn test_activate_is_idempotent() {
        let mut router = Router::new(RecordingNode::new("r-core"));
        router.activate().unwrap();
        router.activate().unwrap();

        assert!(router.is_forwarding());
        assert_eq!(
            router.node().log(),
            ["<start>", "sysctl -w net.ipv4.ip_forward=1"]
        );
    }

    #[test]
    fn test_deactivate_without_activate_is_noop() {
        let mut router = Router::new(RecordingNode::new("r-clinic"));
        router.deactivate().unwrap();

        assert!(!router.is_forwarding());
        assert!(router.node().log().is_empty());
    }

    #[test]
    fn test_deactivate_disables_forwarding_before_stopping() {
        let mut router = Router::new(RecordingNode::new("r-core"));
        router.activate().unwrap();
        router.deactivate().unwrap();
        router.deactivate().unwrap();

        assert!(!router.is_forwarding());
        assert_eq!(
            router.node().log(),
            [
                "<start>",
                "sysctl -w net.ipv4.ip_forward=1",
                "sysctl -w net.ipv4.ip_forward=0",
                "<stop>"
            ]
        );
    }

    #[test]
    fn test_failed_toggle_is_reported() {
        let mut router = Router::new(RecordingNode::new("r-core").failing_on("ip_forward=1"));
        let error = router.activate().unwrap_err();

        assert!(matches!(
            error,
            LifecycleError::ForwardingToggleFailed {
                toggle: ForwardingToggle::Enable,
                ..
            }
        ));
        assert!(!router.is_forwarding());

        // Teardown still stops the base node that was started
        router.deactivate().unwrap();
        assert_eq!(router.node().log(), ["<start>", "<stop>"]);
    }

    #[test]
    fn test_failed_disable_keeps_router_forwarding() {
        let mut router = Router::new(RecordingNode::new("r-core").failing_on("ip_forward=0"));
        router.activate().unwrap();

        let error = router.deactivate().unwrap_err();
        assert!(matches!(
            error,
            LifecycleError::ForwardingToggleFailed {
                toggle: ForwardingToggle::Disable,
                ..
            }
        ));
        assert!(router.is_forwarding());
    }
}
