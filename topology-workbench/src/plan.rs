use emulated_network::network::node::{NamespaceNode, NetworkNode, NodeBehavior, RecordingNode};
use emulated_network::network::router::Router;
use emulated_network::network::spec::Topology;

/// Prints what each router's activation and teardown would run, without running anything
pub fn preview(topology: &Topology) -> anyhow::Result<()> {
    println!("--- Router lifecycle ---");
    for spec in topology.routers() {
        let mut router = Router::new(RecordingNode::new(spec.id()));
        router.activate()?;
        let activation_steps = router.node().log().len();
        router.deactivate()?;

        let node = router.into_node();
        let (activation, teardown) = node.log().split_at(activation_steps);
        println!("* {} (site {})", spec.id(), spec.site());
        print_steps("activate", activation);
        print_steps("deactivate", teardown);
    }

    Ok(())
}

fn print_steps(phase: &str, steps: &[String]) {
    println!("  * {phase}:");
    for step in steps {
        println!("    * {step}");
    }
}

/// Activates every router inside its namespace, then tears them down in reverse order
pub fn apply(topology: &Topology) -> anyhow::Result<()> {
    let mut routers: Vec<_> = topology
        .routers()
        .map(|spec| Router::new(NamespaceNode::new(spec.id(), spec.id())))
        .collect();
    cycle(&mut routers)
}

fn cycle<N: NetworkNode>(routers: &mut [Router<N>]) -> anyhow::Result<()> {
    println!("--- Router lifecycle ---");
    let mut activated = 0;
    let mut result = Ok(());
    for router in routers.iter_mut() {
        if let Err(e) = router.activate() {
            let message = format!("failed to activate router `{}`", router.id());
            result = Err(anyhow::Error::new(e).context(message));
            break;
        }

        println!("* {}: forwarding enabled", router.id());
        activated += 1;
    }

    // Routers whose activation failed halfway still need their node stopped
    let failed = usize::from(result.is_err());
    let mut teardown: anyhow::Result<()> = Ok(());
    for router in routers[..activated + failed].iter_mut().rev() {
        match router.deactivate() {
            Ok(()) => println!("* {}: deactivated", router.id()),
            Err(e) => {
                tracing::warn!(router = router.id(), "teardown failed: {e}");
                if teardown.is_ok() {
                    let message = format!("failed to deactivate router `{}`", router.id());
                    teardown = Err(anyhow::Error::new(e).context(message));
                }
            }
        }
    }

    // An activation failure is the root cause, so it takes precedence
    result.and(teardown)
}

#[cfg(test)]
mod test {
    use super::*;

    fn full_cycle() -> [&'static str; 4] {
        [
            "<start>",
            "sysctl -w net.ipv4.ip_forward=1",
            "sysctl -w net.ipv4.ip_forward=0",
            "<stop>",
        ]
    }

    #[test]
    fn test_cycle_activates_and_tears_down_every_router() {
        let mut routers = [
            Router::new(RecordingNode::new("r1")),
            Router::new(RecordingNode::new("r2")),
        ];
        cycle(&mut routers).unwrap();

        for router in &routers {
            assert!(!router.is_forwarding());
            assert_eq!(router.node().log(), full_cycle());
        }
    }

    #[test]
    fn test_cycle_reports_activation_failure() {
        let mut routers = [
            Router::new(RecordingNode::new("r1")),
            Router::new(RecordingNode::new("r2").failing_on("ip_forward=1")),
            Router::new(RecordingNode::new("r3")),
        ];

        let error = cycle(&mut routers).unwrap_err();
        assert_eq!(error.to_string(), "failed to activate router `r2`");

        assert_eq!(routers[0].node().log(), full_cycle());
        // The failed router was started, so it gets stopped again
        assert_eq!(routers[1].node().log(), ["<start>", "<stop>"]);
        assert!(routers[2].node().log().is_empty());
    }

    #[test]
    fn test_cycle_reports_teardown_failure() {
        let mut routers = [
            Router::new(RecordingNode::new("r1")),
            Router::new(RecordingNode::new("r2").failing_on("ip_forward=0")),
        ];

        let error = cycle(&mut routers).unwrap_err();
        assert_eq!(error.to_string(), "failed to deactivate router `r2`");

        // The remaining router is still torn down, the failed one keeps forwarding
        assert_eq!(routers[0].node().log(), full_cycle());
        assert!(routers[1].is_forwarding());
    }
}
