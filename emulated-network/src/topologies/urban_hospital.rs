//! An urban hospital with segmented LANs behind a core router, and a small clinic connected to it
//! over a WAN link

use crate::network::builder::{BuildError, HostDecl, TopologyBuilder};
use crate::network::link::{LinkConfig, LinkProfile};
use crate::network::spec::Topology;
use crate::registry::TopologyDefinition;

pub const HOSPITAL_SITE: &str = "hospital";
pub const CLINIC_SITE: &str = "clinic";
pub const CORE_ROUTER: &str = "r-core";
pub const CLINIC_ROUTER: &str = "r-clinic";

struct Segment {
    switch: &'static str,
    dpid: &'static str,
    hosts: &'static [Host],
    access: Access,
}

struct Host {
    id: &'static str,
    ip: &'static str,
    gateway: &'static str,
}

/// Parameters of the link between a host and its segment's switch
struct Access {
    bandwidth_mbps: f64,
    delay: &'static str,
    loss_percent: f64,
    profile: LinkProfile,
}

impl Access {
    fn config(&self) -> LinkConfig {
        LinkConfig::builder()
            .bandwidth_mbps(self.bandwidth_mbps)
            .delay(self.delay)
            .loss_percent(self.loss_percent)
            .profile(self.profile)
            .build()
    }
}

const OFFICE: Access = Access {
    bandwidth_mbps: 1000.0,
    delay: "2ms",
    loss_percent: 0.0,
    profile: LinkProfile::Lan,
};

const HOSPITAL_SEGMENTS: &[Segment] = &[
    Segment {
        switch: "s_admin",
        dpid: "0000000000000001",
        hosts: &[
            Host {
                id: "admin-1",
                ip: "10.10.10.11/24",
                gateway: "via 10.10.10.1",
            },
            Host {
                id: "admin-2",
                ip: "10.10.10.12/24",
                gateway: "via 10.10.10.1",
            },
        ],
        access: OFFICE,
    },
    Segment {
        switch: "s_clin",
        dpid: "0000000000000002",
        hosts: &[
            Host {
                id: "client-1",
                ip: "10.10.20.21/24",
                gateway: "via 10.10.20.1",
            },
            Host {
                id: "client-2",
                ip: "10.10.20.22/24",
                gateway: "via 10.10.20.1",
            },
            Host {
                id: "client-3",
                ip: "10.10.20.23/24",
                gateway: "via 10.10.20.1",
            },
        ],
        access: OFFICE,
    },
    // Patient monitors
    Segment {
        switch: "s_iot",
        dpid: "0000000000000003",
        hosts: &[Host {
            id: "iot-1",
            ip: "10.10.30.31/24",
            gateway: "via 10.10.30.1",
        }],
        access: Access {
            bandwidth_mbps: 100.0,
            delay: "8ms",
            loss_percent: 0.0,
            profile: LinkProfile::Constrained,
        },
    },
    // Nurse station phones
    Segment {
        switch: "s_voice",
        dpid: "0000000000000004",
        hosts: &[Host {
            id: "voice-1",
            ip: "10.10.40.41/24",
            gateway: "via 10.10.40.1",
        }],
        access: Access {
            bandwidth_mbps: 10.0,
            delay: "2ms",
            loss_percent: 0.0,
            profile: LinkProfile::Constrained,
        },
    },
    Segment {
        switch: "s_guest",
        dpid: "0000000000000005",
        hosts: &[Host {
            id: "guest-1",
            ip: "10.10.50.51/24",
            gateway: "via 10.10.50.1",
        }],
        access: Access {
            bandwidth_mbps: 50.0,
            delay: "15ms",
            loss_percent: 1.0,
            profile: LinkProfile::Untrusted,
        },
    },
    // Data center, hosting the EHR server
    Segment {
        switch: "s_server",
        dpid: "0000000000000006",
        hosts: &[Host {
            id: "server-1",
            ip: "10.10.60.61/24",
            gateway: "via 10.10.60.1",
        }],
        access: Access {
            bandwidth_mbps: 1000.0,
            delay: "1ms",
            loss_percent: 0.0,
            profile: LinkProfile::Lan,
        },
    },
];

const CLINIC_SEGMENT: Segment = Segment {
    switch: "s_remote",
    dpid: "0000000000000007",
    hosts: &[
        Host {
            id: "client-clinic-1",
            ip: "10.20.10.10/24",
            gateway: "via 10.20.10.1",
        },
        Host {
            id: "client-clinic-2",
            ip: "10.20.10.11/24",
            gateway: "via 10.20.10.1",
        },
    ],
    access: OFFICE,
};

/// Uplink between the core router and each hospital switch
const CORE_UPLINK: Access = Access {
    bandwidth_mbps: 10_000.0,
    delay: "2ms",
    loss_percent: 0.0,
    profile: LinkProfile::Lan,
};

const CLINIC_UPLINK: Access = Access {
    bandwidth_mbps: 1000.0,
    delay: "2ms",
    loss_percent: 0.0,
    profile: LinkProfile::Lan,
};

const WAN: Access = Access {
    bandwidth_mbps: 5000.0,
    delay: "20ms",
    loss_percent: 0.1,
    profile: LinkProfile::WideArea,
};

/// The two-site hospital network
pub struct UrbanHospital;

impl UrbanHospital {
    pub const NAME: &'static str = "urbanhospital";
}

impl TopologyDefinition for UrbanHospital {
    fn description(&self) -> &str {
        "urban hospital with six segmented LANs, plus a remote clinic over a WAN link"
    }

    fn build(&self) -> Result<Topology, BuildError> {
        let mut builder = TopologyBuilder::new(Self::NAME);

        builder.site(HOSPITAL_SITE);
        for segment in HOSPITAL_SEGMENTS {
            builder.add_switch(segment.switch, segment.dpid)?;
        }
        builder.add_router(CORE_ROUTER)?;
        for segment in HOSPITAL_SEGMENTS {
            add_hosts(&mut builder, segment)?;
        }
        for segment in HOSPITAL_SEGMENTS {
            builder.add_link(CORE_ROUTER, segment.switch, &CORE_UPLINK.config())?;
        }
        for segment in HOSPITAL_SEGMENTS {
            link_hosts(&mut builder, segment)?;
        }

        builder.site(CLINIC_SITE);
        builder.add_router(CLINIC_ROUTER)?;
        builder.add_switch(CLINIC_SEGMENT.switch, CLINIC_SEGMENT.dpid)?;
        add_hosts(&mut builder, &CLINIC_SEGMENT)?;
        builder.add_link(CLINIC_ROUTER, CLINIC_SEGMENT.switch, &CLINIC_UPLINK.config())?;
        link_hosts(&mut builder, &CLINIC_SEGMENT)?;

        builder.add_link(CORE_ROUTER, CLINIC_ROUTER, &WAN.config())?;

        builder.build()
    }
}

fn add_hosts(builder: &mut TopologyBuilder, segment: &Segment) -> Result<(), BuildError> {
    for host in segment.hosts {
        builder.add_host(HostDecl {
            id: host.id,
            ip: host.ip,
            default_route: Some(host.gateway),
            switch: segment.switch,
        })?;
    }

    Ok(())
}

fn link_hosts(builder: &mut TopologyBuilder, segment: &Segment) -> Result<(), BuildError> {
    let access = segment.access.config();
    for host in segment.hosts {
        builder.add_link(host.id, segment.switch, &access)?;
    }

    Ok(())
}
