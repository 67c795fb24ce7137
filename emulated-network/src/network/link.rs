use anyhow::{Context, anyhow, bail};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// What a link is meant to model, which determines how its parameters must compare to the
/// site's LAN links
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkProfile {
    /// Switched campus link
    #[default]
    Lan,
    /// Access link of a low-bandwidth device (patient monitors, handsets)
    Constrained,
    /// Best-effort link of a segment we don't trust (guest Wi-Fi)
    Untrusted,
    /// The link joining two sites
    WideArea,
}

impl Display for LinkProfile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LinkProfile::Lan => "LAN",
            LinkProfile::Constrained => "constrained",
            LinkProfile::Untrusted => "untrusted",
            LinkProfile::WideArea => "wide-area",
        };
        f.write_str(name)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkField {
    Bandwidth,
    Delay,
    Loss,
    Jitter,
}

impl Display for LinkField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LinkField::Bandwidth => "bandwidth",
            LinkField::Delay => "delay",
            LinkField::Loss => "loss",
            LinkField::Jitter => "jitter",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field} `{value}` is invalid: {reason}")]
pub struct InvalidLinkParameters {
    pub field: LinkField,
    pub value: String,
    pub reason: String,
}

impl InvalidLinkParameters {
    fn new(field: LinkField, value: impl Display, reason: impl Into<String>) -> Self {
        Self {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Emulation parameters of a link, as written by whoever declares the topology.
///
/// Nothing is checked until [`LinkConfig::validate`] turns it into [`LinkParams`].
#[derive(Clone, Debug, PartialEq, bon::Builder)]
pub struct LinkConfig {
    /// The link's bandwidth, in megabits per second
    pub bandwidth_mbps: f64,
    /// The one-way delay of the link (e.g. `2ms`)
    #[builder(into)]
    pub delay: String,
    /// The percentage of packets that will be lost (between 0 and 100)
    #[builder(default)]
    pub loss_percent: f64,
    /// Random variation applied to the delay (e.g. `1ms`)
    #[builder(into)]
    pub jitter: Option<String>,
    #[builder(default)]
    pub profile: LinkProfile,
}

impl LinkConfig {
    pub fn validate(&self) -> Result<LinkParams, InvalidLinkParameters> {
        if !self.bandwidth_mbps.is_finite() || self.bandwidth_mbps <= 0.0 {
            return Err(InvalidLinkParameters::new(
                LinkField::Bandwidth,
                self.bandwidth_mbps,
                "must be a positive number of Mbps",
            ));
        }

        let delay = parse_duration(&self.delay).map_err(|e| {
            InvalidLinkParameters::new(LinkField::Delay, &self.delay, format!("{e:#}"))
        })?;

        if !(0.0..=100.0).contains(&self.loss_percent) {
            return Err(InvalidLinkParameters::new(
                LinkField::Loss,
                self.loss_percent,
                "must be a percentage between 0 and 100",
            ));
        }

        let jitter = self
            .jitter
            .as_deref()
            .map(|jitter| {
                parse_duration(jitter).map_err(|e| {
                    InvalidLinkParameters::new(LinkField::Jitter, jitter, format!("{e:#}"))
                })
            })
            .transpose()?;

        Ok(LinkParams {
            bandwidth_mbps: self.bandwidth_mbps,
            delay,
            loss_percent: self.loss_percent,
            jitter,
        })
    }
}

/// Validated emulation parameters of a link
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinkParams {
    #[serde(rename = "bw")]
    bandwidth_mbps: f64,
    #[serde(serialize_with = "serialize_duration")]
    delay: Duration,
    #[serde(rename = "loss")]
    loss_percent: f64,
    #[serde(
        serialize_with = "serialize_optional_duration",
        skip_serializing_if = "Option::is_none"
    )]
    jitter: Option<Duration>,
}

impl LinkParams {
    pub fn bandwidth_mbps(&self) -> f64 {
        self.bandwidth_mbps
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn loss_percent(&self) -> f64 {
        self.loss_percent
    }

    pub fn jitter(&self) -> Option<Duration> {
        self.jitter
    }

    /// The `tc netem` parameters an engine installs on the link's interfaces to reproduce these
    /// characteristics
    pub fn netem_args(&self) -> Vec<String> {
        let mut args = vec!["delay".to_string(), TcDuration(self.delay).to_string()];
        if let Some(jitter) = self.jitter
            && !jitter.is_zero()
        {
            args.push(TcDuration(jitter).to_string());
        }

        if self.loss_percent > 0.0 {
            args.push("loss".into());
            args.push(format!("{}%", self.loss_percent));
        }

        args.extend(["rate".into(), format!("{}mbit", self.bandwidth_mbps)]);
        args
    }
}

impl Display for LinkParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} Mbps, {} delay, {}% loss",
            self.bandwidth_mbps,
            TcDuration(self.delay),
            self.loss_percent
        )?;
        if let Some(jitter) = self.jitter {
            write!(f, ", {} jitter", TcDuration(jitter))?;
        }
        Ok(())
    }
}

/// Joins the endpoint ids of a link into the link's id
pub const LINK_ID_SEPARATOR: &str = "<->";

/// An undirected link between two nodes of a built topology.
///
/// `source` and `target` only record the order in which the endpoints were declared.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinkSpec {
    pub(crate) id: Arc<str>,
    pub(crate) source: Arc<str>,
    pub(crate) target: Arc<str>,
    pub(crate) profile: LinkProfile,
    #[serde(flatten)]
    pub(crate) params: LinkParams,
}

impl LinkSpec {
    /// Links are identified by their endpoints, in declaration order
    pub fn id_for(source: &str, target: &str) -> Arc<str> {
        format!("{source}{LINK_ID_SEPARATOR}{target}").into()
    }

    pub fn id(&self) -> &Arc<str> {
        &self.id
    }

    pub fn source(&self) -> &Arc<str> {
        &self.source
    }

    pub fn target(&self) -> &Arc<str> {
        &self.target
    }

    pub fn profile(&self) -> LinkProfile {
        self.profile
    }

    pub fn params(&self) -> &LinkParams {
        &self.params
    }

    pub fn connects(&self, node_id: &str) -> bool {
        &*self.source == node_id || &*self.target == node_id
    }

    /// Whether the link joins both nodes, regardless of declaration order
    pub fn joins(&self, a: &str, b: &str) -> bool {
        (&*self.source == a && &*self.target == b) || (&*self.source == b && &*self.target == a)
    }

    /// The endpoint on the other side of `node_id`, if the link is attached to it
    pub fn other_end(&self, node_id: &str) -> Option<&Arc<str>> {
        if &*self.source == node_id {
            Some(&self.target)
        } else if &*self.target == node_id {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// Parses a duration in the notation used by traffic control tools: a non-negative decimal
/// number immediately followed by `us`, `ms` or `s`
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    let split_at = s
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or(anyhow!("missing time unit (expected `us`, `ms` or `s`)"))?;
    let (value, unit) = s.split_at(split_at);

    let nanos_per_unit = match unit {
        "us" => 1_000.0,
        "ms" => 1_000_000.0,
        "s" => 1_000_000_000.0,
        _ => bail!("unknown time unit `{unit}` (expected `us`, `ms` or `s`)"),
    };

    let value: f64 = value
        .parse()
        .with_context(|| format!("`{value}` is not a number"))?;
    if !value.is_finite() {
        bail!("duration must be finite");
    }
    if value < 0.0 {
        bail!("duration cannot be negative");
    }

    let nanos = (value * nanos_per_unit).round();
    if nanos > u64::MAX as f64 {
        bail!("duration is too large");
    }

    Ok(Duration::from_nanos(nanos as u64))
}

/// Displays a duration the way [`parse_duration`] reads it
#[derive(Copy, Clone, Debug)]
pub struct TcDuration(pub Duration);

impl Display for TcDuration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let nanos = self.0.as_nanos();
        if nanos % 1_000_000 == 0 {
            write!(f, "{}ms", nanos / 1_000_000)
        } else {
            write!(f, "{}us", nanos as f64 / 1_000.0)
        }
    }
}

fn serialize_duration<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&TcDuration(*duration))
}

fn serialize_optional_duration<S: Serializer>(
    duration: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match duration {
        Some(duration) => serialize_duration(duration, serializer),
        None => serializer.serialize_none(),
    }
}
