use anyhow::{Context, bail};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Number of hex digits in a datapath id (64 bits)
pub const DATAPATH_ID_DIGITS: usize = 16;

/// The identifier an OpenFlow controller uses to address a switch, written as a fixed-width hex
/// token (e.g. `0000000000000001`)
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr,
)]
pub struct DatapathId(u64);

impl DatapathId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for DatapathId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:0width$x}", self.0, width = DATAPATH_ID_DIGITS)
    }
}

impl FromStr for DatapathId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != DATAPATH_ID_DIGITS {
            bail!(
                "expected {DATAPATH_ID_DIGITS} hex digits, found {} characters",
                s.len()
            );
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            bail!("datapath id contains non-hex characters");
        }

        let id = u64::from_str_radix(s, 16).context("invalid datapath id")?;
        Ok(Self(id))
    }
}
