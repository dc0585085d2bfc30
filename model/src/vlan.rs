// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! VLAN identifiers as seen by the mapping tables.

/// A VLAN identifier. Unlike an 802.1Q VID, zero is legal and stands for
/// untagged frames.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "u16", into = "u16")]
#[repr(transparent)]
pub struct VlanId(u16);

#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidVlan {
    #[error("4095 is a reserved VLAN id")]
    Reserved,
    #[error("{0} is too large to be a VLAN id")]
    TooLarge(u16),
}

impl VlanId {
    pub const UNTAGGED: VlanId = VlanId(0);
    pub const MAX: u16 = 4094;

    /// # Errors
    ///
    /// Fails for 4095 and for anything above 12 bits.
    pub fn new(vid: u16) -> Result<Self, InvalidVlan> {
        match vid {
            4095 => Err(InvalidVlan::Reserved),
            v if v > Self::MAX => Err(InvalidVlan::TooLarge(v)),
            v => Ok(VlanId(v)),
        }
    }

    #[must_use]
    pub fn as_u16(self) -> u16 {
        self.0
    }

    #[must_use]
    pub fn is_untagged(self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<u16> for VlanId {
    type Error = InvalidVlan;

    fn try_from(vid: u16) -> Result<Self, Self::Error> {
        VlanId::new(vid)
    }
}

impl From<VlanId> for u16 {
    fn from(vlan: VlanId) -> u16 {
        vlan.0
    }
}

impl std::fmt::Display for VlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vlan_range() {
        assert!(VlanId::new(0).unwrap().is_untagged());
        assert_eq!(VlanId::new(4094).unwrap().as_u16(), 4094);
        assert_eq!(VlanId::new(4095), Err(InvalidVlan::Reserved));
        assert_eq!(VlanId::new(5000), Err(InvalidVlan::TooLarge(5000)));
    }
}
