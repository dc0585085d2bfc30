// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ethernet addresses.

use arrayvec::ArrayVec;
use std::fmt::Display;

/// A 48-bit Ethernet address.
///
/// Tables keyed by host use the integer form returned by [`Mac::as_u64`].
#[repr(transparent)]
#[cfg_attr(any(test, feature = "bolero"), derive(bolero::TypeGenerator))]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct Mac(pub [u8; 6]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MacParseError {
    #[error("invalid mac address '{0}'")]
    Invalid(String),
    #[error("value {0:#x} does not fit in 48 bits")]
    TooLarge(u64),
}

impl Mac {
    pub const BROADCAST: Mac = Mac([u8::MAX; 6]);
    pub const ZERO: Mac = Mac([0; 6]);
    const MASK: u64 = 0xffff_ffff_ffff;

    /// Returns true iff the group bit of the first octet is set.
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    #[must_use]
    pub fn is_unicast(&self) -> bool {
        !self.is_multicast()
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Mac::ZERO
    }

    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        *self == Mac::BROADCAST
    }

    /// Whether a frame sourced from this address can be learned.
    #[must_use]
    pub fn is_learnable(&self) -> bool {
        self.is_unicast() && !self.is_zero()
    }

    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, octet| (acc << 8) | u64::from(*octet))
    }

    /// Build an address from the low 48 bits of an integer.
    ///
    /// # Errors
    ///
    /// Fails if any of the upper 16 bits is set.
    pub fn try_from_u64(value: u64) -> Result<Self, MacParseError> {
        if value & !Self::MASK != 0 {
            return Err(MacParseError::TooLarge(value));
        }
        let bytes = value.to_be_bytes();
        Ok(Mac([
            bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }
}

impl From<[u8; 6]> for Mac {
    fn from(value: [u8; 6]) -> Self {
        Mac(value)
    }
}

impl TryFrom<&str> for Mac {
    type Error = MacParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let invalid = || MacParseError::Invalid(value.to_string());
        let octets = value
            .split(':')
            .try_fold(ArrayVec::<u8, 6>::new(), |mut acc, octet| {
                if octet.len() != 2 {
                    return Err(invalid());
                }
                let parsed = u8::from_str_radix(octet, 16).map_err(|_| invalid())?;
                acc.try_push(parsed).map_err(|_| invalid())?;
                Ok(acc)
            })?;
        octets.into_inner().map(Mac).map_err(|_| invalid())
    }
}

impl std::str::FromStr for Mac {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mac::try_from(s)
    }
}

impl Display for Mac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_classify() {
        let mac = Mac::try_from("00:11:22:aa:bb:cc").unwrap();
        assert_eq!(mac, Mac([0x00, 0x11, 0x22, 0xaa, 0xbb, 0xcc]));
        assert!(mac.is_learnable());
        assert_eq!(mac.to_string(), "00:11:22:aa:bb:cc");
        assert_eq!(mac.as_u64(), 0x0011_22aa_bbcc);

        assert!(!Mac::ZERO.is_learnable());
        assert!(!Mac::BROADCAST.is_learnable());
        assert!(!Mac([0x01, 0, 0x5e, 0, 0, 1]).is_learnable());

        assert!(Mac::try_from("00:11:22:aa:bb").is_err());
        assert!(Mac::try_from("00:11:22:aa:bb:cc:dd").is_err());
        assert!(Mac::try_from("0:11:22:aa:bb:cc").is_err());
        assert!(Mac::try_from("zz:11:22:aa:bb:cc").is_err());
    }

    #[test]
    fn integer_form_rejects_wide_values() {
        assert_eq!(
            Mac::try_from_u64(1 << 48),
            Err(MacParseError::TooLarge(1 << 48))
        );
        bolero::check!().with_type::<Mac>().for_each(|mac| {
            let back = Mac::try_from_u64(mac.as_u64()).unwrap();
            assert_eq!(back.as_u64() >> 48, 0);
            assert_eq!(&back, mac);
        });
    }
}
