// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The view of a received frame that the controller core works with.

use crate::{Mac, MacVlan, PortVlan, SwitchPort, VlanId};
use std::net::IpAddr;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EtherType {
    Ipv4,
    Arp,
    Ipv6,
    Other(u16),
}

/// A decoded frame. Decoding itself happens in the packet layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedFrame {
    pub src: Mac,
    pub dst: Mac,
    pub vlan: VlanId,
    pub in_port: SwitchPort,
    pub ether_type: EtherType,
    /// IPv4 source or ARP sender protocol address, if the frame carries one.
    pub sender_ip: Option<IpAddr>,
}

impl ParsedFrame {
    #[must_use]
    pub fn new(src: Mac, dst: Mac, in_port: SwitchPort, vlan: VlanId) -> Self {
        Self {
            src,
            dst,
            vlan,
            in_port,
            ether_type: EtherType::Other(0),
            sender_ip: None,
        }
    }

    #[must_use]
    pub fn with_ipv4(mut self, sender: Option<IpAddr>) -> Self {
        self.ether_type = EtherType::Ipv4;
        self.sender_ip = sender;
        self
    }

    #[must_use]
    pub fn with_arp(mut self, sender: IpAddr) -> Self {
        self.ether_type = EtherType::Arp;
        self.sender_ip = Some(sender);
        self
    }

    #[must_use]
    pub fn is_ipv4(&self) -> bool {
        self.ether_type == EtherType::Ipv4
    }

    #[must_use]
    pub fn source_host(&self) -> MacVlan {
        MacVlan::host(self.src, self.vlan)
    }

    #[must_use]
    pub fn port_vlan(&self) -> PortVlan {
        PortVlan::new(self.in_port, self.vlan)
    }

    /// The sender address if it can identify the host.
    #[must_use]
    pub fn learnable_ip(&self) -> Option<IpAddr> {
        self.sender_ip
            .filter(|ip| !ip.is_unspecified() && !ip.is_multicast() && !is_broadcast(ip))
    }
}

fn is_broadcast(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_broadcast(),
        IpAddr::V6(_) => false,
    }
}
