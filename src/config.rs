//! Endpoint configuration
//!
//! Addresses come either from code or from a whitespace separated
//! directive line such as `ip=192.168.1.5 mask=255.255.255.0 gw=192.168.1.1`,
//! typically kept in flash next to the firmware.

use crate::logger::LogLevel;
use crate::net::ethernet::MacAddress;
use crate::net::ipv4::Ipv4Address;
use crate::net::NetError;

/// Locally administered address used until one is configured.
pub const DEFAULT_MAC: MacAddress = MacAddress::new([0x02, 0x4d, 0x4e, 0x00, 0x00, 0x01]);
pub const DEFAULT_NETMASK: Ipv4Address = Ipv4Address::new(255, 255, 255, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetConfig {
    pub mac: MacAddress,
    pub ip: Ipv4Address,
    pub netmask: Ipv4Address,
    /// Unspecified disables gateway resolution.
    pub gateway: Ipv4Address,
    pub dns: Ipv4Address,
    pub peer: Ipv4Address,
    pub log_level: Option<LogLevel>,
}

impl NetConfig {
    pub const fn new() -> Self {
        Self {
            mac: DEFAULT_MAC,
            ip: Ipv4Address::UNSPECIFIED,
            netmask: DEFAULT_NETMASK,
            gateway: Ipv4Address::UNSPECIFIED,
            dns: Ipv4Address::UNSPECIFIED,
            peer: Ipv4Address::UNSPECIFIED,
            log_level: None,
        }
    }

    /// Build a configuration from defaults plus the directives in `line`.
    pub fn parse(line: &str) -> Result<Self, NetError> {
        let mut config = Self::new();
        config.apply_directives(line)?;
        Ok(config)
    }

    /// Apply every `key=value` token of `line`. Stops at the first bad one.
    pub fn apply_directives(&mut self, line: &str) -> Result<(), NetError> {
        for token in line.split_whitespace() {
            let (key, value) = token
                .split_once('=')
                .ok_or(NetError::UnknownDirective)?;
            self.apply_directive(key, value)?;
        }
        Ok(())
    }

    pub fn apply_directive(&mut self, key: &str, value: &str) -> Result<(), NetError> {
        match key {
            "mac" => self.mac = value.parse()?,
            "ip" => self.ip = value.parse()?,
            "mask" | "netmask" => self.netmask = value.parse()?,
            "gw" | "gateway" => self.gateway = value.parse()?,
            "dns" => self.dns = value.parse()?,
            "peer" => self.peer = value.parse()?,
            "log" | "loglevel" => {
                self.log_level = Some(LogLevel::from_str(value).ok_or(NetError::UnknownDirective)?)
            }
            _ => return Err(NetError::UnknownDirective),
        }
        Ok(())
    }
}

impl Default for NetConfig {
    fn default() -> Self {
        Self::new()
    }
}
