//! Address derivation for multi-homed interfaces.
//!
//! A multi-homed interface keeps the catalog address as the shared
//! redundancy-protocol virtual IP and takes `address + offset` as its own
//! operational address. The arithmetic is done on the integer representation
//! of the address; crossing the top of the address family is an error.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::AddressError;
use crate::types::{MultiHomedInterface, ServiceName, SiteServices};

/// Shift `addr` up by `offset` within its own address family.
pub fn offset_address(addr: IpAddr, offset: u32) -> Result<IpAddr, AddressError> {
    let overflow = || AddressError::Overflow {
        address: addr.to_string(),
        offset,
    };
    match addr {
        IpAddr::V4(v4) => u32::from(v4)
            .checked_add(offset)
            .map(|n| IpAddr::V4(Ipv4Addr::from(n)))
            .ok_or_else(overflow),
        IpAddr::V6(v6) => u128::from(v6)
            .checked_add(u128::from(offset))
            .map(|n| IpAddr::V6(Ipv6Addr::from(n)))
            .ok_or_else(overflow),
    }
}

/// Split `"10.0.0.1 /30"` into the parsed address and the mask token.
///
/// The mask token is returned verbatim; both prefix (`/30`) and dotted
/// (`255.255.255.252`) forms pass through untouched.
pub fn split_address_mask(value: &str) -> Result<(IpAddr, &str), AddressError> {
    let mut parts = value.split_whitespace();
    let (Some(addr), Some(mask), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AddressError::Malformed {
            value: value.to_string(),
        });
    };
    let parsed = addr.parse::<IpAddr>().map_err(|_| AddressError::InvalidAddress {
        value: addr.to_string(),
    })?;
    Ok((parsed, mask))
}

/// Derive operational and virtual addressing for one interface.
pub fn derive_interface(
    name: &str,
    address_mask: &str,
    offset: u32,
) -> Result<MultiHomedInterface, AddressError> {
    let (addr, mask) = split_address_mask(address_mask)?;
    let derived = offset_address(addr, offset)?;
    Ok(MultiHomedInterface {
        name: name.to_string(),
        ip: format!("{derived} {mask}"),
        virtual_ip: addr.to_string(),
    })
}

/// Derive multi-homed addressing for every interface of every site service.
///
/// An empty `services` map yields an empty result.
pub fn derive_multi_homed(
    services: &SiteServices,
    offset: u32,
) -> Result<Vec<(ServiceName, Vec<MultiHomedInterface>)>, AddressError> {
    services
        .iter()
        .map(|(service, params)| {
            let interfaces = params
                .interfaces
                .iter()
                .map(|i| derive_interface(&i.name, &i.ip, offset))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((service.clone(), interfaces))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InterfaceSpec, SiteServiceParams};
    use std::collections::BTreeMap;

    fn v4(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn offset_crosses_octet_boundary() {
        assert_eq!(offset_address(v4("10.0.0.254"), 4).unwrap(), v4("10.0.1.2"));
    }

    #[test]
    fn offset_zero_is_identity() {
        assert_eq!(offset_address(v4("192.0.2.7"), 0).unwrap(), v4("192.0.2.7"));
    }

    #[test]
    fn ipv4_overflow_is_an_error() {
        let err = offset_address(v4("255.255.255.254"), 2).unwrap_err();
        assert!(matches!(err, AddressError::Overflow { offset: 2, .. }));
    }

    #[test]
    fn ipv6_stays_in_family() {
        let out = offset_address("2001:db8::1".parse().unwrap(), 4).unwrap();
        assert_eq!(out, "2001:db8::5".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn split_accepts_dotted_mask() {
        let (addr, mask) = split_address_mask("10.1.1.1 255.255.255.252").unwrap();
        assert_eq!(addr, v4("10.1.1.1"));
        assert_eq!(mask, "255.255.255.252");
    }

    #[test]
    fn split_rejects_missing_mask_and_junk() {
        assert!(matches!(
            split_address_mask("10.1.1.1"),
            Err(AddressError::Malformed { .. })
        ));
        assert!(matches!(
            split_address_mask("10.1.1.1 /30 extra"),
            Err(AddressError::Malformed { .. })
        ));
        assert!(matches!(
            split_address_mask("ten.one /30"),
            Err(AddressError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn multi_homed_keeps_original_as_virtual_ip() {
        let iface = derive_interface("Gig0/1", "10.0.0.1 /30", 4).unwrap();
        assert_eq!(iface.ip, "10.0.0.5 /30");
        assert_eq!(iface.virtual_ip, "10.0.0.1");
    }

    #[test]
    fn empty_services_derive_nothing() {
        let out = derive_multi_homed(&BTreeMap::new(), 4).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn derivation_failure_names_the_address() {
        let mut services = BTreeMap::new();
        services.insert(
            ServiceName::from("blue"),
            SiteServiceParams {
                interfaces: vec![InterfaceSpec {
                    name: "Gig0/1".to_string(),
                    ip: "255.255.255.255 /32".to_string(),
                }],
            },
        );
        let err = derive_multi_homed(&services, 1).unwrap_err();
        assert!(err.to_string().contains("255.255.255.255"));
    }
}
