//! Set-algebra, address and classification properties of the reconciliation
//! primitives.

use std::net::Ipv4Addr;

use l3vpn_core::{
    address::{derive_interface, offset_address},
    classify::SubinterfaceClassifier,
    diff::{missing, obsolete, resource_set},
    AddressError, Catalog, ResourceSet,
};
use rstest::rstest;

fn sets() -> Vec<ResourceSet> {
    vec![
        ResourceSet::new(),
        resource_set(["default"]),
        resource_set(["default", "mgmt"]),
        resource_set(["default", "blue", "red"]),
        resource_set(["blue", "green"]),
        resource_set(["mgmt", "green", "yellow", "red"]),
    ]
}

#[test]
fn obsolete_and_missing_partition_the_union() {
    for a in sets() {
        for b in sets() {
            let o = obsolete(&a, &b);
            let m = missing(&a, &b);
            assert!(o.is_disjoint(&m), "overlap for {a:?} / {b:?}");

            let mut rebuilt: ResourceSet = a.intersection(&b).cloned().collect();
            rebuilt.extend(o);
            rebuilt.extend(m);
            let union: ResourceSet = a.union(&b).cloned().collect();
            assert_eq!(rebuilt, union, "union mismatch for {a:?} / {b:?}");
        }
    }
}

#[test]
fn unchanged_state_needs_no_action() {
    for a in sets() {
        assert!(obsolete(&a, &a).is_empty());
        assert!(missing(&a, &a).is_empty());
    }
}

#[rstest]
#[case("10.0.0.1", 4)]
#[case("0.0.0.0", 1)]
#[case("172.16.255.255", 1)]
#[case("192.168.1.200", 100)]
#[case("255.255.255.250", 5)]
fn offset_is_inverse_consistent(#[case] addr: &str, #[case] k: u32) {
    let base: Ipv4Addr = addr.parse().unwrap();
    let shifted = offset_address(base.into(), k).expect("no overflow");
    let std::net::IpAddr::V4(shifted) = shifted else {
        panic!("family changed");
    };
    assert_eq!(u32::from(shifted) - k, u32::from(base));
}

#[rstest]
#[case("255.255.255.255", 1)]
#[case("255.255.255.250", 6)]
fn offset_overflow_is_rejected(#[case] addr: &str, #[case] k: u32) {
    let base: Ipv4Addr = addr.parse().unwrap();
    assert!(matches!(
        offset_address(base.into(), k),
        Err(AddressError::Overflow { .. })
    ));
}

#[test]
fn classification_excludes_non_dotted_names() {
    let all = resource_set(["GigabitEthernet1", "GigabitEthernet1.10", "GigabitEthernet1.20"]);
    let with_ip = resource_set(["GigabitEthernet1", "GigabitEthernet1.10"]);
    let result = SubinterfaceClassifier::default().subinterfaces_without_ip(&all, &with_ip);
    assert_eq!(result, resource_set(["GigabitEthernet1.20"]));
}

#[test]
fn empty_catalog_tears_down_all_service_vrfs() {
    let catalog = Catalog::parse("services: null\n", "services.yaml".into()).expect("parse");
    assert!(catalog.global().is_empty());

    let system = resource_set(["default", "mgmt"]);
    let desired: ResourceSet = system
        .iter()
        .cloned()
        .chain(catalog.global().keys().map(|s| s.0.clone()))
        .collect();
    let observed = resource_set(["default", "blue", "red"]);

    assert_eq!(missing(&observed, &desired), resource_set(["mgmt"]));
    assert_eq!(obsolete(&observed, &desired), resource_set(["blue", "red"]));
}

#[test]
fn multi_homed_offset_four() {
    let iface = derive_interface("Gig0/1", "10.0.0.1 /30", 4).expect("derive");
    assert_eq!(iface.ip, "10.0.0.5 /30");
    assert_eq!(iface.virtual_ip, "10.0.0.1");
}
