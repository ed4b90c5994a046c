use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use l3vpn_core::diff::resource_set;
use l3vpn_core::inventory::{Defaults, GroupData, Host, HostData};
use l3vpn_core::types::{InterfaceAddress, InterfaceRecord};
use l3vpn_core::{Catalog, HostName, Inventory, ObservedState, RedundancySettings};
use l3vpn_reconcile::pipeline::{self, requires_teardown_confirmation};
use l3vpn_reconcile::{
    DeviceDriver, DeviceOutcome, DeviceReport, FailureKind, FetchError, PushError, PushMode,
    ReconcileOptions, Reconciler, Step, StepStatus,
};
use l3vpn_renderer::TemplateEngine;

const CATALOG: &str = r#"
services:
  - name: blue
    id: 10
    description: Blue customer
    route_import: "65000:10"
    route_export: "65000:10"
    sites:
      site-east:
        interfaces:
          - name: Gig0/1
            ip: 10.0.0.1 /30
      site-west:
        interfaces:
          - name: GigabitEthernet2.100
            ip: 10.0.1.1 /30
"#;

// ---------------------------------------------------------------------------
// In-memory driver
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeDriver {
    states: Mutex<BTreeMap<HostName, ObservedState>>,
    pushes: Mutex<Vec<(HostName, String)>>,
    unreachable: BTreeSet<HostName>,
    reject_push: bool,
    fetch_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeDriver {
    fn with_state(mut self, host: &str, state: ObservedState) -> Self {
        self.states.get_mut().unwrap().insert(HostName::from(host), state);
        self
    }

    fn pushes_for(&self, host: &str) -> Vec<String> {
        self.pushes
            .lock()
            .unwrap()
            .iter()
            .filter(|(h, _)| h.0 == host)
            .map(|(_, c)| c.clone())
            .collect()
    }
}

#[async_trait]
impl DeviceDriver for FakeDriver {
    async fn fetch(&self, host: &HostName) -> Result<ObservedState, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.unreachable.contains(host) {
            return Err(FetchError::Unreachable {
                host: host.clone(),
                message: "connection refused".to_string(),
            });
        }
        Ok(self
            .states
            .lock()
            .unwrap()
            .get(host)
            .cloned()
            .unwrap_or_default())
    }

    async fn push(&self, host: &HostName, config: &str, mode: PushMode) -> Result<(), PushError> {
        assert_eq!(mode, PushMode::Merge);
        if self.reject_push {
            return Err(PushError::Rejected {
                host: host.clone(),
                message: "% Invalid input".to_string(),
            });
        }
        self.pushes
            .lock()
            .unwrap()
            .push((host.clone(), config.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn inventory() -> Inventory {
    let mut groups = BTreeMap::new();
    groups.insert("ios".to_string(), GroupData::default());
    groups.insert("site-east".to_string(), GroupData::default());
    groups.insert("site-north".to_string(), GroupData::default());
    groups.insert(
        "site-west".to_string(),
        GroupData {
            multi_homed: true,
            hsrp: Some(RedundancySettings { priority: 100, vip_offset: 4 }),
        },
    );

    let host = |site: &str, hsrp: Option<RedundancySettings>| Host {
        groups: vec!["ios".to_string(), site.to_string()],
        data: HostData { hsrp },
        ..Host::default()
    };
    let mut hosts = BTreeMap::new();
    hosts.insert(HostName::from("east1"), host("site-east", None));
    hosts.insert(HostName::from("north1"), host("site-north", None));
    hosts.insert(
        HostName::from("west1"),
        host("site-west", Some(RedundancySettings { priority: 110, vip_offset: 4 })),
    );
    hosts.insert(HostName::from("west2"), host("site-west", None));
    hosts.insert(
        HostName::from("orphan"),
        Host {
            groups: vec!["ios".to_string()],
            ..Host::default()
        },
    );

    let defaults = Defaults {
        service_file: PathBuf::from("services.yaml"),
        bgp_asn: 65000,
        system_vrfs: vec!["default".to_string(), "mgmt".to_string()],
        primary_loopback: "Loopback0".to_string(),
        subinterface_pattern: None,
    };
    Inventory::new(hosts, groups, defaults).expect("inventory")
}

fn catalog(yaml: &str) -> Catalog {
    Catalog::parse(yaml, PathBuf::from("services.yaml")).expect("catalog")
}

fn observed(vrfs: &[&str]) -> ObservedState {
    let mut state = ObservedState {
        vrfs: resource_set(vrfs.iter().copied()),
        ..ObservedState::default()
    };
    state.interfaces_ip.insert(
        "Loopback0".to_string(),
        vec![InterfaceAddress {
            address: "192.0.2.1".to_string(),
            prefix_length: 32,
        }],
    );
    state
}

fn with_interface(mut state: ObservedState, name: &str, is_up: bool) -> ObservedState {
    state.interfaces.insert(
        name.to_string(),
        InterfaceRecord {
            name: name.to_string(),
            is_up,
            is_enabled: is_up,
        },
    );
    state
}

fn reconciler(catalog: Catalog, driver: Arc<FakeDriver>, dry_run: bool) -> Reconciler {
    Reconciler::new(
        Arc::new(catalog),
        Arc::new(inventory()),
        Arc::new(TemplateEngine::new(None).expect("engine")),
        driver,
        ReconcileOptions { dry_run },
    )
    .expect("reconciler")
}

fn status(report: &DeviceReport, step: Step) -> &StepStatus {
    &report.step(step).expect("step recorded").status
}

fn failure_kind(status: &StepStatus) -> Option<FailureKind> {
    match status {
        StepStatus::Failed(f) => Some(f.kind),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_homed_site_gets_vrf_bgp_and_interfaces() {
    let driver = Arc::new(FakeDriver::default().with_state("east1", observed(&["default", "mgmt"])));
    let r = reconciler(catalog(CATALOG), Arc::clone(&driver), false);

    let report = r.reconcile(&HostName::from("east1")).await;
    assert_eq!(report.outcome, DeviceOutcome::Changed);
    assert_eq!(*status(&report, Step::RemoveObsoleteVrfs), StepStatus::NoOp);
    assert_eq!(*status(&report, Step::CleanupSubinterfaces), StepStatus::NoOp);

    let pushes = driver.pushes_for("east1");
    assert_eq!(pushes.len(), 3, "vrf create, bgp, interfaces");
    assert!(pushes[0].starts_with("vrf definition blue\n"));
    assert!(pushes[0].contains(" rd 192.0.2.1:10\n"));
    assert!(!pushes[0].contains("vrf definition mgmt"));
    assert_eq!(
        pushes[1],
        "router bgp 65000\n address-family ipv4 vrf blue\n  redistribute connected\n exit-address-family\n!\n"
    );
    assert_eq!(
        pushes[2],
        "interface Gig0/1\n vrf forwarding blue\n ip address 10.0.0.1 /30\n no shutdown\n!\n"
    );
}

#[tokio::test]
async fn dry_run_renders_without_pushing() {
    let driver = Arc::new(FakeDriver::default().with_state("east1", observed(&["default", "mgmt"])));
    let r = reconciler(catalog(CATALOG), Arc::clone(&driver), true);

    let report = r.reconcile(&HostName::from("east1")).await;
    assert_eq!(report.outcome, DeviceOutcome::Changed);
    assert_eq!(*status(&report, Step::CreateMissingVrfs), StepStatus::Planned);
    let planned = report.step(Step::ConfigureInterfaces).unwrap();
    assert!(planned.config.as_deref().unwrap().contains("ip address 10.0.0.1 /30"));
    assert!(driver.pushes_for("east1").is_empty());
}

#[tokio::test]
async fn multi_homed_host_derives_address_and_uses_host_priority() {
    let driver = Arc::new(FakeDriver::default().with_state(
        "west1",
        observed(&["default", "mgmt", "blue"]),
    ));
    let r = reconciler(catalog(CATALOG), Arc::clone(&driver), false);

    let report = r.reconcile(&HostName::from("west1")).await;
    assert!(report.multi_homed);
    assert_eq!(*status(&report, Step::CreateMissingVrfs), StepStatus::NoOp);

    let pushes = driver.pushes_for("west1");
    let interfaces = pushes.last().expect("interface push");
    assert!(interfaces.contains(" ip address 10.0.1.5 /30\n"));
    assert!(interfaces.contains(" standby 1 ip 10.0.1.1\n"));
    assert!(interfaces.contains(" standby 1 priority 110\n"));
}

#[tokio::test]
async fn empty_catalog_removes_every_service_vrf() {
    let driver = Arc::new(FakeDriver::default().with_state(
        "east1",
        observed(&["default", "mgmt", "blue", "red"]),
    ));
    let empty = catalog("services: []\n");
    assert!(requires_teardown_confirmation(&empty));
    let r = reconciler(empty, Arc::clone(&driver), false);

    let report = r.reconcile(&HostName::from("east1")).await;
    assert_eq!(
        driver.pushes_for("east1"),
        vec!["no vrf definition blue\nno vrf definition red\n".to_string()]
    );
    assert_eq!(*status(&report, Step::CreateMissingVrfs), StepStatus::NoOp);
    assert_eq!(*status(&report, Step::ConfigureBgp), StepStatus::NoOp);
    assert_eq!(*status(&report, Step::ConfigureInterfaces), StepStatus::NoOp);
}

#[tokio::test]
async fn converged_site_is_noop() {
    let driver = Arc::new(FakeDriver::default().with_state(
        "north1",
        with_interface(observed(&["default", "mgmt"]), "GigabitEthernet1", true),
    ));
    let r = reconciler(catalog(CATALOG), Arc::clone(&driver), false);

    let report = r.reconcile(&HostName::from("north1")).await;
    assert_eq!(report.outcome, DeviceOutcome::NoOp);
    assert!(report.steps.iter().all(|s| s.status == StepStatus::NoOp));
    assert!(driver.pushes_for("north1").is_empty());
}

#[tokio::test]
async fn push_failure_skips_remaining_steps() {
    let driver = Arc::new(FakeDriver {
        reject_push: true,
        ..FakeDriver::default().with_state("east1", observed(&["default", "mgmt", "stale"]))
    });
    let r = reconciler(catalog(CATALOG), driver, false);

    let report = r.reconcile(&HostName::from("east1")).await;
    assert!(report.is_failed());
    assert_eq!(
        failure_kind(status(&report, Step::RemoveObsoleteVrfs)),
        Some(FailureKind::Push)
    );
    for step in [
        Step::CreateMissingVrfs,
        Step::ConfigureBgp,
        Step::ConfigureInterfaces,
        Step::CleanupSubinterfaces,
    ] {
        assert_eq!(*status(&report, step), StepStatus::Skipped, "{step}");
    }
}

#[tokio::test]
async fn derivation_overflow_fails_interfaces_but_cleanup_runs() {
    let overflow = r#"
services:
  - name: blue
    id: 10
    description: Blue customer
    route_import: "65000:10"
    route_export: "65000:10"
    sites:
      site-west:
        interfaces:
          - name: GigabitEthernet2.100
            ip: 255.255.255.254 /31
"#;
    let state = with_interface(
        observed(&["default", "mgmt", "blue"]),
        "GigabitEthernet2.200",
        true,
    );
    let driver = Arc::new(FakeDriver::default().with_state("west2", state));
    let r = reconciler(catalog(overflow), Arc::clone(&driver), false);

    let report = r.reconcile(&HostName::from("west2")).await;
    assert!(report.is_failed());
    assert_eq!(
        failure_kind(status(&report, Step::ConfigureInterfaces)),
        Some(FailureKind::AddressDerivation)
    );
    assert_eq!(*status(&report, Step::CleanupSubinterfaces), StepStatus::Applied);
    assert_eq!(
        driver.pushes_for("west2").last().map(String::as_str),
        Some("no interface GigabitEthernet2.200\n")
    );
}

#[tokio::test]
async fn admin_down_subinterface_is_left_alone() {
    let state = with_interface(observed(&["default", "mgmt"]), "GigabitEthernet2.30", false);
    let driver = Arc::new(FakeDriver::default().with_state("north1", state));
    let r = reconciler(catalog(CATALOG), Arc::clone(&driver), false);

    let report = r.reconcile(&HostName::from("north1")).await;
    assert_eq!(*status(&report, Step::CleanupSubinterfaces), StepStatus::NoOp);
    assert!(driver.pushes_for("north1").is_empty());
}

#[tokio::test]
async fn host_without_site_group_fails_resolution() {
    let driver = Arc::new(FakeDriver::default());
    let r = reconciler(catalog(CATALOG), driver, true);

    let report = r.reconcile(&HostName::from("orphan")).await;
    match &report.outcome {
        DeviceOutcome::Failed(f) => assert_eq!(f.kind, FailureKind::SiteResolution),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(report.steps.is_empty());
    assert!(report.site.is_none());
}

#[tokio::test]
async fn unreachable_device_does_not_affect_others() {
    let driver = Arc::new(FakeDriver {
        unreachable: [HostName::from("east1")].into_iter().collect(),
        ..FakeDriver::default().with_state("north1", observed(&["default", "mgmt"]))
    });
    let r = Arc::new(reconciler(catalog(CATALOG), driver, true));

    let run = pipeline::run(
        r,
        vec![HostName::from("north1"), HostName::from("east1")],
        4,
    )
    .await;
    let hosts: Vec<&str> = run.devices.iter().map(|d| d.host.0.as_str()).collect();
    assert_eq!(hosts, vec!["east1", "north1"]);
    assert!(run.devices[0].is_failed());
    assert_eq!(run.devices[1].outcome, DeviceOutcome::NoOp);
    assert!(run.has_failures());
    let summary = run.summary();
    assert_eq!((summary.changed, summary.no_op, summary.failed), (0, 1, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_limit_bounds_devices_in_flight() {
    let driver = Arc::new(FakeDriver {
        fetch_delay: Some(Duration::from_millis(25)),
        ..FakeDriver::default()
    });
    let r = Arc::new(reconciler(catalog(CATALOG), Arc::clone(&driver), true));
    let hosts = vec![
        HostName::from("east1"),
        HostName::from("north1"),
        HostName::from("west1"),
        HostName::from("west2"),
        HostName::from("orphan"),
    ];

    let run = pipeline::run(r, hosts, 2).await;
    assert_eq!(run.devices.len(), 5);
    assert!(driver.max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn report_serializes_with_flat_status() {
    let driver = Arc::new(FakeDriver::default().with_state("north1", observed(&["default", "mgmt"])));
    let r = Arc::new(reconciler(catalog(CATALOG), driver, true));

    let run = pipeline::run(r, vec![HostName::from("north1")], 1).await;
    let json = serde_json::to_value(&run).expect("serialize");
    assert_eq!(json["dry_run"], true);
    assert_eq!(json["devices"][0]["host"], "north1");
    assert_eq!(json["devices"][0]["outcome"], "no_op");
    assert_eq!(json["devices"][0]["steps"][0]["step"], "remove_obsolete_vrfs");
    assert_eq!(json["devices"][0]["steps"][0]["status"], "no_op");
}
