//! Pure planning: desired state + observed state → render contexts.
//!
//! Nothing in here awaits or performs I/O. The orchestrator builds an
//! immutable [`DeviceContext`] once per device and asks the [`Planner`] for a
//! [`DevicePlan`]; each `Some` context in the plan becomes one pushed block.

use l3vpn_core::address::derive_multi_homed;
use l3vpn_core::inventory::Defaults;
use l3vpn_core::types::{GlobalServices, ServiceName};
use l3vpn_core::{
    AddressError, Homing, ObservedState, ResourceDiff, ResourceSet, SiteContext, SiteServices,
    SubinterfaceClassifier,
};
use l3vpn_renderer::context::{
    BgpCtx, MultiHomedCtx, ServiceInterfacesCtx, SingleHomedCtx, SubinterfaceRemoveCtx,
    VrfCreateCtx, VrfCtx, VrfRemoveCtx,
};

use crate::error::FetchError;

/// Everything known about one device for the duration of a run.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    pub site: SiteContext,
    pub services: SiteServices,
    pub observed: ObservedState,
}

impl DeviceContext {
    /// Names of the interfaces this run configures.
    pub fn configured_interfaces(&self) -> ResourceSet {
        self.services
            .values()
            .flat_map(|p| p.interfaces.iter().map(|i| i.name.clone()))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum InterfacePlan {
    SingleHomed(SingleHomedCtx),
    MultiHomed(MultiHomedCtx),
}

/// Ordered actions for one device.
#[derive(Debug, Clone)]
pub struct DevicePlan {
    pub vrf_diff: ResourceDiff,
    pub remove_vrfs: Option<VrfRemoveCtx>,
    pub create_vrfs: Option<VrfCreateCtx>,
    pub bgp: Option<BgpCtx>,
    /// Derivation failures only affect the interface step.
    pub interfaces: Result<Option<InterfacePlan>, AddressError>,
    pub cleanup: Option<SubinterfaceRemoveCtx>,
}

/// System VRFs plus one VRF per service attached to the site.
pub fn desired_vrfs(system_vrfs: &[String], services: &SiteServices) -> ResourceSet {
    system_vrfs
        .iter()
        .cloned()
        .chain(services.keys().map(|s| s.0.clone()))
        .collect()
}

/// Up subinterfaces without an IP that this run does not configure.
pub fn orphan_subinterfaces(ctx: &DeviceContext, classifier: &SubinterfaceClassifier) -> ResourceSet {
    let candidates = classifier.subinterfaces_without_ip(
        &ctx.observed.interface_names(),
        &ctx.observed.interfaces_with_ip(),
    );
    let configured = ctx.configured_interfaces();
    candidates
        .into_iter()
        .filter(|name| ctx.observed.is_up(name) && !configured.contains(name))
        .collect()
}

/// Shared, read-only inputs for planning every device.
pub struct Planner<'a> {
    pub global: &'a GlobalServices,
    pub defaults: &'a Defaults,
    pub classifier: &'a SubinterfaceClassifier,
}

impl Planner<'_> {
    /// Build the action plan for `ctx`.
    ///
    /// Fails only when VRFs must be created and the primary loopback carries
    /// no address to derive route distinguishers from.
    pub fn plan(&self, ctx: &DeviceContext) -> Result<DevicePlan, FetchError> {
        let desired = desired_vrfs(&self.defaults.system_vrfs, &ctx.services);
        let vrf_diff = ResourceDiff::compute(&ctx.observed.vrfs, &desired);

        let remove_vrfs = (!vrf_diff.obsolete.is_empty()).then(|| VrfRemoveCtx {
            vrfs: vrf_diff.obsolete.iter().cloned().collect(),
        });
        let create_vrfs = if vrf_diff.missing.is_empty() {
            None
        } else {
            Some(self.vrf_create(ctx, &vrf_diff.missing)?)
        };

        let bgp = (!ctx.services.is_empty()).then(|| BgpCtx {
            asn: self.defaults.bgp_asn,
            services: ctx.services.keys().map(|s| s.0.clone()).collect(),
        });

        let cleanup = orphan_subinterfaces(ctx, self.classifier);
        let cleanup = (!cleanup.is_empty()).then(|| SubinterfaceRemoveCtx {
            interfaces: cleanup.into_iter().collect(),
        });

        Ok(DevicePlan {
            vrf_diff,
            remove_vrfs,
            create_vrfs,
            bgp,
            interfaces: plan_interfaces(ctx),
            cleanup,
        })
    }

    fn vrf_create(&self, ctx: &DeviceContext, missing: &ResourceSet) -> Result<VrfCreateCtx, FetchError> {
        let loopback = &self.defaults.primary_loopback;
        let loopback_ip = ctx.observed.first_address(loopback).ok_or_else(|| {
            FetchError::MissingLoopback {
                host: ctx.site.host.clone(),
                interface: loopback.clone(),
            }
        })?;
        let vrfs = missing
            .iter()
            .map(|name| VrfCtx {
                name: name.clone(),
                policy: self.global.get(&ServiceName::from(name.as_str())).cloned(),
            })
            .collect();
        Ok(VrfCreateCtx {
            loopback_ip: loopback_ip.to_string(),
            vrfs,
        })
    }
}

/// Interface configuration for the site's homing mode. No services, no plan.
pub fn plan_interfaces(ctx: &DeviceContext) -> Result<Option<InterfacePlan>, AddressError> {
    if ctx.services.is_empty() {
        return Ok(None);
    }
    let plan = match ctx.site.homing {
        Homing::Single => InterfacePlan::SingleHomed(SingleHomedCtx {
            services: ctx
                .services
                .iter()
                .map(|(name, params)| ServiceInterfacesCtx {
                    name: name.0.clone(),
                    interfaces: params.interfaces.clone(),
                })
                .collect(),
        }),
        Homing::Multi(redundancy) => {
            let derived = derive_multi_homed(&ctx.services, redundancy.vip_offset)?;
            InterfacePlan::MultiHomed(MultiHomedCtx {
                priority: redundancy.priority,
                services: derived
                    .into_iter()
                    .map(|(name, interfaces)| ServiceInterfacesCtx {
                        name: name.0,
                        interfaces,
                    })
                    .collect(),
            })
        }
    };
    Ok(Some(plan))
}
