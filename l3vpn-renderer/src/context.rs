//! Template contexts — one serializable parameter bundle per template.
//!
//! Every context names the template it renders through [`RenderContext`], so
//! a bundle can never be paired with the wrong template.

use serde::Serialize;

use l3vpn_core::types::{InterfaceSpec, MultiHomedInterface, ServicePolicy};

use crate::engine::TemplateKind;
use crate::error::RenderError;

/// A serializable bundle bound to one template.
pub trait RenderContext: Serialize {
    const KIND: TemplateKind;

    /// Convert to a [`tera::Context`] for rendering.
    fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}

/// VRFs to delete.
#[derive(Debug, Clone, Serialize)]
pub struct VrfRemoveCtx {
    pub vrfs: Vec<String>,
}

impl RenderContext for VrfRemoveCtx {
    const KIND: TemplateKind = TemplateKind::VrfRemove;
}

/// One VRF to create. System VRFs carry no policy.
#[derive(Debug, Clone, Serialize)]
pub struct VrfCtx {
    pub name: String,
    pub policy: Option<ServicePolicy>,
}

/// VRFs to create, with the loopback address used as RD prefix.
#[derive(Debug, Clone, Serialize)]
pub struct VrfCreateCtx {
    pub loopback_ip: String,
    pub vrfs: Vec<VrfCtx>,
}

impl RenderContext for VrfCreateCtx {
    const KIND: TemplateKind = TemplateKind::VrfCreate;
}

/// BGP address families for the site's services.
#[derive(Debug, Clone, Serialize)]
pub struct BgpCtx {
    pub asn: u32,
    pub services: Vec<String>,
}

impl RenderContext for BgpCtx {
    const KIND: TemplateKind = TemplateKind::BgpAddressFamily;
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInterfacesCtx<I> {
    pub name: String,
    pub interfaces: Vec<I>,
}

/// Catalog interfaces applied verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct SingleHomedCtx {
    pub services: Vec<ServiceInterfacesCtx<InterfaceSpec>>,
}

impl RenderContext for SingleHomedCtx {
    const KIND: TemplateKind = TemplateKind::InterfaceSingleHomed;
}

/// Derived interfaces with redundancy-protocol settings.
#[derive(Debug, Clone, Serialize)]
pub struct MultiHomedCtx {
    pub priority: u32,
    pub services: Vec<ServiceInterfacesCtx<MultiHomedInterface>>,
}

impl RenderContext for MultiHomedCtx {
    const KIND: TemplateKind = TemplateKind::InterfaceMultiHomed;
}

/// Orphaned subinterfaces to delete.
#[derive(Debug, Clone, Serialize)]
pub struct SubinterfaceRemoveCtx {
    pub interfaces: Vec<String>,
}

impl RenderContext for SubinterfaceRemoveCtx {
    const KIND: TemplateKind = TemplateKind::SubinterfaceRemove;
}
