//! Tera rendering engine — [`TemplateKind`] enum and [`TemplateEngine`].
//!
//! | Template                  | Used for                                   |
//! |---------------------------|--------------------------------------------|
//! | `vrf_remove`              | deleting obsolete VRFs                     |
//! | `vrf_create`              | creating missing VRFs with route targets   |
//! | `bgp_address_family`      | per-service BGP address families           |
//! | `interface_single_homed`  | service interfaces, catalog addressing     |
//! | `interface_multi_homed`   | service interfaces with HSRP virtual IPs   |
//! | `subinterface_remove`     | deleting orphaned subinterfaces            |
//!
//! Embedded templates can be overridden by `<name>.tera` files in a user
//! template directory.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tera::Tera;

use crate::context::RenderContext;
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates — baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("vrf_remove.tera", include_str!("templates/vrf_remove.tera")),
    ("vrf_create.tera", include_str!("templates/vrf_create.tera")),
    (
        "bgp_address_family.tera",
        include_str!("templates/bgp_address_family.tera"),
    ),
    (
        "interface_single_homed.tera",
        include_str!("templates/interface_single_homed.tera"),
    ),
    (
        "interface_multi_homed.tera",
        include_str!("templates/interface_multi_homed.tera"),
    ),
    (
        "subinterface_remove.tera",
        include_str!("templates/subinterface_remove.tera"),
    ),
];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

/// Top-level `*.tera` files in `dir`, keyed by exact file name.
fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut templates = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name.to_string(), contents));
    }
    Ok(templates)
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = TPLS
        .iter()
        .map(|(name, content)| ((*name).to_string(), (*content).to_string()))
        .collect();
    if let Some(dir) = user_template_dir {
        templates.extend(load_user_templates(dir)?);
    }

    let mut tera = Tera::default();
    let items: Vec<(String, String)> = templates.into_iter().collect();
    tera.add_raw_templates(items)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// TemplateKind
// ---------------------------------------------------------------------------

/// Every configuration block the reconciler can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    VrfRemove,
    VrfCreate,
    BgpAddressFamily,
    InterfaceSingleHomed,
    InterfaceMultiHomed,
    SubinterfaceRemove,
}

impl TemplateKind {
    /// All template kinds in a stable order.
    pub fn all() -> &'static [TemplateKind] {
        &[
            TemplateKind::VrfRemove,
            TemplateKind::VrfCreate,
            TemplateKind::BgpAddressFamily,
            TemplateKind::InterfaceSingleHomed,
            TemplateKind::InterfaceMultiHomed,
            TemplateKind::SubinterfaceRemove,
        ]
    }

    /// Registered Tera template name.
    pub fn template_name(&self) -> &'static str {
        match self {
            TemplateKind::VrfRemove            => "vrf_remove.tera",
            TemplateKind::VrfCreate            => "vrf_create.tera",
            TemplateKind::BgpAddressFamily     => "bgp_address_family.tera",
            TemplateKind::InterfaceSingleHomed => "interface_single_homed.tera",
            TemplateKind::InterfaceMultiHomed  => "interface_multi_homed.tera",
            TemplateKind::SubinterfaceRemove   => "subinterface_remove.tera",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template_name().trim_end_matches(".tera"))
    }
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera-based engine for rendering configuration blocks with optional user
/// overrides. Create once and share; rendering takes `&self`.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Construct a new [`TemplateEngine`], loading embedded templates plus any
    /// overrides found in `user_template_dir`.
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        let tera = build_tera(user_template_dir)?;
        Ok(TemplateEngine { tera })
    }

    /// Render the template bound to `ctx`.
    ///
    /// Output is LF-only and ends with exactly one newline (empty output stays
    /// empty).
    pub fn render<C: RenderContext>(&self, ctx: &C) -> Result<String, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        let rendered = self.tera.render(C::KIND.template_name(), &tera_ctx)?;
        Ok(normalize_output(&rendered))
    }
}

fn normalize_output(rendered: &str) -> String {
    let text = rendered.replace("\r\n", "\n");
    let trimmed = text.trim_end_matches('\n');
    if trimmed.trim().is_empty() {
        return String::new();
    }
    format!("{trimmed}\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
