//! # l3vpn-renderer
//!
//! Tera-based engine that turns reconciliation decisions into device
//! configuration text. The reconciler never inspects the text it gets back.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use l3vpn_renderer::{context::VrfRemoveCtx, TemplateEngine};
//!
//! fn render_removals(vrfs: Vec<String>) {
//!     if let Ok(engine) = TemplateEngine::new(None) {
//!         if let Ok(text) = engine.render(&VrfRemoveCtx { vrfs }) {
//!             print!("{text}");
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::RenderContext;
pub use engine::{TemplateEngine, TemplateKind};
pub use error::RenderError;
