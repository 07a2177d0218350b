// ============================================================================
// OPS: raster operations driven by the editing session
// ============================================================================
//
// Layout:
//   fill.rs         : gray placeholder fill, per-shape regions, mask export
//   edit_service.rs : request/response contract for the external image editor
// ============================================================================

pub mod edit_service;
pub mod fill;

pub use edit_service::{EchoEditService, EditError, EditRequest, EditResponse, EditService, HttpEditService};
pub use fill::{FILL_GRAY, FillResult, Region, fill_shapes};
