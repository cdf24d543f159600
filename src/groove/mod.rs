//! Groove model — percussion roles and the templates performances are built from.

pub mod role;
pub mod template;

pub use role::{is_primary_role, map_role, PercussionRole, RoleMap};
pub use template::{
    preset, GrooveCatalog, GrooveTemplate, Layer, DEFAULT_STYLE, PRESET_STYLES,
};
