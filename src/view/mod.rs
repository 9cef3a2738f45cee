//! View layer: pure planners, the surface adapter, and the transition scheduler.
//!
//! - **[`visibility`]**: flat-list and detail-panel show/hide planning.
//! - **[`groups`]**: container planning and collapse snapshots.
//! - **[`surface`]**: the mutation adapter and the in-memory [`surface::ViewModel`].
//! - **[`transition`]**: staggered, generation-checked fades.

pub mod groups;
pub mod surface;
pub mod transition;
pub mod visibility;
