//! Data source abstraction for raw simulation fields
//!
//! The diagnostic core never touches files directly: it pulls raw fields
//! through the [`FieldSource`] trait, so the same derivation and detection
//! code runs against a NetCDF archive, an in-memory fixture, or anything else
//! a caller provides.

use crate::errors::Result;
use crate::grid::{DomainRange, VerticalLevels};
use ndarray::Array4;

/// Supplier of raw gridded fields for a batch of time steps.
///
/// Implementations return arrays shaped (time, z, y, x) with the requested
/// sub-range already applied, one row per requested time step, in request
/// order.
pub trait FieldSource {
    /// Fetch a raw variable over the given time steps and (z, y, x)
    /// sub-range.
    fn field(
        &self,
        name: &str,
        time_steps: &[usize],
        domain: DomainRange,
    ) -> Result<Array4<f32>>;

    /// The vertical level coordinate shared by all variables, in meters.
    fn level_coordinate(&self) -> Result<VerticalLevels>;

    /// Whether a variable exists in the source. Used for alternate-identifier
    /// fallbacks before committing to a fetch.
    fn has_variable(&self, name: &str) -> bool;
}
