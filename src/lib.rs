//! bl_diag: boundary-layer diagnostics from gridded simulation output
//!
//! A Rust library for computing atmospheric boundary-layer diagnostics from
//! gridded NetCDF time-series output (3D velocity, vorticity, potential
//! temperature fields) and deriving scalar boundary-layer-height time series
//! using several independent physical criteria.
//!
//! ## Key Features
//!
//! - **Field Derivation**: TKE, enstrophy and vertical heat-flux covariance
//!   profiles regridded from staggered (Arakawa-C) raw fields
//! - **Boundary Detection**: four explicit strategies (θ-offset, maximum
//!   gradient, threshold crossing, heat-flux sign transitions) with defined
//!   sentinel and tie-break conventions
//! - **Parallel Processing**: per-time-step dispatch using Rayon, with
//!   results ordered by input time step
//! - **NetCDF Support**: archive-backed field source and result writing
//!
//! ## Module Organization
//!
//! - [`grid`]: vertical levels, domain sub-ranges, staggered regridding
//! - [`fields`]: per-time-step derivation of turbulence quantities
//! - [`detect`]: boundary-height detection strategies
//! - [`analysis`]: batch computation over a time range via a [`source::FieldSource`]
//! - [`source`]: the data-source abstraction implemented by callers
//! - [`netcdf_io`]: NetCDF-backed field source and result writer
//! - [`metadata`]: archive inspection
//! - [`parallel`]: parallel processing configuration and dispatch
//! - [`errors`]: centralized error handling
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use bl_diag::prelude::*;
//!
//! let source = NetcdfFieldSource::open("case.nc").unwrap();
//! let steps: Vec<usize> = (0..721).collect();
//!
//! // Heat-flux covariance over the full domain
//! let wth = compute_quantity(
//!     &source,
//!     QuantityKind::HeatFluxCovariance,
//!     &steps,
//!     DomainRange::unbounded(),
//!     PerturbationReference::AnalysisDomain,
//! )
//! .unwrap();
//!
//! // Lower/mid/upper boundary heights from the flux sign transitions
//! let method = BoundaryMethod::WthBoundary { noise_threshold: 1e-3 };
//! let heights = detect_boundary(method, &wth).unwrap();
//! # let _ = heights;
//! ```
//!
//! The detectors are pure functions over immutable series: calling one twice
//! on identical input yields bit-identical output, and per-time-step failures
//! are recovered into sentinel heights rather than aborting a batch.

// Core modules
pub mod analysis;
pub mod detect;
pub mod errors;
pub mod fields;
pub mod grid;
pub mod metadata;
pub mod netcdf_io;
pub mod parallel;
pub mod source;

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::analysis::{
        compute_enstrophy, compute_heat_flux, compute_quantity, compute_tke,
        domain_mean_profile, QuantityKind,
    };
    pub use crate::detect::{
        detect_boundary, BoundaryDetection, BoundaryMethod, BoundarySeries, WthBoundarySeries,
        SENTINEL_HEIGHT,
    };
    pub use crate::errors::{BlDiagError, Result};
    pub use crate::fields::{PerturbationReference, ProfileSeries};
    pub use crate::grid::{DomainRange, VerticalLevels};
    pub use crate::netcdf_io::{DiagnosticsWriter, NetcdfFieldSource};
    pub use crate::parallel::ParallelConfig;
    pub use crate::source::FieldSource;
}
