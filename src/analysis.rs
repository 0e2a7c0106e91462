//! Batch computation of derived quantities over a time range
//!
//! This layer connects a [`FieldSource`] to the per-time-step derivations in
//! [`crate::fields`]: it fetches the raw component fields once, dispatches
//! the per-step work through [`run_over_time`], and assembles the results
//! into a [`ProfileSeries`] with correctly aligned level coordinates.
//!
//! A degenerate time step (all-NaN sub-domain slice) becomes a NaN row in
//! the output; it never aborts the batch. Setup problems (missing variables,
//! component shape mismatches) are fatal and surfaced immediately.

use crate::errors::{BlDiagError, Result};
use crate::fields::{
    enstrophy_profile_step, heat_flux_profile_step, nanmean_horizontal, tke_profile_step,
    PerturbationReference, ProfileSeries,
};
use crate::grid::DomainRange;
use crate::parallel::run_over_time;
use crate::source::FieldSource;
use ndarray::{Array1, Array2, Array4, Axis};

/// Derived quantity selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityKind {
    /// Turbulent kinetic energy (u² + v² + w², no 0.5 factor)
    Tke,
    /// Sum of squared vorticity components
    Enstrophy,
    /// Vertical heat-flux covariance w'θ'
    HeatFluxCovariance,
}

impl QuantityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tke => "tke",
            Self::Enstrophy => "enstrophy",
            Self::HeatFluxCovariance => "wth",
        }
    }

    /// Parse a quantity name; unknown names are a hard error.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "tke" => Ok(Self::Tke),
            "enstrophy" => Ok(Self::Enstrophy),
            "wth" | "heat_flux" => Ok(Self::HeatFluxCovariance),
            other => Err(BlDiagError::Generic(format!(
                "unknown quantity '{}', expected tke, enstrophy or wth",
                other
            ))),
        }
    }
}

/// Compute a derived quantity as a (time × level) series over the requested
/// time steps and sub-domain.
///
/// `reference` only affects the heat-flux covariance.
pub fn compute_quantity<S: FieldSource>(
    source: &S,
    kind: QuantityKind,
    time_steps: &[usize],
    domain: DomainRange,
    reference: PerturbationReference,
) -> Result<ProfileSeries> {
    match kind {
        QuantityKind::Tke => compute_tke(source, time_steps, domain),
        QuantityKind::Enstrophy => compute_enstrophy(source, time_steps, domain),
        QuantityKind::HeatFluxCovariance => {
            compute_heat_flux(source, time_steps, domain, reference)
        }
    }
}

/// Domain-mean TKE profile per time step, aligned with the interior levels of
/// the requested vertical range.
pub fn compute_tke<S: FieldSource>(
    source: &S,
    time_steps: &[usize],
    domain: DomainRange,
) -> Result<ProfileSeries> {
    let u = source.field("u", time_steps, domain)?;
    let v = source.field("v", time_steps, domain)?;
    let w = source.field("w", time_steps, domain)?;
    check_component_shapes("v", &u, &v)?;
    check_component_shapes("w", &u, &w)?;

    let nz = u.len_of(Axis(1));
    if nz < 2 {
        return Err(BlDiagError::DegenerateProfile {
            message: format!("need at least 2 vertical levels for TKE, got {}", nz),
        });
    }
    let n_levels = nz - 1;

    let indices: Vec<usize> = (0..u.len_of(Axis(0))).collect();
    let rows = run_over_time(
        |t| {
            tke_profile_step(
                u.index_axis(Axis(0), t),
                v.index_axis(Axis(0), t),
                w.index_axis(Axis(0), t),
            )
            .unwrap_or_else(|_| nan_row(n_levels))
        },
        &indices,
    );

    let zc = source.level_coordinate()?;
    let (z0, z1) = domain.resolve_z(zc.len())?;
    ProfileSeries::new(stack_rows(rows, n_levels), zc.subrange(z0, z1).interior())
}

/// Domain-mean enstrophy profile per time step.
///
/// Falls back to the alternate identifier `eta_2` when `eta`'s shape does
/// not match `xi`'s (an archive naming quirk); if neither matches, the
/// setup fails with a shape mismatch.
pub fn compute_enstrophy<S: FieldSource>(
    source: &S,
    time_steps: &[usize],
    domain: DomainRange,
) -> Result<ProfileSeries> {
    let xi = source.field("xi", time_steps, domain)?;
    let mut eta = source.field("eta", time_steps, domain)?;
    if eta.shape() != xi.shape() && source.has_variable("eta_2") {
        eta = source.field("eta_2", time_steps, domain)?;
    }
    check_component_shapes("eta", &xi, &eta)?;
    let zeta = source.field("zeta", time_steps, domain)?;
    check_component_shapes("zeta", &xi, &zeta)?;

    let n_levels = xi.len_of(Axis(1));
    let indices: Vec<usize> = (0..xi.len_of(Axis(0))).collect();
    let rows = run_over_time(
        |t| {
            enstrophy_profile_step(
                xi.index_axis(Axis(0), t),
                eta.index_axis(Axis(0), t),
                zeta.index_axis(Axis(0), t),
            )
            .unwrap_or_else(|_| nan_row(n_levels))
        },
        &indices,
    );

    let zc = source.level_coordinate()?;
    let (z0, z1) = domain.resolve_z(zc.len())?;
    ProfileSeries::new(stack_rows(rows, n_levels), zc.subrange(z0, z1))
}

/// Domain-mean w'θ' covariance profile per time step, aligned with the
/// interior levels of the requested vertical range.
///
/// The fields are fetched with the full horizontal domain so that the
/// [`PerturbationReference::FullDomain`] policy can remove the full-domain
/// mean; the horizontal analysis window is applied inside the per-step
/// derivation.
pub fn compute_heat_flux<S: FieldSource>(
    source: &S,
    time_steps: &[usize],
    domain: DomainRange,
    reference: PerturbationReference,
) -> Result<ProfileSeries> {
    let z_only = DomainRange {
        z0: domain.z0,
        z1: domain.z1,
        ..DomainRange::unbounded()
    };
    let w = source.field("w", time_steps, z_only)?;
    let th = source.field("th", time_steps, z_only)?;
    check_component_shapes("th", &w, &th)?;

    let nz = w.len_of(Axis(1));
    if nz < 2 {
        return Err(BlDiagError::DegenerateProfile {
            message: format!("need at least 2 vertical levels for w'θ', got {}", nz),
        });
    }
    let n_levels = nz - 1;
    let horizontal = domain.horizontal_only();

    let indices: Vec<usize> = (0..w.len_of(Axis(0))).collect();
    let rows = run_over_time(
        |t| {
            heat_flux_profile_step(
                w.index_axis(Axis(0), t),
                th.index_axis(Axis(0), t),
                horizontal,
                reference,
            )
            .unwrap_or_else(|_| nan_row(n_levels))
        },
        &indices,
    );

    let zc = source.level_coordinate()?;
    let (z0, z1) = domain.resolve_z(zc.len())?;
    ProfileSeries::new(stack_rows(rows, n_levels), zc.subrange(z0, z1).interior())
}

/// Horizontal-mean vertical profile of a raw variable per time step, the
/// input contract for the profile-based detectors.
pub fn domain_mean_profile<S: FieldSource>(
    source: &S,
    variable: &str,
    time_steps: &[usize],
    domain: DomainRange,
) -> Result<ProfileSeries> {
    let field = source.field(variable, time_steps, domain)?;
    let n_levels = field.len_of(Axis(1));

    let indices: Vec<usize> = (0..field.len_of(Axis(0))).collect();
    let rows = run_over_time(
        |t| nanmean_horizontal(field.index_axis(Axis(0), t)),
        &indices,
    );

    let zc = source.level_coordinate()?;
    let (z0, z1) = domain.resolve_z(zc.len())?;
    ProfileSeries::new(stack_rows(rows, n_levels), zc.subrange(z0, z1))
}

fn check_component_shapes(var: &str, reference: &Array4<f32>, other: &Array4<f32>) -> Result<()> {
    if reference.shape() != other.shape() {
        return Err(BlDiagError::ShapeMismatch {
            var: var.to_string(),
            expected: reference.shape().to_vec(),
            found: other.shape().to_vec(),
        });
    }
    Ok(())
}

fn nan_row(n_levels: usize) -> Array1<f32> {
    Array1::from_elem(n_levels, f32::NAN)
}

fn stack_rows(rows: Vec<Array1<f32>>, n_levels: usize) -> Array2<f32> {
    let mut out = Array2::from_elem((rows.len(), n_levels), f32::NAN);
    for (i, row) in rows.into_iter().enumerate() {
        if row.len() == n_levels {
            out.row_mut(i).assign(&row);
        }
    }
    out
}
