//! Derivation of cell-centered turbulence quantities from staggered raw
//! fields
//!
//! Each function here works on a single time step in (z, y, x) layout and
//! produces a domain-mean vertical profile. Batching over time and fetching
//! through a [`crate::source::FieldSource`] happens in [`crate::analysis`].
//!
//! Horizontal averages ignore NaN samples throughout; a level with no finite
//! sample yields NaN rather than poisoning the whole profile.

use crate::errors::{BlDiagError, Result};
use crate::grid::{center_velocity_triple, centered_average, DomainRange, VerticalLevels};
use ndarray::{Array1, Array2, ArrayView2, ArrayView3, Axis};

/// A derived quantity as a (time × level) array together with the level
/// coordinates its rows are aligned with.
#[derive(Debug, Clone)]
pub struct ProfileSeries {
    /// One row per time step, one column per level
    pub data: Array2<f32>,
    /// Height of each column, aligned with the data
    pub levels: VerticalLevels,
}

impl ProfileSeries {
    pub fn new(data: Array2<f32>, levels: VerticalLevels) -> Result<Self> {
        if data.len_of(Axis(1)) != levels.len() {
            return Err(BlDiagError::Generic(format!(
                "profile has {} levels but coordinate has {}",
                data.len_of(Axis(1)),
                levels.len()
            )));
        }
        Ok(Self { data, levels })
    }

    pub fn num_steps(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn num_levels(&self) -> usize {
        self.data.len_of(Axis(1))
    }
}

/// Which horizontal domain the w'θ' perturbation means are taken over.
///
/// The two policies differ whenever a sub-domain is analyzed; the choice is
/// an explicit option rather than an implicit default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerturbationReference {
    /// Mean removed over the same sub-domain as the analysis window
    AnalysisDomain,
    /// Mean removed over the full horizontal domain, irrespective of the
    /// requested sub-range
    FullDomain,
}

/// NaN-ignoring mean over the horizontal (y, x) axes, one value per level
pub fn nanmean_horizontal(field: ArrayView3<'_, f32>) -> Array1<f32> {
    Array1::from_iter(field.outer_iter().map(|plane| nanmean_plane(plane, None)))
}

/// NaN-ignoring mean over a 2D plane, optionally restricted to a (y, x)
/// index window
fn nanmean_plane(plane: ArrayView2<'_, f32>, window: Option<[(usize, usize); 2]>) -> f32 {
    let view = match window {
        Some([(y0, y1), (x0, x1)]) => plane.slice(ndarray::s![y0..y1, x0..x1]),
        None => plane.view(),
    };
    let mut sum = 0.0_f64;
    let mut count = 0_usize;
    for &x in view.iter() {
        if x.is_finite() {
            sum += f64::from(x);
            count += 1;
        }
    }
    if count > 0 {
        (sum / count as f64) as f32
    } else {
        f32::NAN
    }
}

/// Turbulent kinetic energy profile for one time step.
///
/// The three staggered velocity components are moved onto a shared
/// cell-centered index set (see [`center_velocity_triple`]), squared, summed,
/// and horizontally averaged. The conventional 0.5 factor is omitted; only
/// relative magnitudes matter for detection. The profile has nz-1 rows aligned with
/// `levels.interior()` of the requested vertical range.
pub fn tke_profile_step(
    u: ArrayView3<'_, f32>,
    v: ArrayView3<'_, f32>,
    w: ArrayView3<'_, f32>,
) -> Result<Array1<f32>> {
    let (u_c, v_c, w_c) = center_velocity_triple(u, v, w)?;
    let tke = &u_c * &u_c + &v_c * &v_c + &w_c * &w_c;
    Ok(nanmean_horizontal(tke.view()))
}

/// Enstrophy profile for one time step: horizontally averaged sum of squared
/// vorticity components. The components are cell-value arrays of identical
/// shape; the profile keeps the full vertical range.
pub fn enstrophy_profile_step(
    xi: ArrayView3<'_, f32>,
    eta: ArrayView3<'_, f32>,
    zeta: ArrayView3<'_, f32>,
) -> Result<Array1<f32>> {
    if xi.shape() != eta.shape() {
        return Err(BlDiagError::ShapeMismatch {
            var: "eta".to_string(),
            expected: xi.shape().to_vec(),
            found: eta.shape().to_vec(),
        });
    }
    if xi.shape() != zeta.shape() {
        return Err(BlDiagError::ShapeMismatch {
            var: "zeta".to_string(),
            expected: xi.shape().to_vec(),
            found: zeta.shape().to_vec(),
        });
    }
    let ens = &xi * &xi + &eta * &eta + &zeta * &zeta;
    Ok(nanmean_horizontal(ens.view()))
}

/// Vertical heat-flux covariance w'θ' profile for one time step.
///
/// `w` and `theta` carry the full horizontal domain with the vertical range
/// already applied; `domain` supplies the horizontal analysis window. The
/// vertical velocity is regridded to the scalar levels with a centered
/// average between adjacent raw levels, which shifts the vertical index by
/// one: the result aligns with theta levels 1..N, i.e. `levels.interior()`.
///
/// Perturbations are taken against the horizontal mean per level, over either
/// the analysis window or the full domain depending on `reference`.
pub fn heat_flux_profile_step(
    w: ArrayView3<'_, f32>,
    theta: ArrayView3<'_, f32>,
    domain: DomainRange,
    reference: PerturbationReference,
) -> Result<Array1<f32>> {
    if w.shape() != theta.shape() {
        return Err(BlDiagError::ShapeMismatch {
            var: "w/th".to_string(),
            expected: w.shape().to_vec(),
            found: theta.shape().to_vec(),
        });
    }

    let w_c = centered_average(w, Axis(0))?;
    let th_c = theta.slice(ndarray::s![1.., .., ..]);

    let shape = [
        w_c.len_of(Axis(0)),
        w_c.len_of(Axis(1)),
        w_c.len_of(Axis(2)),
    ];
    let [_, (y0, y1), (x0, x1)] = domain.resolve(&shape)?;
    let window = [(y0, y1), (x0, x1)];

    let mut flux = Array1::<f32>::zeros(shape[0]);
    for k in 0..shape[0] {
        let w_plane = w_c.index_axis(Axis(0), k);
        let th_plane = th_c.index_axis(Axis(0), k);

        let (w_mean, th_mean) = match reference {
            PerturbationReference::AnalysisDomain => (
                nanmean_plane(w_plane, Some(window)),
                nanmean_plane(th_plane, Some(window)),
            ),
            PerturbationReference::FullDomain => {
                (nanmean_plane(w_plane, None), nanmean_plane(th_plane, None))
            }
        };

        let mut sum = 0.0_f64;
        let mut count = 0_usize;
        for j in y0..y1 {
            for i in x0..x1 {
                let wp = w_plane[[j, i]] - w_mean;
                let tp = th_plane[[j, i]] - th_mean;
                let product = wp * tp;
                if product.is_finite() {
                    sum += f64::from(product);
                    count += 1;
                }
            }
        }
        flux[k] = if count > 0 {
            (sum / count as f64) as f32
        } else {
            f32::NAN
        };
    }
    Ok(flux)
}
