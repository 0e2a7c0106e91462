//! Grid geometry: vertical level coordinates, domain sub-ranges, and
//! staggered-grid regridding
//!
//! Raw model output lives on an Arakawa-C staggered grid: each velocity or
//! vorticity component is offset by half a grid cell along its own axis
//! relative to the scalar cell centers. The helpers here move such components
//! back onto cell centers with a centered 2-point average and align the
//! resulting arrays on a common index set.

use crate::errors::{BlDiagError, Result};
use ndarray::{Array1, Array3, ArrayView3, Axis, Slice};

/// Vertical level coordinates shared by all derived quantities.
///
/// Heights are stored in meters; the unit is fixed here, at the API boundary,
/// so downstream code never has to guess. Conversion to kilometers happens
/// once, for display.
#[derive(Debug, Clone, PartialEq)]
pub struct VerticalLevels {
    meters: Array1<f32>,
}

impl VerticalLevels {
    /// Create level coordinates from heights in meters.
    ///
    /// The sequence must be non-empty and strictly increasing.
    pub fn from_meters(meters: Array1<f32>) -> Result<Self> {
        if meters.is_empty() {
            return Err(BlDiagError::DegenerateProfile {
                message: "empty vertical level coordinate".to_string(),
            });
        }
        for (lo, hi) in meters.iter().zip(meters.iter().skip(1)) {
            if hi <= lo {
                return Err(BlDiagError::Generic(format!(
                    "vertical levels must increase monotonically, got {} after {}",
                    hi, lo
                )));
            }
        }
        Ok(Self { meters })
    }

    /// Number of levels
    pub fn len(&self) -> usize {
        self.meters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }

    /// Heights in meters
    pub fn meters(&self) -> &Array1<f32> {
        &self.meters
    }

    /// Height of a single level in meters
    pub fn height(&self, index: usize) -> f32 {
        self.meters[index]
    }

    /// Heights in kilometers, for display
    pub fn kilometers(&self) -> Array1<f32> {
        self.meters.mapv(|z| z / 1000.0)
    }

    /// Levels 1..N, aligned with derived quantities whose vertical index is
    /// shifted by one by regridding or trimming (TKE, enstrophy, w'θ').
    pub fn interior(&self) -> Self {
        Self {
            meters: self.meters.slice(ndarray::s![1..]).to_owned(),
        }
    }

    /// Contiguous subset of levels `[start, end)`
    pub fn subrange(&self, start: usize, end: usize) -> Self {
        Self {
            meters: self.meters.slice(ndarray::s![start..end]).to_owned(),
        }
    }

    /// Forward differences Δz between adjacent levels, in meters
    pub fn spacing(&self) -> Array1<f32> {
        let n = self.meters.len();
        &self.meters.slice(ndarray::s![1..n]) - &self.meters.slice(ndarray::s![..n - 1])
    }
}

/// Index sub-range of the (z, y, x) domain; `None` means unbounded on that
/// side. Matches the six-bound convention of the simulation tooling:
/// `(z0, z1, y0, y1, x0, x1)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainRange {
    pub z0: Option<usize>,
    pub z1: Option<usize>,
    pub y0: Option<usize>,
    pub y1: Option<usize>,
    pub x0: Option<usize>,
    pub x1: Option<usize>,
}

impl DomainRange {
    /// The whole domain, unbounded in every direction
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Resolve the optional bounds against a concrete (z, y, x) shape,
    /// validating that every range is non-empty and within the array.
    pub fn resolve(&self, shape: &[usize; 3]) -> Result<[(usize, usize); 3]> {
        let pairs = [
            (self.z0, self.z1, shape[0], "z"),
            (self.y0, self.y1, shape[1], "y"),
            (self.x0, self.x1, shape[2], "x"),
        ];
        let mut out = [(0, 0); 3];
        for (i, (lo, hi, len, name)) in pairs.into_iter().enumerate() {
            let start = lo.unwrap_or(0);
            let end = hi.unwrap_or(len);
            if start >= end || end > len {
                return Err(BlDiagError::InvalidSlice {
                    message: format!(
                        "range {}:{} is invalid for axis '{}' of length {}",
                        start, end, name, len
                    ),
                });
            }
            out[i] = (start, end);
        }
        Ok(out)
    }

    /// Resolve just the vertical bounds against a raw level count
    pub fn resolve_z(&self, num_levels: usize) -> Result<(usize, usize)> {
        let start = self.z0.unwrap_or(0);
        let end = self.z1.unwrap_or(num_levels);
        if start >= end || end > num_levels {
            return Err(BlDiagError::InvalidSlice {
                message: format!(
                    "range {}:{} is invalid for axis 'z' of length {}",
                    start, end, num_levels
                ),
            });
        }
        Ok((start, end))
    }

    /// The same range with the horizontal bounds only, vertical unbounded
    pub fn horizontal_only(&self) -> Self {
        Self {
            z0: None,
            z1: None,
            ..*self
        }
    }
}

/// Centered 2-point average of a staggered component along its own axis,
/// shrinking that axis by one. This is the destaggering step that moves a
/// face value onto the cell center.
pub fn centered_average(component: ArrayView3<'_, f32>, axis: Axis) -> Result<Array3<f32>> {
    let n = component.len_of(axis);
    if n < 2 {
        return Err(BlDiagError::DegenerateProfile {
            message: format!("axis {} has length {}, need at least 2 to regrid", axis.0, n),
        });
    }
    let hi = component.slice_axis(axis, Slice::from(1..n));
    let lo = component.slice_axis(axis, Slice::from(..n - 1));
    Ok((&hi + &lo) / 2.0)
}

/// Destagger a (z, y, x) velocity triple onto a shared cell-centered index
/// set.
///
/// Each component is averaged along its own staggered axis, then trimmed by
/// dropping the first index along the two remaining axes so that all three
/// outputs share the shape (nz-1, ny-1, nx-1). The inputs must share one
/// stored shape (the staggering is implied by the archive layout).
pub fn center_velocity_triple(
    u: ArrayView3<'_, f32>,
    v: ArrayView3<'_, f32>,
    w: ArrayView3<'_, f32>,
) -> Result<(Array3<f32>, Array3<f32>, Array3<f32>)> {
    if u.shape() != v.shape() || u.shape() != w.shape() {
        return Err(BlDiagError::ShapeMismatch {
            var: "u/v/w".to_string(),
            expected: u.shape().to_vec(),
            found: if u.shape() != v.shape() {
                v.shape().to_vec()
            } else {
                w.shape().to_vec()
            },
        });
    }

    let u_c = centered_average(u, Axis(2))?;
    let v_c = centered_average(v, Axis(1))?;
    let w_c = centered_average(w, Axis(0))?;

    let u_c = u_c.slice(ndarray::s![1.., 1.., ..]).to_owned();
    let v_c = v_c.slice(ndarray::s![1.., .., 1..]).to_owned();
    let w_c = w_c.slice(ndarray::s![.., 1.., 1..]).to_owned();

    debug_assert_eq!(u_c.shape(), v_c.shape());
    debug_assert_eq!(u_c.shape(), w_c.shape());

    Ok((u_c, v_c, w_c))
}
