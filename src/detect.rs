//! Boundary-layer height detection
//!
//! Converts a (time × level) quantity series into one boundary height per
//! time step (three for the heat-flux method), using one of four explicitly
//! selected strategies. The detectors are pure functions: no state carries
//! between time steps, and a step where no boundary can be identified is
//! recovered into the sentinel height with a cleared `found` flag rather
//! than aborting the batch.
//!
//! Level-index convention: every detector receives the level coordinates
//! already aligned with the profile columns. Derived quantities whose
//! vertical index is shifted by regridding (TKE, w'θ') are paired with
//! `VerticalLevels::interior()` by the analysis layer, so no per-call-site
//! index offsets appear here.

use crate::errors::{BlDiagError, Result};
use crate::fields::ProfileSeries;
use ndarray::{Array1, ArrayView1};

/// Reserved height denoting "no boundary detected" for a time step.
///
/// Distinguishable from a genuine near-surface boundary through the `found`
/// flags carried alongside every height series.
pub const SENTINEL_HEIGHT: f32 = 0.0;

/// Default offset above the surface potential temperature, in Kelvin
pub const DEFAULT_THETA_OFFSET: f32 = 0.5;

/// Default numeric slack subtracted from the θ + offset limit, in Kelvin
pub const DEFAULT_THETA_SLACK: f32 = 0.01;

/// Default noise floor for the heat-flux sign-transition method
pub const DEFAULT_WTH_NOISE: f32 = 1e-3;

/// Boundary-detection strategy, selected explicitly by the caller
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryMethod {
    /// Highest level whose θ stays below surface θ + offset − slack
    ThetaPlusOffset { offset: f32, slack: f32 },
    /// Height of the upper level of the layer with maximal dθ/dz
    MaxGradient,
    /// Highest level whose value exceeds the threshold
    ThresholdCrossing { threshold: f32 },
    /// Heat-flux sign-transition triple (lower, mid, upper)
    WthBoundary { noise_threshold: f32 },
}

impl BoundaryMethod {
    /// Parse a method name plus optional numeric parameters.
    ///
    /// Established short names (`th_plus05K`, `dthdz`, `threshold`, `wth`)
    /// are accepted as aliases. Anything else is an
    /// [`BlDiagError::InvalidMethod`] error, never a silent fallthrough.
    pub fn parse(name: &str, threshold: Option<f32>, offset: Option<f32>) -> Result<Self> {
        match name {
            "th_plus_offset" | "th_plus05K" => Ok(Self::ThetaPlusOffset {
                offset: offset.unwrap_or(DEFAULT_THETA_OFFSET),
                slack: DEFAULT_THETA_SLACK,
            }),
            "max_gradient" | "dthdz" => Ok(Self::MaxGradient),
            "threshold_crossing" | "threshold" => {
                let threshold = threshold.ok_or_else(|| {
                    BlDiagError::Generic(
                        "threshold_crossing requires --threshold".to_string(),
                    )
                })?;
                Ok(Self::ThresholdCrossing { threshold })
            }
            "wth_boundary" | "wth" => Ok(Self::WthBoundary {
                noise_threshold: threshold.unwrap_or(DEFAULT_WTH_NOISE),
            }),
            other => Err(BlDiagError::InvalidMethod {
                method: other.to_string(),
            }),
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ThetaPlusOffset { .. } => "th_plus_offset",
            Self::MaxGradient => "max_gradient",
            Self::ThresholdCrossing { .. } => "threshold_crossing",
            Self::WthBoundary { .. } => "wth_boundary",
        }
    }
}

/// One boundary height per time step, in meters, with a parallel flag that
/// distinguishes a detected near-surface boundary from the sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundarySeries {
    pub heights: Array1<f32>,
    pub found: Vec<bool>,
}

impl BoundarySeries {
    fn with_capacity(n: usize) -> (Vec<f32>, Vec<bool>) {
        (Vec::with_capacity(n), Vec::with_capacity(n))
    }

    fn from_parts(heights: Vec<f32>, found: Vec<bool>) -> Self {
        Self {
            heights: Array1::from_vec(heights),
            found,
        }
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }
}

/// The three parallel series produced by the heat-flux method
#[derive(Debug, Clone, PartialEq)]
pub struct WthBoundarySeries {
    /// Level just above the first downward (+1 → −1) sign transition
    pub lower: BoundarySeries,
    /// Level of the most negative covariance
    pub mid: BoundarySeries,
    /// Level just above the first upward (−1 → +1) sign transition
    pub upper: BoundarySeries,
}

/// Result of [`detect_boundary`]: a single series, or the heat-flux triple
#[derive(Debug, Clone)]
pub enum BoundaryDetection {
    Single(BoundarySeries),
    Triple(WthBoundarySeries),
}

/// Apply the selected detection strategy to a quantity series.
pub fn detect_boundary(method: BoundaryMethod, series: &ProfileSeries) -> Result<BoundaryDetection> {
    match method {
        BoundaryMethod::ThetaPlusOffset { offset, slack } => {
            theta_plus_offset(series, offset, slack).map(BoundaryDetection::Single)
        }
        BoundaryMethod::MaxGradient => max_gradient(series).map(BoundaryDetection::Single),
        BoundaryMethod::ThresholdCrossing { threshold } => {
            threshold_crossing(series, threshold).map(BoundaryDetection::Single)
        }
        BoundaryMethod::WthBoundary { noise_threshold } => {
            wth_boundary(series, noise_threshold).map(BoundaryDetection::Triple)
        }
    }
}

/// Surface-temperature-relative criterion.
///
/// For each time step, reports the height of the highest level whose θ is
/// still below `θ_surface + offset − slack`. A step with no satisfying level
/// (including an all-NaN profile) yields the sentinel with `found = false`.
pub fn theta_plus_offset(
    series: &ProfileSeries,
    offset: f32,
    slack: f32,
) -> Result<BoundarySeries> {
    require_levels(series, 1)?;
    let (mut heights, mut found) = BoundarySeries::with_capacity(series.num_steps());

    for row in series.data.outer_iter() {
        let surface = row[0];
        let limit = surface + offset - slack;
        // NaN surface or NaN samples fail the comparison and are skipped.
        let hit = (0..row.len()).rev().find(|&k| row[k] < limit);
        match hit {
            Some(k) => {
                heights.push(series.levels.height(k));
                found.push(true);
            }
            None => {
                heights.push(SENTINEL_HEIGHT);
                found.push(false);
            }
        }
    }
    Ok(BoundarySeries::from_parts(heights, found))
}

/// Maximum-gradient criterion.
///
/// The forward difference dθ/dz at index k describes the layer between
/// levels k and k+1; the reported height is the upper level of the maximal
/// layer. Ties break to the first occurrence (stable argmax).
pub fn max_gradient(series: &ProfileSeries) -> Result<BoundarySeries> {
    require_levels(series, 2)?;
    let dz = series.levels.spacing();
    let (mut heights, mut found) = BoundarySeries::with_capacity(series.num_steps());

    for row in series.data.outer_iter() {
        let mut best: Option<(usize, f32)> = None;
        for k in 0..row.len() - 1 {
            let grad = (row[k + 1] - row[k]) / dz[k];
            if grad.is_finite() && best.map_or(true, |(_, g)| grad > g) {
                best = Some((k, grad));
            }
        }
        match best {
            Some((k, _)) => {
                heights.push(series.levels.height(k + 1));
                found.push(true);
            }
            None => {
                heights.push(SENTINEL_HEIGHT);
                found.push(false);
            }
        }
    }
    Ok(BoundarySeries::from_parts(heights, found))
}

/// Threshold-crossing criterion.
///
/// Reports the highest level at which the quantity exceeds the threshold:
/// the top of the layer that ever exceeds it, not its base. A step that
/// never crosses yields the sentinel.
pub fn threshold_crossing(series: &ProfileSeries, threshold: f32) -> Result<BoundarySeries> {
    require_levels(series, 1)?;
    let (mut heights, mut found) = BoundarySeries::with_capacity(series.num_steps());

    for row in series.data.outer_iter() {
        let hit = (0..row.len()).rev().find(|&k| row[k] > threshold);
        match hit {
            Some(k) => {
                heights.push(series.levels.height(k));
                found.push(true);
            }
            None => {
                heights.push(SENTINEL_HEIGHT);
                found.push(false);
            }
        }
    }
    Ok(BoundarySeries::from_parts(heights, found))
}

/// Heat-flux sign-transition criterion, producing (lower, mid, upper).
///
/// Per time step, on the w'θ' profile:
/// 1. if the maximum over all levels is below the noise threshold, all three
///    outputs are the sentinel;
/// 2. lower = level just above the first +1 → −1 sign transition (a −2 step
///    in the consecutive difference of the sign array; exactly 0 counts as
///    sign +1);
/// 3. mid = level of the most negative covariance (stable argmin);
/// 4. upper = level just above the first −1 → +1 (+2) transition;
/// 5. override: if the maximum from the mid level upward stays below the
///    noise threshold, the upper boundary is forced back to the sentinel.
pub fn wth_boundary(series: &ProfileSeries, noise_threshold: f32) -> Result<WthBoundarySeries> {
    require_levels(series, 2)?;
    let n_steps = series.num_steps();
    let (mut lower_h, mut lower_f) = BoundarySeries::with_capacity(n_steps);
    let (mut mid_h, mut mid_f) = BoundarySeries::with_capacity(n_steps);
    let (mut upper_h, mut upper_f) = BoundarySeries::with_capacity(n_steps);

    for row in series.data.outer_iter() {
        let max_all = nanmax(row);
        let min_entry = stable_argmin(row);

        let (max_all, (k_min, _)) = match (max_all, min_entry) {
            (Some(max_all), Some(min_entry)) => (max_all, min_entry),
            // Degenerate (all-NaN) profile: mark the step and move on.
            _ => {
                lower_h.push(SENTINEL_HEIGHT);
                lower_f.push(false);
                mid_h.push(SENTINEL_HEIGHT);
                mid_f.push(false);
                upper_h.push(SENTINEL_HEIGHT);
                upper_f.push(false);
                continue;
            }
        };

        if max_all < noise_threshold {
            // Flux too weak to define a layer anywhere.
            lower_h.push(SENTINEL_HEIGHT);
            lower_f.push(false);
            mid_h.push(SENTINEL_HEIGHT);
            mid_f.push(false);
            upper_h.push(SENTINEL_HEIGHT);
            upper_f.push(false);
            continue;
        }

        // {+1, -1} sign classification; a value of exactly 0 counts as +1,
        // consistently across both transition searches.
        let sign: Vec<i8> = row.iter().map(|&x| if x >= 0.0 { 1 } else { -1 }).collect();

        let mut k_lower = None;
        let mut k_upper = None;
        for k in 0..sign.len() - 1 {
            let step = sign[k + 1] - sign[k];
            if step == -2 && k_lower.is_none() {
                k_lower = Some(k + 1);
            }
            if step == 2 && k_upper.is_none() {
                k_upper = Some(k + 1);
            }
        }

        // No re-entrainment signal above the minimum.
        let max_above_min = nanmax(row.slice(ndarray::s![k_min..]));
        if max_above_min.map_or(true, |m| m < noise_threshold) {
            k_upper = None;
        }

        match k_lower {
            Some(k) => {
                lower_h.push(series.levels.height(k));
                lower_f.push(true);
            }
            None => {
                lower_h.push(SENTINEL_HEIGHT);
                lower_f.push(false);
            }
        }
        mid_h.push(series.levels.height(k_min));
        mid_f.push(true);
        match k_upper {
            Some(k) => {
                upper_h.push(series.levels.height(k));
                upper_f.push(true);
            }
            None => {
                upper_h.push(SENTINEL_HEIGHT);
                upper_f.push(false);
            }
        }
    }

    Ok(WthBoundarySeries {
        lower: BoundarySeries::from_parts(lower_h, lower_f),
        mid: BoundarySeries::from_parts(mid_h, mid_f),
        upper: BoundarySeries::from_parts(upper_h, upper_f),
    })
}

fn require_levels(series: &ProfileSeries, minimum: usize) -> Result<()> {
    if series.num_levels() < minimum {
        return Err(BlDiagError::DegenerateProfile {
            message: format!(
                "profile has {} levels, need at least {}",
                series.num_levels(),
                minimum
            ),
        });
    }
    Ok(())
}

/// Maximum over finite entries, `None` if there are none
fn nanmax(row: ArrayView1<'_, f32>) -> Option<f32> {
    row.iter()
        .copied()
        .filter(|x| x.is_finite())
        .fold(None, |acc, x| Some(acc.map_or(x, |m: f32| m.max(x))))
}

/// First index of the minimum finite entry, `None` if there are none
fn stable_argmin(row: ArrayView1<'_, f32>) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (k, &x) in row.iter().enumerate() {
        if x.is_finite() && best.map_or(true, |(_, m)| x < m) {
            best = Some((k, x));
        }
    }
    best
}
