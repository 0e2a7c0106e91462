//! Unit tests for the bl_diag derivation and detection core
//!
//! These tests exercise the staggered-grid regridding, the four
//! boundary-detection strategies with their tie-break and sentinel
//! conventions, and the batch layer against an in-memory field source.

use bl_diag::{
    analysis::{compute_enstrophy, compute_tke, domain_mean_profile},
    detect::{
        detect_boundary, max_gradient, theta_plus_offset, threshold_crossing, wth_boundary,
        BoundaryDetection, BoundaryMethod, SENTINEL_HEIGHT,
    },
    errors::{BlDiagError, Result},
    fields::{
        heat_flux_profile_step, tke_profile_step, PerturbationReference, ProfileSeries,
    },
    grid::{center_velocity_triple, centered_average, DomainRange, VerticalLevels},
    parallel::{get_parallel_info, run_over_time, ParallelConfig},
    source::FieldSource,
};
use ndarray::{arr1, arr2, Array1, Array2, Array3, Array4, Axis, ShapeBuilder};
use std::collections::HashMap;

/// In-memory field source used to test the batch layer without touching
/// files.
struct ArraySource {
    fields: HashMap<String, Array4<f32>>,
    levels: VerticalLevels,
}

impl ArraySource {
    fn new(levels: Array1<f32>) -> Self {
        Self {
            fields: HashMap::new(),
            levels: VerticalLevels::from_meters(levels).expect("valid levels"),
        }
    }

    fn with(mut self, name: &str, data: Array4<f32>) -> Self {
        self.fields.insert(name.to_string(), data);
        self
    }
}

impl FieldSource for ArraySource {
    fn field(
        &self,
        name: &str,
        time_steps: &[usize],
        domain: DomainRange,
    ) -> Result<Array4<f32>> {
        let arr = self
            .fields
            .get(name)
            .ok_or_else(|| BlDiagError::VariableNotFound {
                var: name.to_string(),
            })?;
        let picked = arr.select(Axis(0), time_steps);
        let shape = [
            arr.len_of(Axis(1)),
            arr.len_of(Axis(2)),
            arr.len_of(Axis(3)),
        ];
        let [(z0, z1), (y0, y1), (x0, x1)] = domain.resolve(&shape)?;
        Ok(picked
            .slice(ndarray::s![.., z0..z1, y0..y1, x0..x1])
            .to_owned())
    }

    fn level_coordinate(&self) -> Result<VerticalLevels> {
        Ok(self.levels.clone())
    }

    fn has_variable(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

fn levels(heights: &[f32]) -> VerticalLevels {
    VerticalLevels::from_meters(Array1::from_vec(heights.to_vec())).expect("valid levels")
}

fn series_from_rows(rows: &[&[f32]], zc: &VerticalLevels) -> ProfileSeries {
    let n_levels = rows[0].len();
    let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    let data = Array2::from_shape_vec((rows.len(), n_levels), flat).expect("rectangular rows");
    ProfileSeries::new(data, zc.clone()).expect("aligned levels")
}

#[test]
fn test_error_types() {
    let shape_err = BlDiagError::ShapeMismatch {
        var: "eta".to_string(),
        expected: vec![2, 3, 4],
        found: vec![2, 3, 5],
    };
    assert!(format!("{}", shape_err).contains("Shape mismatch for variable 'eta'"));

    let method_err = BlDiagError::InvalidMethod {
        method: "bogus".to_string(),
    };
    assert!(format!("{}", method_err).contains("Unknown boundary-detection method 'bogus'"));

    let var_err = BlDiagError::VariableNotFound {
        var: "th".to_string(),
    };
    assert!(format!("{}", var_err).contains("Variable 'th' not found"));
}

#[test]
fn test_parallel_config() {
    let default_config = ParallelConfig::new_default();
    assert!(default_config.num_threads.is_none());

    let config_4 = ParallelConfig::with_threads(4);
    assert_eq!(config_4.num_threads, Some(4));

    let all_cores_config = ParallelConfig::all_cores();
    assert!(all_cores_config.num_threads.unwrap() > 0);

    assert!(default_config.current_threads() > 0);

    let info = get_parallel_info();
    assert!(info.current_threads > 0);
    assert!(info.available_cores > 0);
}

#[test]
fn test_vertical_levels() {
    assert!(VerticalLevels::from_meters(arr1(&[0.0, 40.0, 30.0])).is_err());
    assert!(VerticalLevels::from_meters(arr1(&[])).is_err());

    // Monotonicity is enforced for non-contiguous arrays too: strided
    // storage picks out [0, 40, 30].
    let strided = Array1::from_shape_vec(
        (3,).strides((2,)),
        vec![0.0_f32, 1.0, 40.0, 1.0, 30.0],
    )
    .unwrap();
    assert!(strided.as_slice().is_none());
    assert!(VerticalLevels::from_meters(strided).is_err());

    let zc = levels(&[0.0, 40.0, 80.0, 120.0]);
    assert_eq!(zc.len(), 4);
    assert_eq!(zc.interior().height(0), 40.0);
    assert_eq!(zc.interior().len(), 3);
    assert_eq!(zc.kilometers()[3], 0.12);
    assert_eq!(zc.spacing(), arr1(&[40.0, 40.0, 40.0]));
    assert_eq!(zc.subrange(1, 3).meters(), &arr1(&[40.0, 80.0]));
}

#[test]
fn test_domain_range() {
    let range = DomainRange {
        x0: Some(0),
        x1: Some(2),
        ..DomainRange::unbounded()
    };
    assert_eq!(
        range.resolve(&[4, 4, 4]).unwrap(),
        [(0, 4), (0, 4), (0, 2)]
    );
    assert_eq!(range.resolve_z(4).unwrap(), (0, 4));
    assert!(range.horizontal_only().z0.is_none());

    let empty = DomainRange {
        z0: Some(3),
        z1: Some(3),
        ..DomainRange::unbounded()
    };
    assert!(empty.resolve(&[4, 4, 4]).is_err());

    let out_of_range = DomainRange {
        y1: Some(9),
        ..DomainRange::unbounded()
    };
    assert!(out_of_range.resolve(&[4, 4, 4]).is_err());
}

#[test]
fn test_centered_average_and_velocity_triple() {
    let ramp = Array3::<f32>::from_shape_fn((3, 4, 5), |(k, _, _)| k as f32);
    let avg = centered_average(ramp.view(), Axis(0)).unwrap();
    assert_eq!(avg.shape(), &[2, 4, 5]);
    assert_eq!(avg[[0, 0, 0]], 0.5);
    assert_eq!(avg[[1, 3, 4]], 1.5);

    let u = Array3::<f32>::ones((4, 5, 6));
    let v = Array3::<f32>::ones((4, 5, 6));
    let w = Array3::<f32>::ones((4, 5, 6));
    let (u_c, v_c, w_c) = center_velocity_triple(u.view(), v.view(), w.view()).unwrap();
    assert_eq!(u_c.shape(), &[3, 4, 5]);
    assert_eq!(v_c.shape(), &[3, 4, 5]);
    assert_eq!(w_c.shape(), &[3, 4, 5]);

    let bad = Array3::<f32>::ones((4, 5, 7));
    assert!(center_velocity_triple(u.view(), bad.view(), w.view()).is_err());
}

#[test]
fn test_tke_profile_step() {
    // Uniform wind of 2 m/s in each component: TKE = 3 * 2^2 = 12 at every
    // cell, NaN-free.
    let u = Array3::<f32>::from_elem((4, 4, 4), 2.0);
    let profile = tke_profile_step(u.view(), u.view(), u.view()).unwrap();
    assert_eq!(profile.len(), 3);
    for &v in profile.iter() {
        assert_eq!(v, 12.0);
    }

    // NaN samples are ignored by the horizontal mean.
    let mut w = u.clone();
    w[[1, 1, 1]] = f32::NAN;
    let profile = tke_profile_step(u.view(), u.view(), w.view()).unwrap();
    assert!(profile.iter().all(|v| v.is_finite() && *v >= 0.0));
}

#[test]
fn test_tke_batch_length_and_nonnegativity() {
    let nt = 6;
    let data = Array4::<f32>::from_shape_fn((nt, 4, 4, 4), |(t, k, j, i)| {
        0.1 * (t as f32 + 1.0) * (1.0 + (k + j + i) as f32)
    });
    let source = ArraySource::new(arr1(&[0.0, 40.0, 80.0, 120.0]))
        .with("u", data.clone())
        .with("v", data.clone())
        .with("w", data);

    let steps: Vec<usize> = (0..nt).collect();
    let tke = compute_tke(&source, &steps, DomainRange::unbounded()).unwrap();
    assert_eq!(tke.num_steps(), nt);
    assert_eq!(tke.num_levels(), 3);
    assert_eq!(tke.levels.meters(), &arr1(&[40.0, 80.0, 120.0]));
    assert!(tke.data.iter().all(|v| *v >= 0.0));
}

#[test]
fn test_batch_recovers_degenerate_step() {
    // Step 1 is entirely NaN: its row comes back as NaN while the
    // neighboring steps keep their values and the batch never aborts.
    let nt = 3;
    let mut data = Array4::<f32>::from_elem((nt, 4, 4, 4), 2.0);
    data.index_axis_mut(Axis(0), 1).fill(f32::NAN);
    let source = ArraySource::new(arr1(&[0.0, 40.0, 80.0, 120.0]))
        .with("u", data.clone())
        .with("v", data.clone())
        .with("w", data);

    let steps: Vec<usize> = (0..nt).collect();
    let tke = compute_tke(&source, &steps, DomainRange::unbounded()).unwrap();
    assert_eq!(tke.num_steps(), nt);
    for &v in tke.data.row(0).iter() {
        assert_eq!(v, 12.0);
    }
    assert!(tke.data.row(1).iter().all(|v| v.is_nan()));
    for &v in tke.data.row(2).iter() {
        assert_eq!(v, 12.0);
    }
}

#[test]
fn test_enstrophy_alternate_identifier_fallback() {
    let nt = 2;
    let good = Array4::<f32>::from_elem((nt, 3, 4, 4), 0.5);
    let misshaped = Array4::<f32>::from_elem((nt, 3, 4, 5), 0.5);

    // eta has the wrong shape but eta_2 matches: the fallback must engage.
    let source = ArraySource::new(arr1(&[0.0, 40.0, 80.0]))
        .with("xi", good.clone())
        .with("eta", misshaped.clone())
        .with("eta_2", good.clone())
        .with("zeta", good.clone());
    let steps: Vec<usize> = (0..nt).collect();
    let ens = compute_enstrophy(&source, &steps, DomainRange::unbounded()).unwrap();
    assert_eq!(ens.num_steps(), nt);
    assert_eq!(ens.num_levels(), 3);
    // 3 * 0.5^2 everywhere
    for &v in ens.data.iter() {
        assert!((v - 0.75).abs() < 1e-6);
    }

    // Without eta_2 the mismatch is fatal.
    let source = ArraySource::new(arr1(&[0.0, 40.0, 80.0]))
        .with("xi", good.clone())
        .with("eta", misshaped)
        .with("zeta", good);
    let result = compute_enstrophy(&source, &steps, DomainRange::unbounded());
    match result {
        Err(BlDiagError::ShapeMismatch { var, .. }) => assert_eq!(var, "eta"),
        other => panic!("Expected ShapeMismatch, got {:?}", other.map(|s| s.data)),
    }
}

#[test]
fn test_heat_flux_perturbation_reference_variants() {
    // Two raw levels collapse to one centered level; the window covers the
    // left half of the x axis.
    let mut w = Array3::<f32>::zeros((2, 1, 4));
    let mut th = Array3::<f32>::zeros((2, 1, 4));
    for i in 0..4 {
        w[[0, 0, i]] = (i + 1) as f32;
        w[[1, 0, i]] = (i + 1) as f32;
        th[[1, 0, i]] = if i < 2 { 10.0 } else { 20.0 };
    }
    let window = DomainRange {
        x0: Some(0),
        x1: Some(2),
        ..DomainRange::unbounded()
    };

    // Window mean: w' and th' are centered inside the window, flux vanishes.
    let flux = heat_flux_profile_step(
        w.view(),
        th.view(),
        window,
        PerturbationReference::AnalysisDomain,
    )
    .unwrap();
    assert_eq!(flux.len(), 1);
    assert!(flux[0].abs() < 1e-6);

    // Full-domain mean: w_mean = 2.5, th_mean = 15 over all x, so the
    // window sees ( -1.5 * -5 + -0.5 * -5 ) / 2 = 5.
    let flux = heat_flux_profile_step(
        w.view(),
        th.view(),
        window,
        PerturbationReference::FullDomain,
    )
    .unwrap();
    assert!((flux[0] - 5.0).abs() < 1e-6);
}

#[test]
fn test_threshold_crossing() {
    let zc = levels(&[0.0, 100.0, 200.0, 300.0, 400.0, 500.0, 600.0]);
    let series = series_from_rows(
        &[
            // Crosses the threshold only at level 5
            &[0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            // Never crosses
            &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            // Exceeds at levels 1 and 3: the top of the layer wins
            &[0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0],
        ],
        &zc,
    );

    let result = threshold_crossing(&series, 0.5).unwrap();
    assert_eq!(result.heights[0], 500.0);
    assert!(result.found[0]);
    assert_eq!(result.heights[1], SENTINEL_HEIGHT);
    assert!(!result.found[1]);
    assert_eq!(result.heights[2], 300.0);
    assert!(result.found[2]);
}

#[test]
fn test_max_gradient() {
    let zc = levels(&[0.0, 100.0, 200.0, 300.0, 400.0, 500.0]);
    // Gently increasing profile with one large jump between levels 3 and 4:
    // the reported height is the upper level of that layer.
    let series = series_from_rows(&[&[300.0, 300.1, 300.2, 300.3, 302.0, 302.1]], &zc);
    let result = max_gradient(&series).unwrap();
    assert_eq!(result.heights[0], 400.0);
    assert!(result.found[0]);

    // Tied gradients break to the first occurrence.
    let tied = series_from_rows(&[&[300.0, 301.0, 302.0, 303.0, 304.0, 305.0]], &zc);
    let result = max_gradient(&tied).unwrap();
    assert_eq!(result.heights[0], 100.0);
}

#[test]
fn test_theta_plus_offset() {
    let zc = levels(&[
        0.0, 100.0, 200.0, 300.0, 400.0, 500.0, 600.0, 700.0, 800.0, 900.0,
    ]);
    // Constant 300 K with a +0.6 K step at level 7: level 6 is the last one
    // below the 300.5 - 0.01 K band.
    let mut row = [300.0_f32; 10];
    for v in row.iter_mut().skip(7) {
        *v = 300.6;
    }
    let series = series_from_rows(&[&row], &zc);
    let result = theta_plus_offset(&series, 0.5, 0.01).unwrap();
    assert_eq!(result.heights[0], 600.0);
    assert!(result.found[0]);

    // An all-NaN step is recovered into the sentinel, not a crash.
    let nan_row = [f32::NAN; 10];
    let series = series_from_rows(&[&nan_row], &zc);
    let result = theta_plus_offset(&series, 0.5, 0.01).unwrap();
    assert_eq!(result.heights[0], SENTINEL_HEIGHT);
    assert!(!result.found[0]);
}

#[test]
fn test_wth_boundary_with_override() {
    let zc = levels(&[100.0, 200.0, 300.0, 400.0, 500.0, 600.0]);
    let series = series_from_rows(&[&[-0.01, -0.01, 0.02, 0.03, -0.02, -0.01]], &zc);

    let result = wth_boundary(&series, 1e-3).unwrap();
    // Sign array [-1,-1,1,1,-1,-1]: the -2 step sits between rows 3 and 4,
    // the level just above it is row 4.
    assert_eq!(result.lower.heights[0], 500.0);
    assert!(result.lower.found[0]);
    // Most negative value at row 4
    assert_eq!(result.mid.heights[0], 500.0);
    assert!(result.mid.found[0]);
    // Everything from the minimum upward stays below the noise floor, so
    // the upper boundary is overridden to the sentinel.
    assert_eq!(result.upper.heights[0], SENTINEL_HEIGHT);
    assert!(!result.upper.found[0]);
}

#[test]
fn test_wth_boundary_without_override() {
    let zc = levels(&[100.0, 200.0, 300.0, 400.0, 500.0, 600.0]);
    // Re-entrainment above the minimum stays above the noise floor here.
    let series = series_from_rows(&[&[-0.01, 0.05, -0.04, 0.02, 0.01, 0.0]], &zc);

    let result = wth_boundary(&series, 1e-3).unwrap();
    assert_eq!(result.lower.heights[0], 300.0);
    assert!(result.lower.found[0]);
    assert_eq!(result.mid.heights[0], 300.0);
    assert_eq!(result.upper.heights[0], 200.0);
    assert!(result.upper.found[0]);
}

#[test]
fn test_wth_boundary_weak_flux_sentinels() {
    let zc = levels(&[100.0, 200.0, 300.0]);
    let series = series_from_rows(&[&[1e-5, -1e-5, 1e-6]], &zc);
    let result = wth_boundary(&series, 1e-3).unwrap();
    for series in [&result.lower, &result.mid, &result.upper] {
        assert_eq!(series.heights[0], SENTINEL_HEIGHT);
        assert!(!series.found[0]);
    }
}

#[test]
fn test_method_parsing_and_dispatch() {
    assert!(matches!(
        BoundaryMethod::parse("th_plus_offset", None, None).unwrap(),
        BoundaryMethod::ThetaPlusOffset { .. }
    ));
    assert!(matches!(
        BoundaryMethod::parse("dthdz", None, None).unwrap(),
        BoundaryMethod::MaxGradient
    ));
    assert!(matches!(
        BoundaryMethod::parse("threshold", Some(0.08), None).unwrap(),
        BoundaryMethod::ThresholdCrossing { .. }
    ));
    assert!(matches!(
        BoundaryMethod::parse("wth", None, None).unwrap(),
        BoundaryMethod::WthBoundary { .. }
    ));

    // threshold_crossing without a threshold is a configuration error
    assert!(BoundaryMethod::parse("threshold_crossing", None, None).is_err());

    match BoundaryMethod::parse("magic", None, None) {
        Err(BlDiagError::InvalidMethod { method }) => assert_eq!(method, "magic"),
        other => panic!("Expected InvalidMethod, got {:?}", other),
    }

    let zc = levels(&[0.0, 100.0, 200.0]);
    let series = series_from_rows(&[&[0.0, 1.0, 0.0]], &zc);
    let detection =
        detect_boundary(BoundaryMethod::ThresholdCrossing { threshold: 0.5 }, &series).unwrap();
    match detection {
        BoundaryDetection::Single(s) => assert_eq!(s.heights[0], 100.0),
        BoundaryDetection::Triple(_) => panic!("Expected a single series"),
    }
}

#[test]
fn test_detector_idempotence() {
    let zc = levels(&[100.0, 200.0, 300.0, 400.0, 500.0, 600.0]);
    let series = series_from_rows(
        &[
            &[-0.01, -0.01, 0.02, 0.03, -0.02, -0.01],
            &[0.1, 0.2, 0.05, -0.01, 0.0, 0.0],
        ],
        &zc,
    );

    let first = wth_boundary(&series, 1e-3).unwrap();
    let second = wth_boundary(&series, 1e-3).unwrap();
    assert_eq!(first, second);

    let first = threshold_crossing(&series, 0.05).unwrap();
    let second = threshold_crossing(&series, 0.05).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_batch_chunking_invariance() {
    // Splitting 100 steps into 4 chunks of 25 and concatenating must match
    // the sequential run exactly.
    let nt = 100;
    let data = Array4::<f32>::from_shape_fn((nt, 4, 3, 3), |(t, k, j, i)| {
        ((t * 7 + k * 5 + j * 3 + i) % 13) as f32 * 0.25
    });
    let source = ArraySource::new(arr1(&[0.0, 40.0, 80.0, 120.0]))
        .with("u", data.clone())
        .with("v", data.clone())
        .with("w", data);

    let all_steps: Vec<usize> = (0..nt).collect();
    let sequential = compute_tke(&source, &all_steps, DomainRange::unbounded()).unwrap();

    let mut chunked_rows: Vec<Array2<f32>> = Vec::new();
    for chunk in all_steps.chunks(25) {
        let part = compute_tke(&source, chunk, DomainRange::unbounded()).unwrap();
        chunked_rows.push(part.data);
    }
    let views: Vec<_> = chunked_rows.iter().map(|a| a.view()).collect();
    let concatenated = ndarray::concatenate(Axis(0), &views).unwrap();

    assert_eq!(sequential.data, concatenated);
}

#[test]
fn test_run_over_time_preserves_order() {
    let steps: Vec<usize> = (0..64).collect();
    let doubled = run_over_time(|t| t * 2, &steps);
    assert_eq!(doubled, steps.iter().map(|t| t * 2).collect::<Vec<_>>());
}

#[test]
fn test_domain_mean_profile() {
    let nt = 2;
    let data = Array4::<f32>::from_shape_fn((nt, 3, 2, 2), |(t, k, _, _)| {
        300.0 + k as f32 + t as f32 * 0.1
    });
    let source = ArraySource::new(arr1(&[0.0, 40.0, 80.0])).with("th", data);

    let steps: Vec<usize> = (0..nt).collect();
    let profile = domain_mean_profile(&source, "th", &steps, DomainRange::unbounded()).unwrap();
    assert_eq!(profile.data, arr2(&[[300.0, 301.0, 302.0], [300.1, 301.1, 302.1]]));
    assert_eq!(profile.levels.meters(), &arr1(&[0.0, 40.0, 80.0]));
}
