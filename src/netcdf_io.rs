//! NetCDF-backed field source and result writing
//!
//! [`NetcdfFieldSource`] adapts a NetCDF archive to the [`FieldSource`]
//! trait consumed by the analysis layer: raw variables are stored as
//! (time, z, y, x) arrays, the vertical coordinate as a 1D variable
//! (`zc` by default). [`DiagnosticsWriter`] persists computed series to new
//! NetCDF files with a history attribute.

use crate::detect::{BoundarySeries, WthBoundarySeries};
use crate::errors::{BlDiagError, Result};
use crate::fields::ProfileSeries;
use crate::grid::{DomainRange, VerticalLevels};
use crate::source::FieldSource;
use chrono::Utc;
use ndarray::{Array1, Array3, Array4, Axis};
use netcdf::{create, AttributeValue, File};
use std::{fs, path::Path};

/// Field source reading from a single NetCDF file
pub struct NetcdfFieldSource {
    file: File,
    level_variable: String,
}

impl NetcdfFieldSource {
    /// Open an archive file; the vertical coordinate is expected under `zc`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = netcdf::open(path.as_ref())?;
        Ok(Self {
            file,
            level_variable: "zc".to_string(),
        })
    }

    /// Use a different variable name for the vertical coordinate
    pub fn with_level_variable(mut self, name: &str) -> Self {
        self.level_variable = name.to_string();
        self
    }

    /// Access the underlying file, e.g. for metadata listing
    pub fn file(&self) -> &File {
        &self.file
    }
}

impl FieldSource for NetcdfFieldSource {
    fn field(
        &self,
        name: &str,
        time_steps: &[usize],
        domain: DomainRange,
    ) -> Result<Array4<f32>> {
        let var = self
            .file
            .variable(name)
            .ok_or_else(|| BlDiagError::VariableNotFound {
                var: name.to_string(),
            })?;

        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        if shape.len() != 4 {
            return Err(BlDiagError::Generic(format!(
                "variable '{}' has {} dimensions, expected (time, z, y, x)",
                name,
                shape.len()
            )));
        }

        for &t in time_steps {
            if t >= shape[0] {
                return Err(BlDiagError::InvalidSlice {
                    message: format!(
                        "time step {} out of range for variable '{}' with {} steps",
                        t, name, shape[0]
                    ),
                });
            }
        }

        let [(z0, z1), (y0, y1), (x0, x1)] = domain.resolve(&[shape[1], shape[2], shape[3]])?;
        let (nz, ny, nx) = (z1 - z0, y1 - y0, x1 - x0);

        // Hyperslab read per requested step: only the selected extent is
        // pulled from disk, never the whole variable.
        let mut out = Array4::<f32>::zeros((time_steps.len(), nz, ny, nx));
        for (row, &t) in time_steps.iter().enumerate() {
            let values =
                var.get_values::<f32, _>((t..t + 1, z0..z1, y0..y1, x0..x1))?;
            let step = Array3::from_shape_vec((nz, ny, nx), values)?;
            out.index_axis_mut(Axis(0), row).assign(&step);
        }
        Ok(out)
    }

    fn level_coordinate(&self) -> Result<VerticalLevels> {
        let var = self
            .file
            .variable(&self.level_variable)
            .ok_or_else(|| BlDiagError::VariableNotFound {
                var: self.level_variable.clone(),
            })?;

        let mut zc = Array1::from_vec(var.get_values::<f32, _>(..)?);

        // The unit is fixed here, at the API boundary: everything downstream
        // works in meters.
        if let Some(attr) = var.attribute("units") {
            if let Ok(AttributeValue::Str(unit)) = attr.value() {
                if unit.trim() == "km" {
                    zc.mapv_inplace(|z| z * 1000.0);
                }
            }
        }

        VerticalLevels::from_meters(zc)
    }

    fn has_variable(&self, name: &str) -> bool {
        self.file.variable(name).is_some()
    }
}

/// Writer persisting computed series to a new NetCDF file
pub struct DiagnosticsWriter<'a> {
    output_path: &'a Path,
}

impl<'a> DiagnosticsWriter<'a> {
    pub fn new(output_path: &'a Path) -> Self {
        Self { output_path }
    }

    fn create_file(&self) -> Result<netcdf::FileMut> {
        if self.output_path.exists() {
            fs::remove_file(self.output_path)?;
        }
        let mut file = create(self.output_path)?;
        file.add_attribute(
            "history",
            format!("Created by bl_diag on {}", Utc::now().to_rfc3339()),
        )?;
        Ok(file)
    }

    /// Write a single boundary-height series with its found flags
    pub fn write_boundary_series(&self, name: &str, series: &BoundarySeries) -> Result<()> {
        let mut file = self.create_file()?;
        file.add_dimension("time", series.len())?;
        Self::put_boundary(&mut file, name, series)?;
        Ok(())
    }

    /// Write the heat-flux boundary triple (lower, mid, upper)
    pub fn write_wth_series(&self, series: &WthBoundarySeries) -> Result<()> {
        let mut file = self.create_file()?;
        file.add_dimension("time", series.lower.len())?;
        Self::put_boundary(&mut file, "blh_wth_lower", &series.lower)?;
        Self::put_boundary(&mut file, "blh_wth_mid", &series.mid)?;
        Self::put_boundary(&mut file, "blh_wth_upper", &series.upper)?;
        Ok(())
    }

    /// Write a (time × level) quantity series together with its level
    /// coordinate
    pub fn write_profile_series(&self, name: &str, series: &ProfileSeries) -> Result<()> {
        let mut file = self.create_file()?;
        file.add_dimension("time", series.num_steps())?;
        file.add_dimension("level", series.num_levels())?;

        let mut zc_var = file.add_variable::<f32>("zc", &["level"])?;
        zc_var.put_attribute("units", "m")?;
        zc_var.put(series.levels.meters().view(), ..)?;

        let mut var = file.add_variable::<f32>(name, &["time", "level"])?;
        var.put(series.data.view(), ..)?;
        Ok(())
    }

    fn put_boundary(file: &mut netcdf::FileMut, name: &str, series: &BoundarySeries) -> Result<()> {
        let mut var = file.add_variable::<f32>(name, &["time"])?;
        var.put_attribute("units", "m")?;
        var.put_attribute("comment", "0 with found flag unset means no boundary detected")?;
        var.put(series.heights.view(), ..)?;

        let flags: Array1<u8> = series.found.iter().map(|&f| u8::from(f)).collect();
        let mut flag_var = file.add_variable::<u8>(&format!("{}_found", name), &["time"])?;
        flag_var.put(flags.view(), ..)?;
        Ok(())
    }
}
