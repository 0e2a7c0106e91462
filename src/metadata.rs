//! Archive inspection helpers
//!
//! Listing of dimensions and variables of an opened simulation archive, used
//! by the CLI before picking analysis variables.

use crate::errors::{BlDiagError, Result};
use netcdf::File;

/// Prints global attributes and variables of an archive file.
pub fn print_metadata(file: &File) -> Result<()> {
    println!("\n===== Global Attributes =====");
    for attr in file.attributes() {
        println!("- {}: {:?}", attr.name(), attr.value()?);
    }

    println!("\n===== Variables =====");
    for var in file.variables() {
        let dims: Vec<String> = var
            .dimensions()
            .iter()
            .map(|d| format!("{}[{}]", d.name(), d.len()))
            .collect();
        println!("- {} ({})", var.name(), dims.join(", "));
    }

    Ok(())
}

/// Lists all variables and dimensions in a clean, organized format.
pub fn list_variables_and_dimensions(file: &File) -> Result<()> {
    println!("\n Dimensions");
    println!("==============");

    let mut dimensions: Vec<_> = file.dimensions().collect();
    dimensions.sort_by(|a, b| a.name().cmp(&b.name()));

    if dimensions.is_empty() {
        println!("   (No dimensions found)");
    } else {
        for dim in dimensions {
            let length_info = if dim.is_unlimited() {
                format!("{} (unlimited)", dim.len())
            } else {
                dim.len().to_string()
            };
            println!("    {} = {}", dim.name(), length_info);
        }
    }

    println!("\n Variables");
    println!("=============");

    let mut variables: Vec<_> = file.variables().collect();
    variables.sort_by(|a, b| a.name().cmp(&b.name()));

    if variables.is_empty() {
        println!("   (No variables found)");
    } else {
        for var in variables {
            let dims: Vec<String> = var
                .dimensions()
                .iter()
                .map(|d| format!("{}[{}]", d.name(), d.len()))
                .collect();
            println!("    {} ({})", var.name(), dims.join(", "));
        }
    }

    Ok(())
}

/// Describe a single variable: shape and attributes.
pub fn describe_variable(file: &File, var_name: &str) -> Result<()> {
    let var = file
        .variable(var_name)
        .ok_or_else(|| BlDiagError::VariableNotFound {
            var: var_name.to_string(),
        })?;

    println!("\n Variable: {}", var_name);
    println!("================================");
    for dim in var.dimensions() {
        println!("   {} = {}", dim.name(), dim.len());
    }
    for attr in var.attributes() {
        println!("   :{} = {:?}", attr.name(), attr.value()?);
    }
    Ok(())
}
