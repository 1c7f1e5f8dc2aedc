use std::fs;
use std::path::PathBuf;

use crate::cascade::CascadeOutput;
use crate::config::Layout;
use crate::{Error, Result};

pub fn write_outputs(layout: &Layout, output: &CascadeOutput) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(&layout.out_dir)
        .map_err(|err| Error::io("failed to create output directory", &layout.out_dir, err))?;

    let mut written = Vec::with_capacity(output.sheets.len());
    for (group, sheet) in &output.sheets {
        let path = layout.output_path(group);
        fs::write(&path, sheet.to_string())
            .map_err(|err| Error::io("failed to write output", &path, err))?;
        tracing::info!("generated {}", path.display());
        written.push(path);
    }
    Ok(written)
}
