use core::fmt::Debug;
use std::path::{Path, PathBuf};

use chrono::Local;
use dyn_clone::{DynClone, clone_trait_object};
use eyre::{Context, Result};
use futures::future::join_all;
use tokio::fs::{create_dir_all, remove_file, rename};
use tracing::{debug, info, warn};

use crate::{
    config::Settings,
    group::{Dimensions, select_group},
    report::{Report, ReportLayout},
    table::Table,
    util::{report_file_name, write_json_file},
};

#[typetag::serde(tag = "type")]
#[async_trait::async_trait]
pub trait Plot: Debug + DynClone + Send + Sync {
    /// Columns this plot reads from the unified table
    fn required_columns(&self) -> Vec<String>;
    /// Plots the data
    ///
    /// Arguments:
    /// * `table` - The unified table of all merged measurement files
    /// * `plot_path` - Directory the images are written to
    /// * `settings` - The settings from the config
    ///
    /// Returns the paths of the written images.
    async fn plot(
        &self,
        table: &Table,
        plot_path: &Path,
        settings: &Settings,
    ) -> Result<Vec<PathBuf>>;
}
clone_trait_object!(Plot);

/// Draws a composed report into an image file
pub trait Renderer {
    fn render(&self, report: &Report, path: &Path) -> Result<()>;
}

pub async fn ensure_plot_dirs(dirs: &[PathBuf]) -> Result<()> {
    let create_jobs = dirs.iter().map(create_dir_all);
    for res in join_all(create_jobs).await {
        res?;
    }
    Ok(())
}

/// Renders one report per combination of dimension values.
///
/// The layout is checked against the table schema before anything is drawn.
/// Each image is rendered to a hidden sibling file first and renamed into
/// place, so a failed render leaves no image behind.
pub async fn render_partitions<R: Renderer>(
    layout: &ReportLayout,
    table: &Table,
    renderer: &R,
    plot_path: &Path,
    settings: &Settings,
) -> Result<Vec<PathBuf>> {
    if table.schema().is_empty() {
        info!("No data, nothing to plot");
        return Ok(Vec::new());
    }
    layout
        .validate(table.schema())
        .context(format!("Validate layout {}", layout.title))?;

    let dimensions = Dimensions::index(table)?;
    let plot_data_dir = plot_path.join("plot_data");
    let mut dirs = vec![plot_path.to_path_buf()];
    if settings.plot_data {
        dirs.push(plot_data_dir.clone());
    }
    ensure_plot_dirs(&dirs).await?;

    let mut written = Vec::new();
    for key in dimensions.keys() {
        let rows = select_group(table, &key)?;
        debug!("{key}: {} rows", rows.len());
        let report = layout.compose(key, &rows)?;

        let file_name = report_file_name(Local::now(), &layout.title, &key);
        let path = plot_path.join(&file_name);
        let partial = plot_path.join(format!(".{file_name}"));
        if let Err(err) = renderer.render(&report, &partial) {
            if let Err(remove_err) = remove_file(&partial).await {
                debug!("No partial file to remove: {remove_err}");
            }
            return Err(err.wrap_err(format!("Render report for {key}")));
        }
        rename(&partial, &path)
            .await
            .context(format!("Move {} into place", path.display()))?;

        if settings.plot_data {
            let stem = file_name.trim_end_matches(".png");
            write_json_file(&plot_data_dir.join(format!("{stem}.json")), &report).await?;
        }
        written.push(path);
    }

    if written.is_empty() {
        warn!("No partitions found in {} rows", table.len());
    }
    Ok(written)
}

/// Runs every configured plot over the unified table
pub async fn plot(
    plots: &[Box<dyn Plot>],
    table: &Table,
    plot_path: &Path,
    settings: &Settings,
) -> Result<Vec<PathBuf>> {
    if plots.is_empty() {
        debug!("No plots");
        return Ok(Vec::new());
    }

    let mut written = Vec::new();
    for plot in plots {
        written.extend(plot.plot(table, plot_path, settings).await?);
    }
    Ok(written)
}
