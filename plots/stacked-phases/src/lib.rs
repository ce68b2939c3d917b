use std::path::{Path, PathBuf};

use common::{
    config::{Config, Settings},
    ingest::HOSTS,
    plot::{Plot, render_partitions},
    report::ReportLayout,
    table::Table,
};
use eyre::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

mod render;

pub use render::PlottersRenderer;

/// One figure per (delay, keep, batch) partition, one stacked bar panel per metric group
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StackedPhases {
    #[serde(flatten)]
    pub layout: ReportLayout,
}

#[async_trait::async_trait]
#[typetag::serde]
impl Plot for StackedPhases {
    fn required_columns(&self) -> Vec<String> {
        std::iter::once(HOSTS.to_owned())
            .chain(
                self.layout
                    .panels
                    .iter()
                    .flat_map(|panel| panel.columns.iter().cloned()),
            )
            .collect()
    }

    async fn plot(
        &self,
        table: &Table,
        plot_path: &Path,
        settings: &Settings,
    ) -> Result<Vec<PathBuf>> {
        debug!(
            "Plotting {} panels of {} over {} rows",
            self.layout.panels.len(),
            self.layout.title,
            table.len()
        );
        render_partitions(&self.layout, table, &PlottersRenderer, plot_path, settings).await
    }
}

/// The byzcoin simulation monitor, used when no config file is given
pub fn default_config() -> Config {
    Config {
        name: "byzcoin-simulation".to_owned(),
        settings: Settings::default(),
        plots: vec![Box::new(StackedPhases::default())],
    }
}
