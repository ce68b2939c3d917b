use serde::{Deserialize, Serialize};

use crate::{plot::Plot, table::Schema};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    #[serde(default)]
    pub settings: Settings,
    pub plots: Vec<Box<dyn Plot>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Measurement files must start with this
    pub file_prefix: String,
    /// Measurement files must end with this
    pub file_suffix: String,
    /// File name marker for batched runs
    pub batch_marker: String,
    /// File name marker for runs that did not keep state
    pub no_keep_marker: String,
    /// Schema every file must match, including the derived `batch` and `keep` columns.
    /// Without it the first loaded file decides.
    pub expected_schema: Option<Schema>,
    /// Write the panel data of each report as json under `plot_data/`
    pub plot_data: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            file_prefix: "coins".to_owned(),
            file_suffix: ".csv".to_owned(),
            batch_marker: "_batch".to_owned(),
            no_keep_marker: "_nokeep".to_owned(),
            expected_schema: None,
            plot_data: true,
        }
    }
}
