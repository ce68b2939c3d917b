use serde::{Deserialize, Serialize};

use crate::{
    error::ReportError,
    group::GroupKey,
    ingest::HOSTS,
    table::{Schema, Table},
};

/// Named stacked breakdown, one panel of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricGroup {
    pub name: String,
    pub columns: Vec<String>,
    /// `[row, col]` in the report grid, otherwise the next free cell
    #[serde(default)]
    pub cell: Option<(usize, usize)>,
}

impl MetricGroup {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_owned(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            cell: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportLayout {
    pub title: String,
    /// `[rows, cols]`
    pub grid: (usize, usize),
    /// Image size in pixels
    pub size: (u32, u32),
    pub x_label: String,
    pub y_label: Option<String>,
    /// Shared y axis range of every panel
    pub y_range: Option<(f64, f64)>,
    /// Stripped from column names to get legend labels, first match wins
    pub label_suffixes: Vec<String>,
    pub panels: Vec<MetricGroup>,
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            title: "Byzcoin Simulation Monitor".to_owned(),
            grid: (2, 3),
            size: (1600, 1000),
            x_label: HOSTS.to_owned(),
            y_label: Some("Time in seconds".to_owned()),
            y_range: Some((0.0, 12.0)),
            label_suffixes: vec!["_wall_sum".to_owned(), "_user_sum".to_owned()],
            panels: vec![
                MetricGroup::new(
                    "phases",
                    &["send_wall_sum", "prepare_wall_sum", "confirm_wall_sum"],
                ),
                MetricGroup::new(
                    "prepare",
                    &[
                        "prepare.prepare_intro_wall_sum",
                        "prepare.create_tx_wall_sum",
                        "prepare.sign_wall_sum",
                    ],
                ),
                MetricGroup::new("create_state_change", &["create_state_change_wall_sum"]),
                MetricGroup::new("process_one_tx", &["process_one_tx_wall_sum"]),
                MetricGroup {
                    cell: Some((1, 2)),
                    ..MetricGroup::new(
                        "p_o_t",
                        &[
                            "p_o_t.init_wall_sum",
                            "p_o_t.execute_wall_sum",
                            "p_o_t.increment_wall_sum",
                            "p_o_t.verify_wall_sum",
                            "p_o_t.store_wall_sum",
                        ],
                    )
                },
            ],
        }
    }
}

/// Stacked segment of one panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub label: String,
    pub column: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Panel {
    pub name: String,
    pub cell: (usize, usize),
    pub x_label: String,
    pub y_label: Option<String>,
    pub y_range: Option<(f64, f64)>,
    pub stacked: bool,
    pub x: Vec<f64>,
    pub series: Vec<Series>,
}

impl Panel {
    /// Height of each stacked bar, missing values count as zero
    pub fn totals(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.x.len()];
        for series in &self.series {
            for (total, value) in totals.iter_mut().zip(&series.values) {
                if value.is_finite() {
                    *total += value;
                }
            }
        }
        totals
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub title: String,
    pub key: GroupKey,
    pub grid: (usize, usize),
    pub size: (u32, u32),
    pub panels: Vec<Panel>,
}

/// Strips the first matching suffix, ie. `send_wall_sum` -> `send`
pub fn legend_label<'a>(column: &'a str, suffixes: &[String]) -> &'a str {
    suffixes
        .iter()
        .find_map(|suffix| column.strip_suffix(suffix.as_str()))
        .unwrap_or(column)
}

impl ReportLayout {
    /// Grid cell of every panel, in panel order
    pub fn cells(&self) -> Result<Vec<(usize, usize)>, ReportError> {
        let (rows, cols) = self.grid;
        if self.panels.len() > rows * cols {
            return Err(ReportError::GridTooSmall {
                panels: self.panels.len(),
                rows,
                cols,
            });
        }

        let mut taken: Vec<(usize, usize)> = Vec::new();
        for panel in &self.panels {
            let Some(cell) = panel.cell else {
                continue;
            };
            if cell.0 >= rows || cell.1 >= cols {
                return Err(ReportError::CellOutOfGrid {
                    panel: panel.name.clone(),
                    cell,
                    rows,
                    cols,
                });
            }
            if taken.contains(&cell) {
                return Err(ReportError::CellTaken {
                    panel: panel.name.clone(),
                    cell,
                });
            }
            taken.push(cell);
        }

        let mut free = (0..rows)
            .flat_map(|r| (0..cols).map(move |c| (r, c)))
            .filter(|cell| !taken.contains(cell))
            .collect::<Vec<_>>()
            .into_iter();
        Ok(self
            .panels
            .iter()
            .map(|panel| {
                panel
                    .cell
                    .or_else(|| free.next())
                    .unwrap_or_default()
            })
            .collect())
    }

    /// Every metric column, and `hosts`, has to exist in `schema`
    pub fn validate(&self, schema: &Schema) -> Result<(), ReportError> {
        self.cells()?;
        if !schema.contains(HOSTS) {
            return Err(ReportError::MissingMetricColumn {
                panel: self.title.clone(),
                column: HOSTS.to_owned(),
            });
        }
        for panel in &self.panels {
            if let Some(column) = panel.columns.iter().find(|c| !schema.contains(c)) {
                return Err(ReportError::MissingMetricColumn {
                    panel: panel.name.clone(),
                    column: column.clone(),
                });
            }
        }
        Ok(())
    }

    /// Builds the report of one partition. `rows` is the output of
    /// [`crate::group::select_group`] and may be empty.
    pub fn compose(&self, key: GroupKey, rows: &Table) -> Result<Report, ReportError> {
        self.validate(rows.schema())?;
        let cells = self.cells()?;
        let x = rows.numbers(HOSTS)?;

        let panels = self
            .panels
            .iter()
            .zip(cells)
            .map(|(group, cell)| -> Result<Panel, ReportError> {
                let series = group
                    .columns
                    .iter()
                    .map(|column| -> Result<Series, ReportError> {
                        Ok(Series {
                            label: legend_label(column, &self.label_suffixes).to_owned(),
                            column: column.clone(),
                            values: rows.numbers(column)?,
                        })
                    })
                    .collect::<Result<Vec<_>, ReportError>>()?;
                Ok(Panel {
                    name: group.name.clone(),
                    cell,
                    x_label: self.x_label.clone(),
                    y_label: self.y_label.clone(),
                    y_range: self.y_range,
                    stacked: true,
                    x: x.clone(),
                    series,
                })
            })
            .collect::<Result<Vec<_>, ReportError>>()?;

        Ok(Report {
            title: self.title.clone(),
            key,
            grid: self.grid,
            size: self.size,
            panels,
        })
    }
}
