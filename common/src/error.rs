use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path} as csv: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{path} has no header row")]
    MissingHeader { path: PathBuf },
    #[error("{path} is missing required column {column}")]
    RequiredColumn { path: PathBuf, column: String },
    #[error("Missing column {0}")]
    MissingColumn(String),
    #[error("Column {column} holds non-numeric value {value:?} at row {row}")]
    NotNumeric {
        column: String,
        row: usize,
        value: String,
    },
    #[error("Column {column} holds non-boolean value {value:?} at row {row}")]
    NotBoolean {
        column: String,
        row: usize,
        value: String,
    },
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Panel {panel} references missing metric column {column}")]
    MissingMetricColumn { panel: String, column: String },
    #[error("{panels} panels do not fit a {rows}x{cols} grid")]
    GridTooSmall {
        panels: usize,
        rows: usize,
        cols: usize,
    },
    #[error("Panel {panel} is placed at {cell:?}, outside the {rows}x{cols} grid")]
    CellOutOfGrid {
        panel: String,
        cell: (usize, usize),
        rows: usize,
        cols: usize,
    },
    #[error("Panel {panel} is placed at {cell:?}, which is already taken")]
    CellTaken { panel: String, cell: (usize, usize) },
    #[error(transparent)]
    Table(#[from] TableError),
}
