use std::fmt;

use itertools::iproduct;
use serde::Serialize;

use crate::{
    error::TableError,
    ingest::{BATCH, DELAY, HOSTS, KEEP},
    table::{Schema, Table},
};

/// One partition of the unified table
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupKey {
    pub delay: f64,
    pub keep: bool,
    pub batch: bool,
}

impl GroupKey {
    /// Filename-safe form, ie. `delay10-keeptrue-batchfalse`
    pub fn file_tag(&self) -> String {
        format!("delay{}-keep{}-batch{}", self.delay, self.keep, self.batch)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delay={} keep={} batch={}",
            self.delay, self.keep, self.batch
        )
    }
}

fn distinct<T: PartialEq>(values: Vec<T>) -> Vec<T> {
    let mut unique = Vec::new();
    for value in values {
        if !unique.contains(&value) {
            unique.push(value);
        }
    }
    unique
}

fn delays(table: &Table) -> Result<Vec<f64>, TableError> {
    let delays = table.numbers(DELAY)?;
    if let Some(row) = delays.iter().position(|d| d.is_nan()) {
        return Err(TableError::NotNumeric {
            column: DELAY.to_owned(),
            row,
            value: table.rows()[row][table.schema().position(DELAY).unwrap_or_default()]
                .to_string(),
        });
    }
    Ok(delays)
}

/// Distinct values of each partition dimension, in order of first appearance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dimensions {
    pub delays: Vec<f64>,
    pub keeps: Vec<bool>,
    pub batches: Vec<bool>,
}

impl Dimensions {
    pub fn index(table: &Table) -> Result<Self, TableError> {
        if table.schema().is_empty() {
            return Ok(Self::default());
        }
        Ok(Self {
            delays: distinct(delays(table)?),
            keeps: distinct(table.bools(KEEP)?),
            batches: distinct(table.bools(BATCH)?),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty() || self.keeps.is_empty() || self.batches.is_empty()
    }

    /// Every combination of the observed dimension values, including ones
    /// no row carries
    pub fn keys(&self) -> impl Iterator<Item = GroupKey> + '_ {
        iproduct!(&self.delays, &self.keeps, &self.batches).map(|(delay, keep, batch)| GroupKey {
            delay: *delay,
            keep: *keep,
            batch: *batch,
        })
    }
}

/// Rows matching `key`, sorted by `hosts`. Rows with equal `hosts` keep their
/// order from `table`.
pub fn select_group(table: &Table, key: &GroupKey) -> Result<Table, TableError> {
    let schema: &Schema = table.schema();
    if schema.is_empty() {
        return Ok(Table::default());
    }
    // Type errors surface here rather than as silently unmatched rows
    delays(table)?;
    table.bools(KEEP)?;
    table.bools(BATCH)?;

    let position = |column: &str| {
        schema
            .position(column)
            .ok_or_else(|| TableError::MissingColumn(column.to_owned()))
    };
    let (delay, keep, batch) = (position(DELAY)?, position(KEEP)?, position(BATCH)?);

    let mut selected = table.filter(|row| {
        row[delay].as_f64() == Some(key.delay)
            && row[keep].as_bool() == Some(key.keep)
            && row[batch].as_bool() == Some(key.batch)
    });
    selected.sort_by_number(HOSTS)?;
    Ok(selected)
}
