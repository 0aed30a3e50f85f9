//! Accumulates statistics of a column from its values.

use chrono::{Datelike, NaiveDate};

use crate::datatypes::DataType;
use crate::error::OptimizerError;
use crate::statistics::hll::HyperLogLog;
use crate::statistics::prefix::PrefixHistogram;
use crate::statistics::quantiles::QuantileSketch;
use crate::statistics::ColumnStatistics;

// num_days_from_ce() of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// A non-null value of a column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Int(i64),
    Decimal(f64),
    Date(NaiveDate),
    Str(String),
}

impl ColumnValue {
    fn accepted_by(&self, data_type: DataType) -> bool {
        match self {
            ColumnValue::Int(_) => matches!(data_type, DataType::Int32 | DataType::Int64 | DataType::Decimal),
            ColumnValue::Decimal(_) => data_type == DataType::Decimal,
            ColumnValue::Date(_) => data_type == DataType::Date,
            ColumnValue::Str(_) => data_type.is_string(),
        }
    }
}

/// Returns the number of days between the unix epoch and the given date.
pub fn epoch_days(date: &NaiveDate) -> i64 {
    date.num_days_from_ce() as i64 - UNIX_EPOCH_DAYS_FROM_CE
}

/// Builds [ColumnStatistics] from a sequence of values in storage order.
#[derive(Debug, Clone)]
pub struct ColumnStatisticsBuilder {
    data_type: DataType,
    hll: HyperLogLog,
    quantiles: QuantileSketch,
    prefixes: PrefixHistogram,
    min: Option<f64>,
    max: Option<f64>,
    null_count: u64,
    value_count: u64,
    sorted: bool,
    prev_number: Option<f64>,
    prev_str: Option<String>,
}

impl ColumnStatisticsBuilder {
    pub fn new(data_type: DataType) -> Self {
        ColumnStatisticsBuilder {
            data_type,
            hll: HyperLogLog::new(),
            quantiles: QuantileSketch::new(),
            prefixes: PrefixHistogram::new(),
            min: None,
            max: None,
            null_count: 0,
            value_count: 0,
            sorted: true,
            prev_number: None,
            prev_str: None,
        }
    }

    /// Adds a null.
    pub fn add_null(&mut self) {
        self.null_count += 1;
        self.value_count += 1;
    }

    /// Adds a value. Returns an error if the value can not be stored in a column of this type.
    pub fn add(&mut self, value: ColumnValue) -> Result<(), OptimizerError> {
        if !value.accepted_by(self.data_type) {
            return Err(OptimizerError::argument(format!(
                "Value {:?} does not match column type {:?}",
                value, self.data_type
            )));
        }
        self.value_count += 1;

        match value {
            ColumnValue::Int(v) => {
                self.hll.add(&v);
                self.add_number(v as f64);
            }
            ColumnValue::Decimal(v) => {
                self.hll.add(&v.to_bits());
                self.add_number(v);
            }
            ColumnValue::Date(date) => {
                let days = epoch_days(&date);
                self.hll.add(&days);
                self.add_number(days as f64);
            }
            ColumnValue::Str(s) => {
                self.hll.add(s.as_str());
                self.prefixes.add(&s);
                if let Some(prev) = self.prev_str.as_ref() {
                    if s.as_str() < prev.as_str() {
                        self.sorted = false;
                    }
                }
                self.prev_str = Some(s);
            }
        }
        Ok(())
    }

    fn add_number(&mut self, v: f64) {
        if let Some(prev) = self.prev_number {
            if v < prev {
                self.sorted = false;
            }
        }
        self.prev_number = Some(v);
        self.quantiles.add(v);
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    /// Creates an instance of [ColumnStatistics].
    pub fn build(mut self) -> ColumnStatistics {
        let non_null = self.value_count - self.null_count;
        let ndv = self.hll.estimate().round().min(non_null as f64);
        let mut statistics = ColumnStatistics::new(self.data_type, ndv)
            .with_nulls(self.null_count, self.value_count)
            .with_sorted(self.sorted && non_null > 0);

        if let (Some(min), Some(max)) = (self.min, self.max) {
            statistics = statistics.with_range(min, max);
        }
        if self.data_type.is_string() {
            statistics.with_prefixes(self.prefixes)
        } else {
            self.quantiles.compress();
            statistics.with_quantiles(self.quantiles)
        }
    }
}
