//! Selectivity of join predicates.

use crate::operators::join::CmpOp;
use crate::statistics::ColumnStatistics;

/// The selectivity of a predicate when statistics of its columns are not available.
pub const DEFAULT_SELECTIVITY: f64 = 1.0 / 3.0;
/// The lower bound of an estimated selectivity.
pub const MIN_SELECTIVITY: f64 = 1e-4;
/// The upper bound of an estimated selectivity.
pub const MAX_SELECTIVITY: f64 = 1.0 - MIN_SELECTIVITY;

/// Estimates the fraction of pairs of rows for which `left <op> right` holds.
///
/// The estimate depends on the available statistics:
/// * string columns compare the prefix histograms of both columns.
/// * numeric columns with quantile sketches compare the distribution of the left column
///   with a quantile of the right column.
/// * otherwise value ranges and the number of distinct values are used.
///
/// The result is scaled by the fraction of non-null values of both columns and is kept within
/// `[MIN_SELECTIVITY, MAX_SELECTIVITY]`.
pub fn selectivity(op: CmpOp, left: Option<&ColumnStatistics>, right: Option<&ColumnStatistics>) -> f64 {
    let (left, right) = match (left, right) {
        (Some(left), Some(right)) => (left, right),
        _ => {
            log::trace!("Selectivity: no column statistics. Using default: {}", DEFAULT_SELECTIVITY);
            return DEFAULT_SELECTIVITY;
        }
    };

    let estimate = if left.data_type().is_string() && right.data_type().is_string() {
        prefix_selectivity(op, left, right)
    } else if let Some(estimate) = quantile_selectivity(op, left, right) {
        estimate
    } else {
        range_selectivity(op, left, right)
    };

    let non_null = left.non_null_fraction() * right.non_null_fraction();
    let result = clamp(estimate * non_null);
    log::trace!("Selectivity: {} estimate={} non_null={} result={}", op, estimate, non_null, result);
    result
}

/// Estimates the fraction of values of the right column a single value of the left column is compared
/// with when an index on the right column is searched for a range predicate.
///
/// Both `<` and `<=` (resp. `>` and `>=`) are estimated with the median of the right column.
pub fn range_fraction(op: CmpOp, left: Option<&ColumnStatistics>, right: Option<&ColumnStatistics>) -> f64 {
    let (left, right) = match (left, right) {
        (Some(left), Some(right)) => (left, right),
        _ => return 0.5,
    };

    let below = match (left.quantiles(), right.quantiles()) {
        (Some(l), Some(r)) => Some(l.cdf(r.quantile(0.5))),
        _ => match (left.min(), left.max(), right.min(), right.max()) {
            (Some(lmin), Some(lmax), Some(rmin), Some(rmax)) if lmax > lmin => {
                let median = (rmin + rmax) / 2.0;
                Some(((median - lmin) / (lmax - lmin)).max(0.0).min(1.0))
            }
            _ => None,
        },
    };

    let fraction = match (op, below) {
        (CmpOp::Lt, Some(below)) | (CmpOp::LtEq, Some(below)) => below,
        (CmpOp::Gt, Some(below)) | (CmpOp::GtEq, Some(below)) => 1.0 - below,
        (_, None) => 0.5,
        _ => 1.0,
    };
    fraction.max(0.01).min(1.0)
}

fn prefix_selectivity(op: CmpOp, left: &ColumnStatistics, right: &ColumnStatistics) -> f64 {
    let jaccard = match (left.prefixes(), right.prefixes()) {
        (Some(l), Some(r)) => l.jaccard(r),
        _ => None,
    };
    match jaccard {
        Some(j) if op == CmpOp::NotEq => 1.0 - j,
        Some(j) => j,
        None => DEFAULT_SELECTIVITY,
    }
}

fn quantile_selectivity(op: CmpOp, left: &ColumnStatistics, right: &ColumnStatistics) -> Option<f64> {
    let l = left.quantiles()?;
    let r = right.quantiles()?;
    let estimate = match op {
        CmpOp::Lt => l.cdf(r.quantile(0.5)),
        CmpOp::LtEq => l.cdf(r.quantile(0.75)),
        CmpOp::Gt => 1.0 - l.cdf(r.quantile(0.5)),
        CmpOp::GtEq => 1.0 - l.cdf(r.quantile(0.25)),
        CmpOp::Eq => equality_selectivity(left, right),
        CmpOp::NotEq => 1.0 - equality_selectivity(left, right),
    };
    Some(estimate.max(MIN_SELECTIVITY).min(1.0))
}

fn range_selectivity(op: CmpOp, left: &ColumnStatistics, right: &ColumnStatistics) -> f64 {
    match op {
        CmpOp::Eq => {
            if disjoint_ranges(left, right) {
                0.0
            } else {
                equality_selectivity(left, right)
            }
        }
        CmpOp::NotEq => {
            if disjoint_ranges(left, right) {
                1.0
            } else {
                1.0 - equality_selectivity(left, right)
            }
        }
        CmpOp::Lt | CmpOp::LtEq | CmpOp::Gt | CmpOp::GtEq => {
            let (lmin, lmax, rmin, rmax) = match (left.min(), left.max(), right.min(), right.max()) {
                (Some(lmin), Some(lmax), Some(rmin), Some(rmax)) => (lmin, lmax, rmin, rmax),
                _ => return DEFAULT_SELECTIVITY,
            };
            let less = matches!(op, CmpOp::Lt | CmpOp::LtEq);
            if lmax < rmin {
                // every left value is below every right value
                return if less { 1.0 } else { 0.0 };
            }
            if lmin > rmax {
                return if less { 0.0 } else { 1.0 };
            }
            let overlap = lmax.min(rmax) - lmin.max(rmin) + 1.0;
            let union = lmax.max(rmax) - lmin.min(rmin) + 1.0;
            (overlap / union).max(MIN_SELECTIVITY).min(1.0)
        }
    }
}

fn equality_selectivity(left: &ColumnStatistics, right: &ColumnStatistics) -> f64 {
    let ndv = left.ndv().max(right.ndv());
    if ndv >= 1.0 {
        1.0 / ndv
    } else {
        DEFAULT_SELECTIVITY
    }
}

fn disjoint_ranges(left: &ColumnStatistics, right: &ColumnStatistics) -> bool {
    match (left.min(), left.max(), right.min(), right.max()) {
        (Some(lmin), Some(lmax), Some(rmin), Some(rmax)) => lmin > rmax || rmin > lmax,
        _ => false,
    }
}

fn clamp(selectivity: f64) -> f64 {
    if selectivity.is_nan() {
        DEFAULT_SELECTIVITY
    } else {
        selectivity.max(MIN_SELECTIVITY).min(MAX_SELECTIVITY)
    }
}
