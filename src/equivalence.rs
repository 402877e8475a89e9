//! Structural and value comparison of two containers.
//!
//! Both files are read through [`GenericData`], so the comparison sees
//! exactly what any other reader would. Differences are collected rather
//! than returned at the first mismatch.

use crate::core::column::{ColumnInfo, ColumnType, ColumnValue};
use crate::core::dataset::DataSetHeader;
use crate::core::error::Result;
use crate::core::generic::GenericDataHeader;
use crate::core::param::{ParameterList, ParameterValue};
use crate::GenericData;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    /// Largest absolute difference at which two numeric cells or float
    /// parameters still count as equal
    pub epsilon: f64,

    /// Per-name overrides of `epsilon`. Keys are parameter names, column
    /// names, or `group/data_set/column` paths; the path wins over the
    /// bare column name.
    pub epsilon_by_name: HashMap<String, f64>,

    /// Relative tolerance: values also match when their difference is at
    /// most this fraction of the larger magnitude
    pub fraction: Option<f64>,

    /// Float columns whose Pearson correlation reaches this value pass even
    /// when single cells are out of tolerance
    pub correlation_cutoff: Option<f64>,

    /// Parameter names excluded from the comparison
    pub ignore: Vec<String>,

    /// Also compare file identifiers and creation times
    pub compare_identity: bool,

    /// Cell differences reported per data set before the rest are counted
    pub max_reported: usize,
}

impl Default for CompareOptions {
    fn default() -> Self {
        CompareOptions {
            epsilon: 1e-6,
            epsilon_by_name: HashMap::new(),
            fraction: None,
            correlation_cutoff: None,
            ignore: Vec::new(),
            compare_identity: false,
            max_reported: 20,
        }
    }
}

impl CompareOptions {
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_epsilon_for(mut self, name: impl Into<String>, epsilon: f64) -> Self {
        self.epsilon_by_name.insert(name.into(), epsilon);
        self
    }

    pub fn with_fraction(mut self, fraction: f64) -> Self {
        self.fraction = Some(fraction);
        self
    }

    pub fn with_correlation_cutoff(mut self, cutoff: f64) -> Self {
        self.correlation_cutoff = Some(cutoff);
        self
    }

    pub fn ignore(mut self, name: impl Into<String>) -> Self {
        self.ignore.push(name.into());
        self
    }

    pub fn with_identity(mut self) -> Self {
        self.compare_identity = true;
        self
    }

    fn ignores(&self, name: &str) -> bool {
        self.ignore.iter().any(|ignored| ignored == name)
    }

    /// First override found among `names`, else the global epsilon.
    fn epsilon_for(&self, names: &[&str]) -> f64 {
        names
            .iter()
            .find_map(|name| self.epsilon_by_name.get(*name).copied())
            .unwrap_or(self.epsilon)
    }

    fn within(&self, a: f64, b: f64, epsilon: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return a.is_nan() && b.is_nan();
        }
        let relative = self
            .fraction
            .map_or(0.0, |frac| frac * a.abs().max(b.abs()));
        (a - b).abs() <= epsilon.max(relative)
    }
}

/// Which of the two files holds something the other lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Difference {
    /// A metadata field such as the file type or locale
    Metadata {
        scope: String,
        field: String,
        left: String,
        right: String,
    },
    /// A parameter missing on one side, or holding a different value
    Parameter {
        scope: String,
        name: String,
        left: Option<String>,
        right: Option<String>,
    },
    MissingGroup { group: String, present_in: Side },
    MissingDataSet {
        group: String,
        data_set: String,
        present_in: Side,
    },
    Schema {
        group: String,
        data_set: String,
        left: Vec<String>,
        right: Vec<String>,
    },
    RowCount {
        group: String,
        data_set: String,
        left: u32,
        right: u32,
    },
    Cell {
        group: String,
        data_set: String,
        row: u64,
        column: usize,
        left: String,
        right: String,
    },
    /// A float column with out-of-tolerance cells whose correlation also
    /// falls below the cutoff
    Correlation {
        group: String,
        data_set: String,
        column: usize,
        correlation: f64,
        cutoff: f64,
    },
    /// Cell differences beyond the reporting limit
    CellsOmitted {
        group: String,
        data_set: String,
        count: u64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquivalenceReport {
    pub differences: Vec<Difference>,
    /// Data sets whose cells were compared
    pub data_sets_compared: usize,
}

impl EquivalenceReport {
    pub fn is_equivalent(&self) -> bool {
        self.differences.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Compare two containers and list every difference found.
pub fn compare_files<P: AsRef<Path>, Q: AsRef<Path>>(
    left: P,
    right: Q,
    options: &CompareOptions,
) -> Result<EquivalenceReport> {
    let left = GenericData::open(left)?;
    let right = GenericData::open(right)?;
    let mut report = EquivalenceReport::default();

    compare_metadata(
        "metadata",
        left.header().metadata(),
        right.header().metadata(),
        options,
        &mut report.differences,
    );

    for group in left.data_group_names() {
        if right.find_data_group_header(&group).is_none() {
            report.differences.push(Difference::MissingGroup {
                group,
                present_in: Side::Left,
            });
        }
    }
    for group in right.data_group_names() {
        if left.find_data_group_header(&group).is_none() {
            report.differences.push(Difference::MissingGroup {
                group,
                present_in: Side::Right,
            });
        }
    }

    for group in left.header().groups() {
        let other = match right.find_data_group_header(group.name()) {
            Some(other) => other,
            None => continue,
        };

        for data_set in group.data_sets() {
            match other.find_data_set(data_set.name()) {
                Some(other_set) => {
                    if compare_data_set_headers(group.name(), data_set, other_set, options, &mut report)
                    {
                        compare_cells(&left, &right, group.name(), data_set.name(), options, &mut report)?;
                    }
                }
                None => report.differences.push(Difference::MissingDataSet {
                    group: group.name().to_string(),
                    data_set: data_set.name().to_string(),
                    present_in: Side::Left,
                }),
            }
        }
        for data_set in other.data_sets() {
            if group.find_data_set(data_set.name()).is_none() {
                report.differences.push(Difference::MissingDataSet {
                    group: group.name().to_string(),
                    data_set: data_set.name().to_string(),
                    present_in: Side::Right,
                });
            }
        }
    }

    debug!(
        "Compared {} and {}: {} differences",
        left.path().display(),
        right.path().display(),
        report.differences.len()
    );
    Ok(report)
}

fn compare_metadata(
    scope: &str,
    left: &GenericDataHeader,
    right: &GenericDataHeader,
    options: &CompareOptions,
    out: &mut Vec<Difference>,
) {
    let mut fields = vec![
        ("file_type", left.file_type(), right.file_type()),
        ("locale", left.locale(), right.locale()),
    ];
    if options.compare_identity {
        fields.push(("file_id", left.file_id(), right.file_id()));
        fields.push(("creation_time", left.creation_time(), right.creation_time()));
    }
    for (field, l, r) in fields {
        if l != r {
            out.push(Difference::Metadata {
                scope: scope.to_string(),
                field: field.to_string(),
                left: l.to_string(),
                right: r.to_string(),
            });
        }
    }

    compare_params(scope, left.params(), right.params(), options, out);

    let (lp, rp) = (left.parents(), right.parents());
    if lp.len() != rp.len() {
        out.push(Difference::Metadata {
            scope: scope.to_string(),
            field: "parents".to_string(),
            left: lp.len().to_string(),
            right: rp.len().to_string(),
        });
    }
    for (index, (l, r)) in lp.iter().zip(rp).enumerate() {
        compare_metadata(&format!("{}.parents[{}]", scope, index), l, r, options, out);
    }
}

fn compare_params(
    scope: &str,
    left: &ParameterList,
    right: &ParameterList,
    options: &CompareOptions,
    out: &mut Vec<Difference>,
) {
    let names: BTreeSet<&str> = left
        .iter()
        .chain(right.iter())
        .map(|p| p.name.as_str())
        .filter(|name| !options.ignores(name))
        .collect();

    for name in names {
        let l = left.find(name).map(|p| &p.value);
        let r = right.find(name).map(|p| &p.value);
        let same = match (l, r) {
            (Some(ParameterValue::Float(a)), Some(ParameterValue::Float(b))) => {
                options.within(f64::from(*a), f64::from(*b), options.epsilon_for(&[name]))
            }
            (l, r) => l == r,
        };
        if !same {
            out.push(Difference::Parameter {
                scope: scope.to_string(),
                name: name.to_string(),
                left: l.map(describe_param),
                right: r.map(describe_param),
            });
        }
    }
}

fn describe_param(value: &ParameterValue) -> String {
    match value {
        ParameterValue::Int8(v) => v.to_string(),
        ParameterValue::UInt8(v) => v.to_string(),
        ParameterValue::Int16(v) => v.to_string(),
        ParameterValue::UInt16(v) => v.to_string(),
        ParameterValue::Int32(v) => v.to_string(),
        ParameterValue::UInt32(v) => v.to_string(),
        ParameterValue::Float(v) => v.to_string(),
        ParameterValue::Ascii(s) | ParameterValue::Text(s) => format!("{:?}", s),
    }
}

fn describe_columns(columns: &[ColumnInfo]) -> Vec<String> {
    columns
        .iter()
        .map(|c| format!("{}:{}", c.name, c.column_type))
        .collect()
}

/// Returns whether the cells are comparable.
fn compare_data_set_headers(
    group: &str,
    left: &DataSetHeader,
    right: &DataSetHeader,
    options: &CompareOptions,
    report: &mut EquivalenceReport,
) -> bool {
    let scope = format!("{}/{}", group, left.name());
    compare_params(&scope, left.params(), right.params(), options, &mut report.differences);

    let mut comparable = true;
    if left.columns() != right.columns() {
        report.differences.push(Difference::Schema {
            group: group.to_string(),
            data_set: left.name().to_string(),
            left: describe_columns(left.columns()),
            right: describe_columns(right.columns()),
        });
        comparable = false;
    }
    if left.row_count() != right.row_count() {
        report.differences.push(Difference::RowCount {
            group: group.to_string(),
            data_set: left.name().to_string(),
            left: left.row_count(),
            right: right.row_count(),
        });
        comparable = false;
    }
    comparable
}

/// Running sums for a Pearson correlation over finite value pairs.
#[derive(Debug, Default)]
struct Pearson {
    n: f64,
    sx: f64,
    sy: f64,
    sxx: f64,
    syy: f64,
    sxy: f64,
}

impl Pearson {
    fn push(&mut self, x: f64, y: f64) {
        if !(x.is_finite() && y.is_finite()) {
            return;
        }
        self.n += 1.0;
        self.sx += x;
        self.sy += y;
        self.sxx += x * x;
        self.syy += y * y;
        self.sxy += x * y;
    }

    /// Undefined for constant columns; reported as 0.
    fn value(&self) -> f64 {
        let cov = self.n * self.sxy - self.sx * self.sy;
        let var = (self.n * self.sxx - self.sx * self.sx) * (self.n * self.syy - self.sy * self.sy);
        if var <= 0.0 {
            return 0.0;
        }
        cov / var.sqrt()
    }
}

#[derive(Debug, Default)]
struct ColumnTally {
    failures: u64,
    kept: Vec<(u64, String, String)>,
    correlation: Pearson,
}

fn compare_cells(
    left: &GenericData,
    right: &GenericData,
    group: &str,
    data_set: &str,
    options: &CompareOptions,
    report: &mut EquivalenceReport,
) -> Result<()> {
    let (mut l, mut r) = match (left.data_set(group, data_set)?, right.data_set(group, data_set)?) {
        (Some(l), Some(r)) => (l, r),
        _ => return Ok(()),
    };
    report.data_sets_compared += 1;

    let columns = l.header().columns().to_vec();
    let epsilons: Vec<f64> = columns
        .iter()
        .map(|c| {
            let path = format!("{}/{}/{}", group, data_set, c.name);
            options.epsilon_for(&[path.as_str(), c.name.as_str()])
        })
        .collect();
    let mut tallies: Vec<ColumnTally> = columns.iter().map(|_| ColumnTally::default()).collect();

    for row in 0..l.rows() {
        let (lv, rv) = (l.row(row)?, r.row(row)?);
        for (column, (a, b)) in lv.iter().zip(&rv).enumerate() {
            let tally = &mut tallies[column];
            let same = match (a, b) {
                (ColumnValue::Float(x), ColumnValue::Float(y)) => {
                    let (x, y) = (f64::from(*x), f64::from(*y));
                    tally.correlation.push(x, y);
                    options.within(x, y, epsilons[column])
                }
                _ => a == b,
            };
            if same {
                continue;
            }
            tally.failures += 1;
            if tally.kept.len() < options.max_reported {
                tally.kept.push((row, a.to_string(), b.to_string()));
            }
        }
    }

    let mut failures = 0u64;
    let mut reported = 0usize;
    for (column, (info, tally)) in columns.iter().zip(tallies).enumerate() {
        if tally.failures == 0 {
            continue;
        }
        if let (ColumnType::Float, Some(cutoff)) = (info.column_type, options.correlation_cutoff) {
            let correlation = tally.correlation.value();
            if correlation >= cutoff {
                debug!(
                    "{}/{} column {}: {} cells out of tolerance, correlation {} accepted",
                    group, data_set, column, tally.failures, correlation
                );
                continue;
            }
            report.differences.push(Difference::Correlation {
                group: group.to_string(),
                data_set: data_set.to_string(),
                column,
                correlation,
                cutoff,
            });
        }

        failures += tally.failures;
        for (row, a, b) in tally.kept {
            if reported >= options.max_reported {
                break;
            }
            reported += 1;
            report.differences.push(Difference::Cell {
                group: group.to_string(),
                data_set: data_set.to_string(),
                row,
                column,
                left: a,
                right: b,
            });
        }
    }

    let omitted = failures.saturating_sub(reported as u64);
    if omitted > 0 {
        report.differences.push(Difference::CellsOmitted {
            group: group.to_string(),
            data_set: data_set.to_string(),
            count: omitted,
        });
    }
    Ok(())
}
