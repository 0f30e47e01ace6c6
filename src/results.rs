/*!
Control the appearance of simulation result data

# Working with [`ResultsBuilder`]

## Examples

Creating a [`ResultsTable`] after running a simulation group:

```
use p2p_sim::prelude::*;

let sims = SimulationBuilder::new()
    .node_count(6)
    .duration(100.0)
    .add_attacker(Selfish::new())
    .attacker_power_iter([0.2, 0.3])
    .repeat_all(2)
    .build()
    .unwrap();

let results_builder = sims.run_all().unwrap();

let results = results_builder
    .average(Average::Median) // Take the median of repeated simulations' results
    .longest_chain_length()   // Include the reference longest chain length
    .mpu()                    // Include mining power utilization
    .format(Format::CSV)      // Output results as CSV
    .build();

println!("{}", results);
```

# Aggregating Results
Repeated simulations are grouped together. Columns whose value depends on the
outcome of a run are reduced with the chosen [`Average`], while columns
describing the run's parameters are taken from the first repeat.
*/

use std::{collections::BTreeSet, fmt::Display, num::NonZeroUsize};

use crate::{
    power::PowerValue, simulation::SimulationOutput, utils::NamedFn,
};

/// Floating point precision of results data.
pub const FLOAT_PRECISION_DIGITS: usize = 6;

/// Builder for [`ResultsTable`]. Typically produced by running a
/// [`SimulationGroup`](crate::simulation::SimulationGroup).
#[derive(Debug, Clone)]
pub struct ResultsBuilder {
    average: Average,
    columns: BTreeSet<Column>,
    data: Vec<SimulationOutput>,
    format: Format,
    repeated: NonZeroUsize,
}

/// Describes the appearance of a [`ResultsTable`] table as given by its
/// [`Display`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Comma-separated, without extra whitespace.
    CSV,
    /// Human-readable.
    #[default]
    PrettyPrint,
}

impl ResultsBuilder {
    /// Create a new [`ResultsBuilder`].
    pub(crate) fn new(
        data: Vec<SimulationOutput>,
        repeated: NonZeroUsize,
    ) -> Self {
        Self {
            data,
            repeated,
            average: Average::default(),
            columns: BTreeSet::default(),
            format: Format::default(),
        }
    }

    fn num_attackers(&self) -> usize {
        self.data.first().map_or(0, SimulationOutput::num_attackers)
    }

    /// Include every column other than constants and power functions.
    ///
    /// [`ResultsBuilder::average`] must still be called separately
    /// to create averaged data.
    pub fn all(self) -> Self {
        self.parameters()
            .strategy_names()
            .longest_chain_length()
            .blocks_in_tree()
            .mpu()
            .chain_share()
    }

    /// Average the results of repeated simulations based on the given
    /// [`Average`] type. For types other than [`Average::None`], a column
    /// describing the averaging method will be included in the results table.
    pub fn average(mut self, average: Average) -> Self {
        self.average = average;

        self
    }

    /// Include the "Blocks In Tree" column: every non-genesis block known to
    /// the reference ledger, forks included.
    pub fn blocks_in_tree(mut self) -> Self {
        self.columns.insert(Column::BlocksInTree);

        self
    }

    /// Include a "Attacker `X` Chain Share" column for each attacker `X`, and
    /// the "High Power Share" and "Low Power Share" columns, giving the
    /// fraction of the longest chain mined by each group.
    pub fn chain_share(mut self) -> Self {
        for k in 0..self.num_attackers() {
            self.columns.insert(Column::AttackerChainShare(k));
        }
        self.columns.insert(Column::HighPowerShare);
        self.columns.insert(Column::LowPowerShare);

        self
    }

    /// Include a column with title `title` which only contains the given
    /// value.
    pub fn constant<T>(mut self, title: T, value: f64) -> Self
    where
        T: Into<String>,
    {
        self.columns
            .insert(Column::Constant(NamedFn::new(title, move |_| value)));

        self
    }

    /// Extract the raw [`SimulationOutput`] data from this [`ResultsBuilder`].
    /// Useful for running custom statistical analysis.
    ///
    /// # Ordering
    /// Simulations are run in the same order their power values were given to
    /// [`SimulationBuilder`](crate::simulation::SimulationBuilder), with
    /// repeated runs being grouped together. The output data from this method
    /// follows this ordering as well.
    pub fn data(self) -> Vec<SimulationOutput> {
        self.data
    }

    /// Include the "Longest Chain Length" column in the results table.
    pub fn longest_chain_length(mut self) -> Self {
        self.columns.insert(Column::LongestChainLength);

        self
    }

    /// Include the "MPU Overall" column, and a "Attacker `X` MPU" column for
    /// each attacker `X`.
    pub fn mpu(mut self) -> Self {
        self.columns.insert(Column::MpuOverall);
        for k in 0..self.num_attackers() {
            self.columns.insert(Column::AttackerMpu(k));
        }

        self
    }

    /// Use the mining power of attacker `attacker` (1-based, in the order
    /// attackers were added) as input to `func`, and present the output in a
    /// table column with the given title.
    pub fn power_func<T, F>(
        mut self,
        attacker: usize,
        title: T,
        func: F,
    ) -> Self
    where
        T: Into<String>,
        F: Fn(PowerValue) -> f64 + Send + Sync + 'static,
    {
        let k = attacker.saturating_sub(1);
        self.columns
            .insert(Column::PowerFunction(k, NamedFn::new(title, func)));

        self
    }

    /// Include the "Nodes" and "Duration" columns.
    pub fn parameters(mut self) -> Self {
        self.columns.insert(Column::NodeCount);
        self.columns.insert(Column::Duration);

        self
    }

    /// Include a "Attacker `X` Strategy" column for each attacker `X`.
    pub fn strategy_names(mut self) -> Self {
        for k in 0..self.num_attackers() {
            self.columns.insert(Column::AttackerStrategy(k));
        }

        self
    }

    /// Specify the [`Format`] of the results table.
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;

        self
    }

    /// Create new [`ResultsTable`].
    pub fn build(mut self) -> ResultsTable {
        for k in 0..self.num_attackers() {
            self.columns.insert(Column::AttackerPower(k));
        }
        let ResultsBuilder { average, mut columns, data, format, repeated } =
            self;

        if average != Average::None {
            columns.insert(Column::AverageOf(average));
        }

        let columns = Vec::from_iter(columns);
        let rows = match average {
            Average::None => data
                .iter()
                .map(|output| {
                    columns.iter().map(|col| col.value(output)).collect()
                })
                .collect(),
            _ => data
                .chunks(repeated.get())
                .map(|outputs| {
                    columns
                        .iter()
                        .map(|col| col.average_value(average, outputs))
                        .collect()
                })
                .collect(),
        };

        ResultsTable { columns, format, rows }
    }
}

/// Formatted results from the completion of a
/// [`SimulationGroup`](crate::simulation::SimulationGroup). The results table
/// is given by the struct's [`Display`] implementation, as specified by
/// its [`Format`].
pub struct ResultsTable {
    columns: Vec<Column>,
    format: Format,
    rows: Vec<Vec<ColumnValue>>,
}

impl ResultsTable {
    const SEPARATOR_VERTICAL: char = '|';
    const SEPARATOR_HORIZONTAL: char = '-';

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn set_format(&mut self, format: Format) {
        self.format = format;
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

impl Display for ResultsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let titles: Vec<_> =
            self.columns.iter().map(|col| col.to_string()).collect();

        match self.format {
            Format::CSV => {
                write!(f, "{}", titles.join(","))?;

                for row in self.rows.iter() {
                    writeln!(f)?;

                    let row: Vec<_> =
                        row.iter().map(|val| val.to_string()).collect();

                    write!(f, "{}", row.join(","))?;
                }
            }
            Format::PrettyPrint => {
                let mut text_widths: Vec<_> =
                    titles.iter().map(|title| title.len()).collect();

                for row in self.rows.iter() {
                    for (i, val) in row.iter().enumerate() {
                        let val = val.to_string();
                        text_widths[i] = text_widths[i].max(val.len());
                    }
                }

                for (i, title) in titles.into_iter().enumerate() {
                    write!(
                        f,
                        " {:1$} {2}",
                        title,
                        text_widths[i],
                        Self::SEPARATOR_VERTICAL
                    )?;
                }
                writeln!(f)?;

                let total_width = text_widths.iter().map(|x| x + 3).sum();
                for _ in 0..total_width {
                    write!(f, "{}", Self::SEPARATOR_HORIZONTAL)?;
                }

                for row in self.rows.iter() {
                    writeln!(f)?;

                    for (i, val) in row.iter().enumerate() {
                        write!(
                            f,
                            " {:1$} {2}",
                            val.to_string(),
                            text_widths[i],
                            Self::SEPARATOR_VERTICAL
                        )?;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Methods of extracting an average/central value from a set of repeated
/// simulations.
///
/// In the process of creating an results table, the given averaging method is
/// only applied to the values of columns which depend on a run's outcome.
#[repr(u8)]
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Average {
    #[default]
    /// Include all repeated values.
    None,
    /// Arithmetic mean of all values.
    Mean,
    /// Median of all values.
    Median,
    /// Maximum of all values.
    Max,
    /// Minimum of all values.
    Min,
}

impl Average {
    fn apply(self, values: Vec<f64>) -> f64 {
        match self {
            Self::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Self::Median => crate::utils::median_of_floats(values),
            Self::Max => {
                values.into_iter().fold(f64::NEG_INFINITY, f64::max)
            }
            Self::Min => values.into_iter().fold(f64::INFINITY, f64::min),
            Self::None => f64::NAN,
        }
    }
}

/// Type of column that can appear in a data table. Attackers are indexed
/// from 0 here and shown 1-based in titles.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Column {
    // Variant order determines the order of columns in results tables:
    // https://doc.rust-lang.org/stable/std/cmp/trait.PartialOrd.html#derivable
    NodeCount,
    Duration,
    AttackerStrategy(usize),
    AttackerPower(usize),
    PowerFunction(usize, NamedFn<PowerValue, f64>),
    Constant(NamedFn<(), f64>),
    AverageOf(Average),
    LongestChainLength,
    BlocksInTree,
    MpuOverall,
    AttackerMpu(usize),
    AttackerChainShare(usize),
    HighPowerShare,
    LowPowerShare,
}

/// Value which corresponds to a [`Column`].
#[derive(Debug, Clone, PartialEq)]
enum ColumnValue {
    Text(String),
    Count(usize),
    Float(f64),
}

impl Column {
    /// Measured value of an outcome column, `None` for parameter columns.
    fn outcome(&self, output: &SimulationOutput) -> Option<f64> {
        let value = match self {
            Self::LongestChainLength => output.longest_chain_length() as f64,
            Self::BlocksInTree => output.blocks_in_tree() as f64,
            Self::MpuOverall => output.mpu_overall(),
            Self::AttackerMpu(k) => output.mpu_adversary(*k),
            Self::AttackerChainShare(k) => output.attacker_chain_share(*k),
            Self::HighPowerShare => output.honest_chain_share(true),
            Self::LowPowerShare => output.honest_chain_share(false),
            _ => return None,
        };

        Some(value)
    }

    fn value(&self, output: &SimulationOutput) -> ColumnValue {
        if let Some(value) = self.outcome(output) {
            return ColumnValue::Float(value);
        }

        let power_of = |k: usize| {
            output.power_dist.attackers().get(k).copied().unwrap_or_default()
        };

        match self {
            Self::NodeCount => ColumnValue::Count(output.config.node_count),
            Self::Duration => ColumnValue::Float(output.config.duration),
            Self::AttackerStrategy(k) => ColumnValue::Text(
                output
                    .attacker(*k)
                    .map(|node| node.strategy_name())
                    .unwrap_or_default(),
            ),
            Self::AttackerPower(k) => ColumnValue::Float(power_of(*k)),
            Self::PowerFunction(k, func) => {
                ColumnValue::Float(func.call(power_of(*k)))
            }
            Self::Constant(func) => ColumnValue::Float(func.call(())),
            Self::AverageOf(_) => ColumnValue::Count(1),
            _ => ColumnValue::Float(f64::NAN),
        }
    }

    fn average_value(
        &self,
        method: Average,
        data: &[SimulationOutput],
    ) -> ColumnValue {
        let Some(first) = data.first() else {
            return ColumnValue::Text(String::new());
        };
        if let Self::AverageOf(_) = self {
            return ColumnValue::Count(data.len());
        }
        if self.outcome(first).is_none() {
            return self.value(first);
        }

        let values = data.iter().filter_map(|out| self.outcome(out)).collect();

        ColumnValue::Float(method.apply(values))
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Self::AverageOf(method) => match method {
                Average::Mean => write!(f, "Mean Of"),
                Average::Median => write!(f, "Median Of"),
                Average::Max => write!(f, "Max Of"),
                Average::Min => write!(f, "Min Of"),
                Average::None => write!(f, "Runs"),
            },
            Self::NodeCount => write!(f, "Nodes"),
            Self::Duration => write!(f, "Duration"),
            Self::AttackerStrategy(k) => {
                write!(f, "Attacker {} Strategy", k + 1)
            }
            Self::AttackerPower(k) => write!(f, "Attacker {} Power", k + 1),
            Self::PowerFunction(_, func) => write!(f, "{}", func.name()),
            Self::Constant(func) => write!(f, "{}", func.name()),
            Self::LongestChainLength => write!(f, "Longest Chain Length"),
            Self::BlocksInTree => write!(f, "Blocks In Tree"),
            Self::MpuOverall => write!(f, "MPU Overall"),
            Self::AttackerMpu(k) => write!(f, "Attacker {} MPU", k + 1),
            Self::AttackerChainShare(k) => {
                write!(f, "Attacker {} Chain Share", k + 1)
            }
            Self::HighPowerShare => write!(f, "High Power Share"),
            Self::LowPowerShare => write!(f, "Low Power Share"),
        }
    }
}

impl Display for ColumnValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Self::Text(text) => write!(f, "{}", text),
            Self::Count(count) => write!(f, "{}", count),
            Self::Float(value) => {
                write!(f, "{:.1$}", value, FLOAT_PRECISION_DIGITS)
            }
        }
    }
}

/// Returns an instance of the ideal Selfish Miner revenue function from Eyal
/// and Sirer's paper which can be used as input to
/// [`ResultsBuilder::power_func`]. `gamma` is the fraction of honest power
/// which mines on the attacker's block during a tie.
pub fn selfish_revenue(gamma: f64) -> impl Fn(PowerValue) -> f64 {
    move |a: PowerValue| -> f64 {
        (a * (1.0 - a).powi(2) * (4.0 * a + gamma * (1.0 - 2.0 * a))
            - a.powi(3))
            / (1.0 - a * (1.0 + a * (2.0 - a)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{miner::Selfish, simulation::SimulationBuilder};

    fn results(average: Average) -> ResultsTable {
        SimulationBuilder::new()
            .node_count(6)
            .duration(120.0)
            .add_attacker(Selfish::new())
            .attacker_power_iter([0.25, 0.35])
            .repeat_all(3)
            .build()
            .unwrap()
            .run_all()
            .unwrap()
            .all()
            .constant("Gamma", 0.0)
            .power_func(1, "Ideal SM Revenue", selfish_revenue(0.0))
            .average(average)
            .format(Format::CSV)
            .build()
    }

    #[test]
    fn one_row_per_run_without_averaging() {
        let table = results(Average::None);
        assert_eq!(table.num_rows(), 6);

        let csv = table.to_string();
        let header = csv.lines().next().unwrap();
        assert!(header.starts_with("Nodes,Duration,Attacker 1 Strategy,"));
        assert!(header.contains("Attacker 1 MPU"));
        assert!(!header.contains("Mean Of"));
        assert_eq!(csv.lines().count(), 7);
        let first_row = csv.lines().nth(1).unwrap();
        assert!(first_row.starts_with("6,120.000000,Selfish,"));
    }

    #[test]
    fn named_columns_use_their_titles() {
        let csv = results(Average::None).to_string();
        let header: Vec<_> = csv.lines().next().unwrap().split(',').collect();
        let gamma = header.iter().position(|&t| t == "Gamma").unwrap();
        let ideal =
            header.iter().position(|&t| t == "Ideal SM Revenue").unwrap();
        assert!(ideal < gamma);

        for row in csv.lines().skip(1) {
            let row: Vec<_> = row.split(',').collect();
            assert_eq!(row[gamma].parse::<f64>().unwrap(), 0.0);
            assert!(row[ideal].parse::<f64>().unwrap() > 0.0);
        }
    }

    #[test]
    fn repeats_collapse_when_averaged() {
        let table = results(Average::Mean);
        assert_eq!(table.num_rows(), 2);

        let csv = table.to_string();
        let header: Vec<_> = csv.lines().next().unwrap().split(',').collect();
        let runs =
            header.iter().position(|&title| title == "Mean Of").unwrap();
        for row in csv.lines().skip(1) {
            assert_eq!(row.split(',').nth(runs), Some("3"));
        }
    }

    #[test]
    fn pretty_print_aligns_columns() {
        let mut table = results(Average::Median);
        table.set_format(Format::PrettyPrint);

        let text = table.to_string();
        let widths: Vec<_> = text
            .lines()
            .filter(|line| !line.starts_with('-'))
            .map(str::len)
            .collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn averages() {
        let values = vec![1.0, 4.0, 2.0, 3.0];
        assert_eq!(Average::Mean.apply(values.clone()), 2.5);
        assert_eq!(Average::Median.apply(values.clone()), 2.5);
        assert_eq!(Average::Max.apply(values.clone()), 4.0);
        assert_eq!(Average::Min.apply(values), 1.0);
    }

    #[test]
    fn selfish_revenue_matches_honest_share_at_a_third() {
        // With gamma = 0, selfish mining breaks even at a third of the power.
        let revenue = selfish_revenue(0.0)(1.0 / 3.0);
        assert!((revenue - 1.0 / 3.0).abs() < 1e-9);
    }
}
