use anyhow::Result;
use p2p_sim::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let results = SimulationBuilder::new()
        .node_count(25)
        .slow_fraction(0.5)
        .low_power_fraction(0.5)
        .mean_txn_interval(1.0)
        .mean_block_interval(15.0)
        .duration(5_000.0)
        .repeat_all(20)
        .build()?
        .run_all()?
        .average(Average::Median)
        .all()
        .build();

    println!("{}", results);
    Ok(())
}
