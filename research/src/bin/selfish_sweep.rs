use std::time::Instant;

use anyhow::Result;
use p2p_sim::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

const GAMMA: f64 = 0.0;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let start = Instant::now();

    let simulation = SimulationBuilder::new()
        .node_count(20)
        .slow_fraction(0.3)
        .low_power_fraction(0.5)
        .mean_txn_interval(2.0)
        .mean_block_interval(30.0)
        .duration(20_000.0)
        .repeat_all(10)
        .add_attacker(Selfish::new())
        .attacker_power_iter((10..=45usize).step_by(5).percent())
        .build()?;

    let results = simulation
        .run_all()?
        .average(Average::Mean)
        .all()
        .power_func(
            1,
            format!("Ideal SM Revenue (gamma={})", GAMMA),
            selfish_revenue(GAMMA),
        )
        .format(Format::CSV)
        .build();

    println!("{}", results);

    info!(secs = start.elapsed().as_secs_f64(), "Sweep finished");
    Ok(())
}
