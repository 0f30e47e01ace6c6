use anyhow::{Context, Result};
use p2p_sim::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let data = SimulationBuilder::new()
        .node_count(30)
        .mean_txn_interval(2.0)
        .mean_block_interval(20.0)
        .duration(10_000.0)
        .add_attacker(Selfish::new())
        .add_attacker(Selfish::new())
        .attacker_powers([0.25, 0.25])
        .attacker_powers([0.35, 0.15])
        .seed(2024)
        .build()?
        .run_all()?
        .data();

    for output in &data {
        println!(
            "powers {:?}: longest chain {}, MPU overall {:.4}",
            output.power_dist.attackers(),
            output.longest_chain_length(),
            output.mpu_overall()
        );

        for k in 0..output.num_attackers() {
            let attacker =
                output.attacker(k).context("attacker missing from output")?;
            println!(
                "  attacker {} (node {}): mined {}, in chain {}, MPU {:.4}",
                k + 1,
                attacker.id(),
                output.blocks_mined_by(attacker.id()),
                output.chain_blocks_by(attacker.id()),
                output.mpu_adversary(k)
            );
        }
    }

    Ok(())
}
