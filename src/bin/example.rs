use std::error::Error;

use p2p_sim::prelude::*;

/// Runs one small network with a selfish attacker and prints the block
/// arrival log of the first node and of the attacker.
fn main() -> Result<(), Box<dyn Error>> {
    let output = SimulationBuilder::new()
        .node_count(10)
        .mean_block_interval(10.0)
        .duration(500.0)
        .add_attacker(Selfish::new())
        .attacker_powers([0.3])
        .seed(7)
        .build()?
        .run_all()?
        .data()
        .remove(0);

    let attacker = NodeId::from(output.config.node_count - 1);
    for node in [NodeId::from(0), attacker] {
        if let Some(csv) = output.arrival_csv(node) {
            println!("# node {}\n{}\n", node, csv);
        }
    }

    println!(
        "longest chain: {} blocks, attacker share {:.4}, MPU {:.4}",
        output.longest_chain_length(),
        output.attacker_chain_share(0),
        output.mpu_adversary(0)
    );

    Ok(())
}
