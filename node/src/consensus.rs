//! Consensus engine selection.

use poolnode_core::{Consensus, ConsensusFactory, ConsensusType, CoreError, GenesisConfig, NetworkConfig};
use std::sync::Arc;
use tracing::info;

use crate::Result;

/// Builds exactly one consensus engine of `consensus_type`, bound to `network`.
pub async fn select_consensus(
    factory: &dyn ConsensusFactory,
    consensus_type: ConsensusType,
    network: &NetworkConfig,
    genesis: &GenesisConfig,
) -> Result<Arc<dyn Consensus>> {
    let consensus = match consensus_type {
        ConsensusType::Full => factory.full(network, genesis).await?,
        ConsensusType::Light => factory.light(network, genesis).await?,
        ConsensusType::Nano => factory.nano(network, genesis).await?,
    };

    if consensus.consensus_type() != consensus_type {
        return Err(CoreError::Consensus(format!(
            "requested {} consensus, factory built {}",
            consensus_type,
            consensus.consensus_type()
        ))
        .into());
    }
    if consensus.accounts().is_some() != consensus_type.has_accounts() {
        return Err(CoreError::Consensus(format!(
            "{} consensus must {}expose account state",
            consensus_type,
            if consensus_type.has_accounts() { "" } else { "not " }
        ))
        .into());
    }

    info!(
        target: "poolnode::consensus",
        consensus = %consensus_type,
        height = consensus.blockchain().height(),
        "consensus engine selected"
    );
    Ok(consensus)
}
