//! Active wallet resolution.

use poolnode_wallets::{Wallet, WalletStore};
use tracing::{info, warn};

use crate::Result;

/// Resolves the wallet the node runs with.
///
/// Without a seed the store's default is used; the store creates one when it
/// has none. With a seed the derived wallet is stored and unconditionally made
/// the default, replacing any previous default.
pub async fn resolve_wallet(store: &dyn WalletStore, seed: Option<&str>) -> Result<Wallet> {
    let Some(seed) = seed else {
        let wallet = store.get_default().await?;
        info!(
            target: "poolnode::wallet",
            address = %wallet.address(),
            "loaded default wallet"
        );
        return Ok(wallet);
    };

    let wallet = Wallet::load_plain(seed)?;
    if let Some(previous) = store.default_address().await? {
        if previous != wallet.address() {
            warn!(
                target: "poolnode::wallet",
                previous = %previous,
                address = %wallet.address(),
                "configured wallet seed replaces the existing default wallet"
            );
        }
    }

    store.put(&wallet).await?;
    store.set_default(&wallet.address()).await?;
    info!(
        target: "poolnode::wallet",
        address = %wallet.address(),
        "loaded wallet from seed"
    );
    Ok(wallet)
}
