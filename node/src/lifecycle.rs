//! Consensus lifecycle logging.
//!
//! While syncing, head changes are logged once every [`SYNC_LOG_INTERVAL`]
//! blocks. Once consensus is established every head change is logged, and the
//! established transition itself is reported exactly once.

use poolnode_core::{ChainSnapshot, Consensus, ConsensusType, PeerAddress};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Head heights logged while syncing are multiples of this
pub const SYNC_LOG_INTERVAL: u32 = 100;

/// Where the node is in catching up with the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusPhase {
    /// No chain events seen yet
    Starting,
    /// Receiving blocks, not caught up
    Syncing,
    /// Caught up with the network
    Established,
}

/// Turns consensus events into log lines.
#[derive(Debug)]
pub struct LifecycleLogger {
    consensus_type: ConsensusType,
    started_at: Instant,
    phase: ConsensusPhase,
}

impl LifecycleLogger {
    /// Creates a logger; `started_at` is when the process started.
    pub fn new(consensus_type: ConsensusType, started_at: Instant) -> Self {
        Self {
            consensus_type,
            started_at,
            phase: ConsensusPhase::Starting,
        }
    }

    /// Current phase
    pub fn phase(&self) -> ConsensusPhase {
        self.phase
    }

    /// Handles a head change. Returns whether it was logged.
    pub fn on_head_changed(&mut self, height: u32) -> bool {
        if self.phase == ConsensusPhase::Starting {
            self.phase = ConsensusPhase::Syncing;
        }

        if self.phase == ConsensusPhase::Established || height % SYNC_LOG_INTERVAL == 0 {
            info!(
                target: "poolnode::lifecycle",
                height,
                established = self.phase == ConsensusPhase::Established,
                "now at block {}",
                height
            );
            return true;
        }
        false
    }

    /// Handles a joined peer.
    pub fn on_peer_joined(&self, peer: &PeerAddress) {
        info!(target: "poolnode::lifecycle", %peer, "connected to peer");
    }

    /// Handles the established transition. Returns `false` if it was already seen.
    pub fn on_established(&mut self, snapshot: ChainSnapshot) -> bool {
        if self.phase == ConsensusPhase::Established {
            return false;
        }
        self.phase = ConsensusPhase::Established;

        let elapsed = self.started_at.elapsed().as_secs_f64();
        info!(
            target: "poolnode::lifecycle",
            consensus = %self.consensus_type,
            elapsed_secs = elapsed,
            "blockchain {}-consensus established in {:.2}s",
            self.consensus_type,
            elapsed
        );
        info!(
            target: "poolnode::lifecycle",
            height = snapshot.height,
            total_work = %snapshot.total_work,
            head_hash = %snapshot.head_hash,
            "current state"
        );
        true
    }
}

/// Spawns the task feeding consensus events into `logger` until shutdown.
pub fn spawn_event_loop(
    consensus: Arc<dyn Consensus>,
    mut logger: LifecycleLogger,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let blockchain = consensus.blockchain();
    let network = consensus.network();
    let mut head_rx = blockchain.subscribe_head();
    let mut peer_rx = network.subscribe_peers();
    let mut established_rx = consensus.subscribe_established();

    tokio::spawn(async move {
        // A flag set before subscribing is not reported as a change.
        if *established_rx.borrow_and_update() {
            logger.on_established(blockchain.snapshot());
        }
        let mut established_open = true;

        loop {
            tokio::select! {
                biased;

                changed = established_rx.changed(), if established_open => match changed {
                    Ok(()) => {
                        if *established_rx.borrow_and_update() {
                            logger.on_established(blockchain.snapshot());
                        }
                    }
                    Err(_) => established_open = false,
                },
                event = head_rx.recv() => match event {
                    Ok(head) => {
                        // The flag may flip between polls; read it live before applying the policy.
                        if *established_rx.borrow() {
                            logger.on_established(blockchain.snapshot());
                        }
                        logger.on_head_changed(head.height);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(target: "poolnode::lifecycle", skipped, "head events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        error!(target: "poolnode::lifecycle", "head event channel closed");
                        break;
                    }
                },
                event = peer_rx.recv() => match event {
                    Ok(joined) => logger.on_peer_joined(&joined.peer),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(target: "poolnode::lifecycle", skipped, "peer events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        error!(target: "poolnode::lifecycle", "peer event channel closed");
                        break;
                    }
                },
                _ = shutdown_rx.recv() => {
                    debug!(target: "poolnode::lifecycle", "event loop shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use poolnode_core::{GenesisConfig, Hash, KeyPair, LocalConsensus, NetworkConfig};
    use std::io;
    use std::time::Duration;
    use tracing_subscriber::fmt::MakeWriter;

    fn snapshot(height: u32) -> ChainSnapshot {
        ChainSnapshot {
            height,
            total_work: height as u128,
            head_hash: Hash::zero(),
        }
    }

    #[test]
    fn test_syncing_logs_every_hundredth_block() {
        let mut logger = LifecycleLogger::new(ConsensusType::Full, Instant::now());
        assert_eq!(logger.phase(), ConsensusPhase::Starting);

        let logged: Vec<u32> = (1..=250).filter(|h| logger.on_head_changed(*h)).collect();
        assert_eq!(logged, vec![100, 200]);
        assert_eq!(logger.phase(), ConsensusPhase::Syncing);
    }

    #[test]
    fn test_established_logs_every_block() {
        let mut logger = LifecycleLogger::new(ConsensusType::Light, Instant::now());
        logger.on_head_changed(1);
        assert!(logger.on_established(snapshot(1)));
        assert_eq!(logger.phase(), ConsensusPhase::Established);
        assert!((2..=10).all(|h| logger.on_head_changed(h)));
    }

    #[test]
    fn test_established_reported_once() {
        let mut logger = LifecycleLogger::new(ConsensusType::Nano, Instant::now());
        assert!(logger.on_established(snapshot(5)));
        assert!(!logger.on_established(snapshot(6)));
        assert!(!logger.on_established(snapshot(7)));
        assert_eq!(logger.phase(), ConsensusPhase::Established);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }

        fn count(&self, needle: &str) -> usize {
            self.text().matches(needle).count()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    fn local_consensus() -> Arc<LocalConsensus> {
        let genesis = GenesisConfig::for_profile("dev").unwrap();
        Arc::new(LocalConsensus::new(
            ConsensusType::Full,
            &NetworkConfig::dumb(KeyPair::generate()),
            &genesis,
        ))
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn stop(shutdown_tx: broadcast::Sender<()>, handle: JoinHandle<()>) {
        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_event_loop_stops_on_shutdown() {
        let consensus = local_consensus();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = spawn_event_loop(
            consensus.clone(),
            LifecycleLogger::new(ConsensusType::Full, Instant::now()),
            shutdown_rx,
        );

        consensus.push_block(1);
        consensus.mark_established();
        consensus.push_block(1);

        stop(shutdown_tx, handle).await;
    }

    #[tokio::test]
    async fn test_event_loop_logs_head_right_after_established() {
        let (logs, _guard) = capture();

        for _ in 0..50 {
            let consensus = local_consensus();
            let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
            let handle = spawn_event_loop(
                consensus.clone(),
                LifecycleLogger::new(ConsensusType::Full, Instant::now()),
                shutdown_rx,
            );

            consensus.mark_established();
            consensus.push_block(1);
            settle().await;
            stop(shutdown_tx, handle).await;
        }

        assert_eq!(logs.count("now at block 2"), 50, "{}", logs.text());
        assert_eq!(logs.count("consensus established"), 50);
    }

    #[tokio::test]
    async fn test_event_loop_switches_policy_when_established_arrives() {
        let (logs, _guard) = capture();
        let consensus = local_consensus();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = spawn_event_loop(
            consensus.clone(),
            LifecycleLogger::new(ConsensusType::Full, Instant::now()),
            shutdown_rx,
        );

        consensus.push_block(1);
        settle().await;
        consensus.mark_established();
        consensus.mark_established();
        settle().await;
        consensus.push_block(1);
        consensus.mark_established();
        consensus.push_block(1);
        settle().await;
        stop(shutdown_tx, handle).await;

        let text = logs.text();
        assert!(!text.contains("now at block 2"), "{}", text);
        assert!(text.contains("now at block 3"), "{}", text);
        assert!(text.contains("now at block 4"), "{}", text);
        assert_eq!(logs.count("consensus established"), 1, "{}", text);
    }
}
