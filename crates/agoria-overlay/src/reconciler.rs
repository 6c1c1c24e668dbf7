//! Background loop that keeps content-addressed records fresh in the DHT.
//! Kademlia records expire; anything this node is the authority for needs
//! periodic re-publication or it silently falls out of the network.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::network::OverlayCommand;

pub trait ReconcileSource: Send + Sync {
    /// Return every (content key, bytes) pair this node should keep
    /// re-publishing.
    fn snapshot(&self) -> Vec<(String, Vec<u8>)>;
}

pub async fn run_reconciler(
    command_tx: mpsc::Sender<OverlayCommand>,
    source: Arc<dyn ReconcileSource>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        for (key, value) in source.snapshot() {
            if command_tx
                .send(OverlayCommand::PutRecord { key, value })
                .await
                .is_err()
            {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedSource(Mutex<Vec<(String, Vec<u8>)>>);

    impl ReconcileSource for FixedSource {
        fn snapshot(&self) -> Vec<(String, Vec<u8>)> {
            self.0.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn reconciler_republishes_every_tick() {
        let (tx, mut rx) = mpsc::channel(8);
        let source = Arc::new(FixedSource(Mutex::new(vec![("sha256:a".to_string(), b"x".to_vec())])));

        let handle = tokio::spawn(run_reconciler(tx, source, Duration::from_millis(10)));
        let cmd = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match cmd {
            OverlayCommand::PutRecord { key, value } => {
                assert_eq!(key, "sha256:a");
                assert_eq!(value, b"x");
            }
            _ => panic!("expected PutRecord"),
        }
        handle.abort();
    }
}
