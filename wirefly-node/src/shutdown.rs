//! Cooperative stop signal shared by the engine and the UDP receive task.

use tokio::sync::watch;

/// Resolves once `true` is sent or every sender is gone.
pub(crate) async fn requested(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
