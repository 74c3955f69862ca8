mod actions;
mod monitor;
mod notify;
mod remote;
mod sync;

pub use actions::GameActions;
pub use monitor::{MonitorCommand, MonitorHandle, MonitorSignal, TriggerMonitor, Visibility};
pub use notify::{LocalNotifier, LogNotifier, NotificationDispatcher};
pub use remote::{
    LiveGameRecord, MemoryRemoteStore, NotificationKind, NotificationRecord, PostgresRemoteStore,
    RemoteStore, RemoteStoreError,
};
pub use sync::{StateSynchronizer, SyncHandle, SyncStatus};

use database::LocalStore;
use log::info;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// The two background loops of a live game, wired together.
///
/// The monitor and the synchronizer are independently scheduled and are
/// not transactional with each other: each reads the persisted records at
/// its own cadence and tolerates interleaved writes from the executor and
/// the editor view.
pub struct LiveGameRuntime {
    monitor: TriggerMonitor,
    synchronizer: StateSynchronizer,
}

/// Channels the host application uses to talk to the running loops.
pub struct RuntimeHandles {
    /// Due-substitution and full-time signals for the external UI surfaces.
    pub signals: mpsc::UnboundedReceiver<MonitorSignal>,
    pub monitor: MonitorHandle,
    /// Host-side visibility signal; flip to `Background` on suspension.
    pub visibility: watch::Sender<Visibility>,
    /// Remote mirror status indicator.
    pub sync_status: watch::Receiver<SyncStatus>,
}

impl LiveGameRuntime {
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteStore>,
        user_id: Uuid,
        notifier: Arc<dyn LocalNotifier>,
    ) -> (Self, RuntimeHandles) {
        let (visibility_tx, visibility_rx) = watch::channel(Visibility::Foreground);
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SyncStatus::Idle);

        let dispatcher = Arc::new(NotificationDispatcher::new(
            user_id,
            Arc::clone(&remote),
            notifier,
        ));

        let (synchronizer, sync_handle) =
            StateSynchronizer::new(Arc::clone(&store), remote, user_id, status_tx);

        let (monitor, monitor_handle) = TriggerMonitor::new(
            store,
            dispatcher,
            signal_tx,
            visibility_rx,
            sync_handle,
        );

        let runtime = LiveGameRuntime {
            monitor,
            synchronizer,
        };

        let handles = RuntimeHandles {
            signals: signal_rx,
            monitor: monitor_handle,
            visibility: visibility_tx,
            sync_status: status_rx,
        };

        (runtime, handles)
    }

    /// Runs both loops until their control channels close.
    pub async fn run(self) {
        info!("live game runtime started");

        tokio::join!(self.monitor.run(), self.synchronizer.run());
    }
}
