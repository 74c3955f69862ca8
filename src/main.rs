use database::LocalStore;
use env_logger::Env;
use live::{
    LiveGameRuntime, LogNotifier, MemoryRemoteStore, MonitorSignal, PostgresRemoteStore,
    RemoteStore,
};
use log::{error, info, warn};
use std::env;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    color_eyre::install().unwrap();

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let data_dir = env::var("MATCHDAY_DATA_DIR").unwrap_or_else(|_| String::from(".matchday"));

    let store = match LocalStore::open(&data_dir) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!("cannot open data directory {}: {}", data_dir, err);
            return;
        }
    };

    let user_id = match env::var("MATCHDAY_USER_ID").ok().map(|raw| Uuid::parse_str(&raw)) {
        Some(Ok(user_id)) => user_id,
        Some(Err(err)) => {
            error!("MATCHDAY_USER_ID is not a valid uuid: {}", err);
            return;
        }
        None => {
            warn!("MATCHDAY_USER_ID is not set, generating a throwaway identity");
            Uuid::new_v4()
        }
    };

    let remote: Arc<dyn RemoteStore> = match env::var("DATABASE_URL") {
        Ok(url) => match PostgresRemoteStore::connect(&url).await {
            Ok(remote) => Arc::new(remote),
            Err(err) => {
                error!("cannot connect to the remote store: {}", err);
                return;
            }
        },
        Err(_) => {
            warn!("DATABASE_URL is not set, mirroring to an in-memory store");
            Arc::new(MemoryRemoteStore::new())
        }
    };

    let (runtime, mut handles) = LiveGameRuntime::new(store, remote, user_id, Arc::new(LogNotifier));

    // Headless stand-in for the confirmation and completion surfaces:
    // log what the monitor raises. Keeps the handles (and with them the
    // visibility channel) alive for the lifetime of the loops.
    tokio::spawn(async move {
        while let Some(signal) = handles.signals.recv().await {
            match signal {
                MonitorSignal::SubstitutionsDue(due) => {
                    info!(
                        "{} substitution(s) due at {}s of half {}",
                        due.total(),
                        due.time,
                        due.half
                    );
                }
                MonitorSignal::FullTime(finished) => {
                    let (own, opponent) = finished.score();
                    info!("full time: {}-{}", own, opponent);
                }
            }
        }
    });

    info!("matchday background service started (data dir: {})", data_dir);

    runtime.run().await;
}
