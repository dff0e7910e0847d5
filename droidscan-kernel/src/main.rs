/**
 * DROIDSCAN - Point d'entrée du service
 *
 * RÔLE : Assemble les composants par injection explicite (aucun singleton global) :
 * config -> passerelle adb -> registry de marques -> bus d'événements -> tracker + scanner -> HTTP.
 * Le polling démarre automatiquement si `polling.auto_start`.
 */

use anyhow::Context;
use droidscan_kernel::brands::{BrandRegistry, BrandResolver};
use droidscan_kernel::config::load_config;
use droidscan_kernel::events::{EventBus, EventSink};
use droidscan_kernel::gateway::{AdbGateway, DeviceGateway};
use droidscan_kernel::http::{self, AppState};
use droidscan_kernel::mqtt::MqttMirror;
use droidscan_kernel::presence::{PollingOptions, PresenceTracker};
use droidscan_kernel::scanner::Scanner;
use droidscan_kernel::store::{JsonScanStore, ScanStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const EVENT_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env optionnel
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("droidscan=info,droidscan_kernel=info")),
        )
        .init();

    let cfg = load_config().await;

    let gateway: Arc<dyn DeviceGateway> =
        Arc::new(AdbGateway::new(&cfg.adb.command).context("invalid adb command")?);
    let resolver = BrandResolver::new(gateway.clone(), Arc::new(BrandRegistry::with_builtin_brands()));
    info!("[droidscan] brands: {:?}", resolver.registry().known_brands());

    let store: Arc<dyn ScanStore> = Arc::new(
        JsonScanStore::open(&cfg.store.path)
            .with_context(|| format!("failed to open scan store at {}", cfg.store.path))?,
    );

    let mut events = EventBus::new(EVENT_CAPACITY);
    if let Some(mqtt) = &cfg.mqtt {
        info!("[droidscan] mirroring events to mqtt://{}:{}", mqtt.host, mqtt.port);
        events = events.with_mirror(Arc::new(MqttMirror::spawn(mqtt)));
    }
    let sink: Arc<dyn EventSink> = Arc::new(events.clone());

    let tracker = Arc::new(PresenceTracker::new(
        gateway.clone(),
        resolver.clone(),
        sink.clone(),
        PollingOptions::from(&cfg.polling),
    ));
    let scanner = Arc::new(Scanner::new(gateway, resolver, store, sink));

    if cfg.polling.auto_start {
        tracker.start_polling().await;
    }

    let app = http::build_router(AppState { tracker, scanner, events });

    let listener = TcpListener::bind(&cfg.http.bind)
        .await
        .with_context(|| format!("failed to bind {}", cfg.http.bind))?;
    info!("[droidscan] listening on http://{}", cfg.http.bind);
    axum::serve(listener, app).await.context("http server failed")?;
    Ok(())
}
