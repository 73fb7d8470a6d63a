//! HTTP surface: the device feed on `/metrics`, exporter self-metrics and the
//! root redirect.

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use dvb_registry::{render_frontend, MetricsHub, Registry};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub hub: MetricsHub,
    pub scrape_timeout: Duration,
}

impl AppState {
    pub fn new(registry: Registry, hub: MetricsHub, scrape_timeout: Duration) -> Self {
        hub.set_frontends(registry.len());
        Self {
            registry: Arc::new(registry),
            hub,
            scrape_timeout,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_redirect))
        .route("/metrics", get(metrics_handler))
        .route("/exporter/metrics", get(exporter_metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("dvb-exporter listening on {}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("dvb-exporter shutting down");
    Ok(())
}

async fn root_redirect() -> Redirect {
    Redirect::temporary("/metrics")
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    state.hub.exporter.scrapes.inc();
    let body = scrape(&state).await;
    (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response()
}

async fn exporter_metrics_handler(State(state): State<AppState>) -> Response {
    match state.hub.encode_text() {
        Ok(text) => (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_FORMAT)], text).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode exporter metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Poll every frontend on its own blocking task and join the rendered blocks in
/// registry order. A device that times out or panics contributes nothing.
///
/// A timed-out poll keeps its blocking thread until the driver call returns, and
/// the device stays claimed until then. Later scrapes skip a claimed device instead
/// of stacking more threads on it.
pub async fn scrape(state: &AppState) -> String {
    let mut polls = Vec::with_capacity(state.registry.len());
    for entry in state.registry.frontends() {
        let id = entry.id;
        let Some(claim) = entry.try_begin_poll() else {
            warn!(
                adapter = id.adapter,
                frontend = id.frontend,
                "previous poll still running, skipping frontend"
            );
            state.hub.record_timeout();
            continue;
        };
        let entry = entry.clone();
        let timeout = state.scrape_timeout;
        let poll = tokio::spawn(async move {
            let job = tokio::task::spawn_blocking(move || {
                let _claim = claim;
                render_frontend(&entry)
            });
            tokio::time::timeout(timeout, job).await
        });
        polls.push((id, poll));
    }

    let mut body = String::new();
    for (id, poll) in polls {
        match poll.await {
            Ok(Ok(Ok((text, report)))) => {
                body.push_str(&text);
                state.hub.record(&report);
            }
            Ok(Ok(Err(e))) => {
                error!(adapter = id.adapter, frontend = id.frontend, error = %e, "frontend poll failed");
            }
            Ok(Err(_)) => {
                warn!(
                    adapter = id.adapter,
                    frontend = id.frontend,
                    timeout_ms = state.scrape_timeout.as_millis() as u64,
                    "frontend poll timed out"
                );
                state.hub.record_timeout();
            }
            Err(e) => {
                error!(adapter = id.adapter, frontend = id.frontend, error = %e, "frontend poll task failed");
            }
        }
    }
    body
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received terminate signal, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request};
    use dvb_frontend::{
        Frontend, FrontendError, FrontendStatus, MockFrontend, Result as FeResult,
    };
    use dvb_registry::{DeviceIdentity, FrontendEntry};
    use std::path::Path;
    use tower::ServiceExt;

    struct PanickingFrontend;

    impl Frontend for PanickingFrontend {
        fn open_ro(_path: &Path) -> FeResult<Self> {
            Ok(Self)
        }
        fn status(&self) -> FeResult<FrontendStatus> {
            panic!("driver bug")
        }
        fn ber(&self) -> FeResult<u32> {
            Ok(0)
        }
        fn snr(&self) -> FeResult<u16> {
            Ok(0)
        }
        fn signal_strength(&self) -> FeResult<u16> {
            Ok(0)
        }
        fn uncorrected_blocks(&self) -> FeResult<u32> {
            Ok(0)
        }
    }

    fn entry(adapter: u32, frontend: u32, device: Arc<dyn Frontend>) -> FrontendEntry {
        FrontendEntry::new(
            DeviceIdentity::new(adapter, frontend),
            format!("/dev/dvb/adapter{adapter}/frontend{frontend}"),
            device,
        )
    }

    fn state_with(entries: Vec<FrontendEntry>, timeout: Duration) -> AppState {
        let mut reg = Registry::default();
        for e in entries {
            let adapter = format!("/dev/dvb/adapter{}", e.id.adapter);
            reg.insert(adapter, e);
        }
        let hub = MetricsHub::new().unwrap();
        AppState::new(reg, hub, timeout)
    }

    async fn fetch(app: &Router, uri: &str) -> (StatusCode, HeaderMap, String) {
        let resp = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn scanned_device_end_to_end() {
        let base = tempfile::tempdir().unwrap();
        let adapter = base.path().join("adapter0");
        std::fs::create_dir_all(&adapter).unwrap();
        std::fs::write(adapter.join("frontend0"), b"").unwrap();

        let reg = Registry::scan_with(base.path(), |path| {
            let fe = MockFrontend::empty(path)
                .with_status(Ok(FrontendStatus::HAS_LOCK))
                .with_snr(Ok(123));
            Ok(Arc::new(fe) as Arc<dyn Frontend>)
        })
        .unwrap();
        let app = router(AppState::new(
            reg,
            MetricsHub::new().unwrap(),
            Duration::from_secs(5),
        ));

        let (status, headers, body) = fetch(&app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        assert!(body.contains("dvb_fe_has_lock{adapter=\"0\",frontend=\"0\"} 1\n"));
        // 123 * 100 / 65535 truncates to 0
        assert!(body.contains("dvb_fe_snr_percent{adapter=\"0\",frontend=\"0\"} 0\n"));
        assert!(body.contains("# TYPE dvb_fe_snr_percent gauge\n"));
    }

    #[tokio::test]
    async fn no_adapters_gives_empty_body() {
        let app = router(state_with(vec![], Duration::from_secs(5)));
        let (status, _, body) = fetch(&app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn root_redirects_to_metrics() {
        let app = router(state_with(vec![], Duration::from_secs(5)));
        let (status, headers, _) = fetch(&app, "/").await;
        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(headers[header::LOCATION], "/metrics");
    }

    #[tokio::test]
    async fn broken_device_does_not_blank_others() {
        let broken = MockFrontend::locked("/dev/dvb/adapter0/frontend0")
            .with_status(Err(FrontendError::Io("EIO".into())));
        let healthy = MockFrontend::locked("/dev/dvb/adapter1/frontend0");
        let app = router(state_with(
            vec![entry(0, 0, Arc::new(broken)), entry(1, 0, Arc::new(healthy))],
            Duration::from_secs(5),
        ));

        let (status, _, body) = fetch(&app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("dvb_fe_has_lock{adapter=\"0\""));
        assert!(body.contains("dvb_fe_ber{adapter=\"0\",frontend=\"0\"} 0\n"));
        assert!(body.contains("dvb_fe_has_lock{adapter=\"1\",frontend=\"0\"} 1\n"));

        let (_, _, own) = fetch(&app, "/exporter/metrics").await;
        assert!(own.contains("dvb_exporter_scrapes_total 1"));
        assert!(own.contains("dvb_exporter_reading_errors_total 1"));
        assert!(own.contains("dvb_exporter_frontends 2"));
    }

    #[tokio::test]
    async fn hung_device_times_out_alone() {
        let slow = MockFrontend::empty("/dev/dvb/adapter0/frontend0")
            .with_status(Ok(FrontendStatus::HAS_LOCK))
            .with_delay(Duration::from_millis(200));
        let healthy = MockFrontend::locked("/dev/dvb/adapter1/frontend0");
        let state = state_with(
            vec![entry(0, 0, Arc::new(slow)), entry(1, 0, Arc::new(healthy))],
            Duration::from_millis(50),
        );
        let hub = state.hub.clone();
        let app = router(state);

        let (status, _, body) = fetch(&app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("adapter=\"0\""));
        assert!(body.contains("dvb_fe_has_lock{adapter=\"1\",frontend=\"0\"} 1\n"));
        assert_eq!(hub.exporter.device_timeouts.get(), 1);
    }

    #[test]
    fn hung_device_holds_at_most_one_blocking_thread() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .max_blocking_threads(2)
            .enable_all()
            .build()
            .unwrap();

        let stuck = MockFrontend::locked("/dev/dvb/adapter0/frontend0")
            .with_delay(Duration::from_secs(5));
        let healthy = MockFrontend::locked("/dev/dvb/adapter1/frontend0");
        let state = state_with(
            vec![entry(0, 0, Arc::new(stuck)), entry(1, 0, Arc::new(healthy))],
            Duration::from_millis(100),
        );
        let hub = state.hub.clone();
        let app = router(state);

        let bodies: Vec<String> = rt.block_on(async {
            let mut out = Vec::new();
            for _ in 0..6 {
                let (status, _, body) = fetch(&app, "/metrics").await;
                assert_eq!(status, StatusCode::OK);
                out.push(body);
            }
            out
        });

        for (i, body) in bodies.iter().enumerate() {
            assert!(
                body.contains("dvb_fe_has_lock{adapter=\"1\",frontend=\"0\"} 1\n"),
                "scrape {i} lost the healthy frontend"
            );
            assert!(!body.contains("adapter=\"0\""));
        }
        // one timeout, then five skips while the first poll is still stuck
        assert_eq!(hub.exporter.device_timeouts.get(), 6);

        rt.shutdown_background();
    }

    #[tokio::test]
    async fn panicking_device_is_contained() {
        let healthy = MockFrontend::locked("/dev/dvb/adapter1/frontend0");
        let app = router(state_with(
            vec![
                entry(0, 0, Arc::new(PanickingFrontend)),
                entry(1, 0, Arc::new(healthy)),
            ],
            Duration::from_secs(5),
        ));

        let (status, _, body) = fetch(&app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("adapter=\"0\""));
        assert!(body.contains("dvb_fe_has_lock{adapter=\"1\",frontend=\"0\"} 1\n"));
    }

    #[tokio::test]
    async fn repeated_scrapes_match() {
        let app = router(state_with(
            vec![entry(
                0,
                0,
                Arc::new(MockFrontend::locked("/dev/dvb/adapter0/frontend0")),
            )],
            Duration::from_secs(5),
        ));
        let (_, _, first) = fetch(&app, "/metrics").await;
        let (_, _, second) = fetch(&app, "/metrics").await;
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }
}
