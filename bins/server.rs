use common::utils::logging::WorkerGuard;
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

fn init_logging(log_dir: &str) -> Option<WorkerGuard> {
    let guard = common::utils::logging::init_logging_from_env(Some(log_dir));
    info!(service = "server", event = "logger_init", log_dir, "tracing subscriber initialized");
    guard
}

fn main() -> std::process::ExitCode {
    // load .env first so RUST_LOG and friends apply
    dotenv().ok();
    let config = configs::AppConfig::load_or_env();
    let log_dir = match &config {
        Ok(cfg) => cfg.jobs.log_dir.clone(),
        Err(_) => configs::JobsConfig::default().log_dir,
    };
    let _log_guard = init_logging(&log_dir);

    let service_id = Uuid::new_v4();
    let pid = std::process::id();
    let version = env!("CARGO_PKG_VERSION");

    std::panic::set_hook(Box::new({
        let service_id = service_id;
        move |info| {
            error!(
                service = "server",
                event = "panic",
                %service_id,
                pid,
                message = %info,
                "unhandled panic occurred"
            );
        }
    }));

    // config.toml first, then TOKIO_WORKER_THREADS
    let worker_threads = match &config {
        Ok(cfg) => cfg.server.worker_threads,
        Err(e) => {
            error!(service = "server", event = "config_invalid", error = %e, "configuration could not be loaded");
            std::env::var("TOKIO_WORKER_THREADS").ok().and_then(|v| v.parse::<usize>().ok())
        }
    };

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(w) = worker_threads { builder.worker_threads(w); }

    let rt = match builder.build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "server", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return std::process::ExitCode::FAILURE;
        }
    };

    info!(
        service = "server",
        event = "start",
        %service_id,
        pid,
        version,
        threads = worker_threads.unwrap_or_default(),
        "server service starting"
    );

    rt.block_on(async move {
        let shutdown = CancellationToken::new();
        let mut server_task = tokio::spawn(server::run(shutdown.clone()));

        let res = tokio::select! {
            res = &mut server_task => res,
            _ = tokio::signal::ctrl_c() => {
                info!(service = "server", event = "shutdown_signal", %service_id, pid, "received Ctrl+C, draining");
                shutdown.cancel();
                server_task.await
            }
        };

        match res {
            Ok(Ok(())) => {
                info!(service = "server", event = "stop", %service_id, pid, "server stopped normally");
                std::process::ExitCode::SUCCESS
            }
            Ok(Err(e)) => {
                error!(service = "server", event = "run_failed", error = %e, "server::run returned error");
                std::process::ExitCode::FAILURE
            }
            Err(e) => {
                error!(service = "server", event = "task_join_error", error = %e, "server task join error");
                std::process::ExitCode::FAILURE
            }
        }
    })
}
