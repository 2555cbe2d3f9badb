use anyhow::{Context, Result};
use tracing::info;
use uptime_monitor::{
    config::MonitorConfig, router, target::default_targets, telemetry, Monitor, Notifier, Prober,
    ReqwestHttpClient, SmtpEmailSender, TargetRegistry,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = MonitorConfig::from_env().context("invalid configuration")?;
    telemetry::init(config.log_format);
    config.log_configuration();

    let targets = TargetRegistry::new(default_targets());

    let http_client = ReqwestHttpClient::new(config.probe_timeout)?;
    let sender = SmtpEmailSender::new(&config.smtp_host, &config.email_user, &config.email_app_password)?;
    let notifier = Notifier::new(
        Box::new(sender),
        config.email_user.clone(),
        config.notification_emails.clone(),
    );
    let monitor = Monitor::new(targets.clone(), Prober::new(Box::new(http_client)), notifier);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server monitor running on {}", addr);

    let sweep_interval = config.sweep_interval;
    let monitor_task = tokio::spawn(async move { monitor.run(sweep_interval).await });

    axum::serve(listener, router(targets))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    monitor_task.abort();
    info!("Server monitor stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
