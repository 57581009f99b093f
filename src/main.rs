use std::{future::IntoFuture, pin::pin, process, sync::Arc};

use filedeck::{
    application::{
        account::{AccountOptions, AccountService},
        ads::ThreadRandom,
        content::{AccountApi, ContentApi, RemoteHost},
        error::AppError,
        viewer::{ViewerOptions, ViewerService},
    },
    config,
    infra::{
        api_client::HttpContentApi,
        error::InfraError,
        http::{self, HttpState},
        remote_host::PortalRemoteHost,
        telemetry,
    },
};
use tokio::sync::oneshot;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let state = build_http_state(&settings)?;
    serve_http(&settings, state).await
}

fn build_http_state(settings: &config::Settings) -> Result<HttpState, AppError> {
    let api = Arc::new(HttpContentApi::new(
        settings.api.url.clone(),
        settings.api.timeout,
    )?);
    let remote: Arc<dyn RemoteHost> = Arc::new(PortalRemoteHost::new(
        settings.remote.portal_url.clone(),
        settings.remote.timeout,
    )?);
    let content: Arc<dyn ContentApi> = api.clone();
    let accounts_api: Arc<dyn AccountApi> = api;

    let viewer = ViewerService::new(
        content.clone(),
        remote,
        Arc::new(ThreadRandom),
        ViewerOptions {
            service_name: settings.site.service_name.clone(),
            website_address: settings.site.website_address.clone(),
            captcha_site_key: settings.captcha.site_key.clone(),
            proxy_api_requests: settings.api.proxy_requests,
        },
    );
    let accounts = AccountService::new(
        accounts_api,
        AccountOptions {
            service_name: settings.site.service_name.clone(),
            subscription_banner_html: settings.site.subscription_banner_html.clone(),
        },
    );

    Ok(HttpState {
        viewer,
        accounts,
        content,
    })
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "filedeck::serve",
        addr = %settings.server.addr,
        api = %settings.api.url,
        "listening"
    );

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = stop_tx.send(());
        })
        .into_future();
    let mut server = pin!(server);

    let grace = settings.server.graceful_shutdown;
    let drain_deadline = async move {
        if stop_rx.await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| AppError::from(InfraError::from(err)))?;
            info!(target = "filedeck::serve", "server stopped");
        }
        _ = drain_deadline => {
            warn!(
                target = "filedeck::serve",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out, dropping open connections"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(
            target = "filedeck::serve",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
    info!(target = "filedeck::serve", "shutdown signal received");
}
