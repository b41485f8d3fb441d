use std::{
    io::{self, Write},
    process,
};

use axum::http::HeaderMap;
use stylecache::{
    application::{CacheCompiler, error::AppError},
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
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
        .unwrap_or(config::Command::Serve(config::ServeArgs::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Compile(args) => run_compile(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let compiler = CacheCompiler::new(&settings.stylesheet.directory)?;
    let state = HttpState::new(compiler, settings.stylesheet.route.clone());
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        addr = %settings.server.addr,
        route = %settings.stylesheet.route,
        directory = %settings.stylesheet.directory.display(),
        "Serving stylesheet"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
            }
        })
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn run_compile(
    settings: config::Settings,
    args: config::CompileArgs,
) -> Result<(), AppError> {
    let directory = settings.stylesheet.directory;
    let compiled = tokio::task::spawn_blocking(move || {
        let compiler = CacheCompiler::new(directory)?;
        if args.rebuild {
            compiler
                .artifact()
                .remove()
                .map_err(|err| AppError::from(InfraError::from(err)))?;
        }
        let response = compiler.process(&HeaderMap::new())?;
        let artifact = compiler.artifact().clone();
        Ok::<_, AppError>((response, artifact, args.print))
    })
    .await
    .map_err(|err| AppError::unexpected(format!("compile task failed: {err}")))?;

    let (response, artifact, print) = compiled?;
    if !artifact.exists() {
        return Err(AppError::from(InfraError::configuration(format!(
            "stylesheet cache not found at {}",
            artifact.path().display()
        ))));
    }

    info!(
        path = %artifact.path().display(),
        bytes = response.body().len(),
        "Stylesheet cache ready"
    );

    if print {
        let mut stdout = io::stdout().lock();
        stdout
            .write_all(response.body())
            .and_then(|()| stdout.flush())
            .map_err(|err| AppError::from(InfraError::from(err)))?;
    }

    Ok(())
}
