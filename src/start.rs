use crate::{
    config::{ConfigError, ProcessConfig},
    registry::RepositoryRegistry,
    server::{handler::RequestHandler, signal::SignalListener, HttpServer, ServerError},
    sync::{
        git::{GitBranchVerifier, GitPullExecutor},
        SyncOrchestrator,
    },
};
use duration_string::DurationString;
use log::{debug, info, warn};
use std::{sync::Arc, thread};
use thiserror::Error;

/// A custom error implementation for the start function
#[derive(Debug, Error)]
pub enum StartError {
    #[error("Configuration failed: {0}.")]
    Misconfigured(#[from] ConfigError),
    #[error("Server failed: {0}.")]
    FailedServer(#[from] ServerError),
}

/// Build the request handler from the configuration.
pub fn create_handler(config: ProcessConfig) -> Result<RequestHandler, StartError> {
    let ProcessConfig {
        homepage,
        token,
        timeout,
        repositories,
        ..
    } = config;

    let registry = RepositoryRegistry::new(repositories)?;
    if registry.is_empty() {
        warn!("There are no repositories configured, every pull will be rejected.");
    }
    debug!(
        "Registered {} repositories, git commands time out after {}.",
        registry.len(),
        DurationString::new(timeout)
    );

    let orchestrator = SyncOrchestrator::new(
        Box::new(GitBranchVerifier::new(timeout)),
        Box::new(GitPullExecutor::new(timeout)),
    );

    Ok(RequestHandler::new(homepage, token, registry, orchestrator))
}

/// Bind the server, falling back to IPv4 for "[::]" on hosts without IPv6.
fn bind(address: &str) -> Result<HttpServer, ServerError> {
    match (HttpServer::bind(address), address.strip_prefix("[::]:")) {
        (Err(err), Some(port)) => {
            warn!("{err}, listening only on IPv4.");
            HttpServer::bind(&format!("0.0.0.0:{port}"))
        }
        (result, _) => result,
    }
}

/// The main program loop, that serves the requests until a termination signal.
pub fn start(config: ProcessConfig) -> Result<(), StartError> {
    let address = config.address.clone();
    let handler = Arc::new(create_handler(config)?);
    let server = bind(&address)?;

    let stop = server.stopper();
    thread::spawn(move || SignalListener::new().listen(stop));

    server.listen(handler);
    info!("Finished running.");

    Ok(())
}
