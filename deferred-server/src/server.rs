use std::future::Future;

use deferred::{DeferredHandler, Options};
use eyre::Result;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::{router, snapshot};

/// Serve on `listener` until `shutdown` resolves.
///
/// Traffic is accepted right away; requests wait for the upstream snapshot
/// while it is being fetched.
pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let shutdown_token = CancellationToken::new();
    // Creation stops when the process shuts down, or when giving up.
    let creation = shutdown_token.child_token();

    if let Some(give_up_after) = config.give_up_after {
        let creation = creation.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(give_up_after.0) => {
                    warn!("giving up on snapshot after {:?}", give_up_after.0);
                    creation.cancel();
                }
                _ = creation.cancelled() => {}
            }
        });
    }

    let client = reqwest::Client::builder()
        .user_agent("deferred-server")
        .timeout(config.request_timeout.0)
        .build()?;
    let upstream_url = config.upstream_url.clone();

    let options = Options::default()
        .retry_after(config.retry_after.0)
        .timeout_after(config.timeout_after.0)
        .notify(|err| error!("failed to load snapshot: {}", err));
    let handler = DeferredHandler::new(
        creation,
        move || snapshot::load(client.clone(), upstream_url.clone()),
        options,
    )?;

    let app = router::router(handler, config.export_prometheus);

    info!("listening on {:?}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            shutdown_token.cancel();
        })
        .await?;

    Ok(())
}
