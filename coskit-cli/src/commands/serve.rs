//! The request protocol over stdio.

use std::sync::Arc;

use coskit_core::channel::request_channel;
use coskit_core::Origin;
use eyre::bail;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::context::Context;
use crate::GlobalArgs;

/// Reads one JSON request per line from stdin and writes one JSON response
/// per line to stdout. Dropped messages produce no output line.
pub async fn run(global: &GlobalArgs, origin: Origin) -> eyre::Result<()> {
    if global.auto_consent.is_none() {
        bail!("serve reads requests from stdin, so prompts need --auto-consent");
    }
    let context = Context::open(global)?;
    let (connector, service) = request_channel(Arc::clone(context.broker()));
    let service = tokio::spawn(service.run());
    tracing::info!(%origin, "serving request protocol on stdio");

    let port = connector.connect(origin)?;
    drop(connector);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = port.post(line).await? {
            stdout.write_all(response.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    drop(port);
    service.await?;
    context.save_ledger()
}
