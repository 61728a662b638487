//! Hashing, storing, fetching and evicting files.

use std::path::Path;

use coskit_core::storage::PutOutcome;
use coskit_core::{
    ContentHash, ContentHasher, HashAlgorithm, Origin, RequestOptions, Sha2Hasher,
};
use eyre::WrapErr;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::context::Context;
use crate::GlobalArgs;

async fn read_file(path: &Path) -> eyre::Result<Vec<u8>> {
    fs::read(path)
        .await
        .wrap_err_with(|| format!("failed to read {}", path.display()))
}

pub async fn hash(file: &Path, algorithm: HashAlgorithm) -> eyre::Result<()> {
    let bytes = read_file(file).await?;
    let hash = Sha2Hasher.digest(algorithm, &bytes);
    println!("{}", serde_json::to_string_pretty(&hash)?);
    Ok(())
}

pub async fn store(
    global: &GlobalArgs,
    file: &Path,
    origin: &Origin,
    description: String,
    algorithm: HashAlgorithm,
) -> eyre::Result<()> {
    let bytes = read_file(file).await?;
    let hash = Sha2Hasher.digest(algorithm, &bytes);
    let context = Context::open(global)?;

    let result = async {
        let handle = context
            .broker()
            .request_handle(origin, &hash, RequestOptions::create(description))
            .await?;
        handle.write(&bytes).await
    }
    .await;
    context.save_ledger()?;

    match result.wrap_err_with(|| format!("failed to store {}", file.display()))? {
        PutOutcome::Stored => tracing::info!(%hash, bytes = bytes.len(), "stored"),
        PutOutcome::AlreadyPresent => tracing::info!(%hash, "already stored"),
    }
    println!("{hash}");
    Ok(())
}

pub async fn fetch(
    global: &GlobalArgs,
    origin: &Origin,
    description: String,
    algorithm: HashAlgorithm,
    hash: String,
    out: Option<&Path>,
) -> eyre::Result<()> {
    let hash = ContentHash::new(algorithm, hash)?;
    let context = Context::open(global)?;

    let result = async {
        let handle = context
            .broker()
            .request_handle(origin, &hash, RequestOptions::open(description))
            .await?;
        handle.read().await
    }
    .await;
    context.save_ledger()?;

    let bytes = result.wrap_err_with(|| format!("failed to fetch {hash}"))?;
    match out {
        Some(path) => fs::write(path, &bytes)
            .await
            .wrap_err_with(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&bytes).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

pub async fn entries(global: &GlobalArgs) -> eyre::Result<()> {
    let context = Context::open(global)?;
    for hash in context.broker().entries().await? {
        println!("{hash}");
    }
    Ok(())
}

pub async fn evict(global: &GlobalArgs, algorithm: HashAlgorithm, hash: String) -> eyre::Result<()> {
    let hash = ContentHash::new(algorithm, hash)?;
    let context = Context::open(global)?;
    if context.broker().evict(&hash).await? {
        println!("evicted {hash}");
    } else {
        println!("{hash} is not stored");
    }
    Ok(())
}

pub async fn clear_all(global: &GlobalArgs) -> eyre::Result<()> {
    let context = Context::open(global)?;
    let removed = context.broker().clear_all().await;
    // the ledger is already empty even if the store failed part way
    context.save_ledger()?;
    println!("deleted {} entries and forgot every decision", removed?);
    Ok(())
}
