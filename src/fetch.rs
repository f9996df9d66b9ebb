//! Sample-dataset download.
//!
//! Pulls the published hemodialysis CSV files used for local experiments.
//! Each file gets up to three attempts with exponential backoff; a file
//! that still fails is logged and skipped so the remaining files download.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PipelineError, Result};

const MAX_ATTEMPTS: u32 = 3;

/// The published raw dataset files, (filename, url).
pub const RAW_DATASET_FILES: [(&str, &str); 3] = [
    ("d1.csv", "https://figshare.com/ndownloader/files/15142151"),
    ("idp.csv", "https://figshare.com/ndownloader/files/15142154"),
    ("vip.csv", "https://figshare.com/ndownloader/files/15142157"),
];

/// Download `url` to `dest` in one attempt.
pub async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<()> {
    log::info!("downloading {} -> {}", url, dest.display());
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(PipelineError::EndpointStatus(response.status()));
    }
    let bytes = response.bytes().await?;
    std::fs::write(dest, &bytes)?;
    Ok(())
}

/// Download the raw dataset files into `dir`, creating it if needed.
///
/// Files already on disk are skipped. Returns the target directory; a file
/// that exhausts its attempts is reported via `warn!` but does not fail
/// the batch.
pub async fn download_raw_files(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()?;

    for (filename, url) in RAW_DATASET_FILES {
        let dest = dir.join(filename);
        if dest.exists() {
            log::info!("skipping {}; file already exists", filename);
            continue;
        }

        let mut downloaded = false;
        for attempt in 1..=MAX_ATTEMPTS {
            match download_file(&client, url, &dest).await {
                Ok(()) => {
                    log::info!("{} downloaded after {} attempt(s)", filename, attempt);
                    downloaded = true;
                    break;
                }
                Err(err) => {
                    log::warn!("attempt {} failed for {}: {}", attempt, filename, err);
                    if attempt < MAX_ATTEMPTS {
                        let wait = Duration::from_secs(2u64.pow(attempt));
                        log::info!("retrying in {:?}", wait);
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }
        if !downloaded {
            log::warn!("all {} attempts failed for {}", MAX_ATTEMPTS, filename);
        }
    }

    Ok(dir.to_path_buf())
}
