use futures::future::join_all;
use tracing::{info, warn};

use engine::{ImageAsset, Resolution, SLOT_COUNT};

use crate::error::MediaResult;
use crate::jobs::workspace::JobWorkspace;
use crate::media::fetch::ImageFetcher;
use crate::media::raster::create_placeholder;

/// Resolves the fixed set of image slots for a job.
#[derive(Clone)]
pub struct AcquisitionManager {
    fetcher: ImageFetcher,
    canvas: Resolution,
}

impl AcquisitionManager {
    pub fn new(fetcher: ImageFetcher, canvas: Resolution) -> Self {
        AcquisitionManager { fetcher, canvas }
    }

    /// One asset per slot, in slot order. Slots with a URL are downloaded
    /// (concurrently, with retries); failed and URL-less slots get a
    /// placeholder. Only a failure to write a placeholder is an error.
    pub async fn acquire(&self, images: &[String], workspace: &JobWorkspace) -> MediaResult<Vec<ImageAsset>> {
        let n = images.len().min(SLOT_COUNT);
        if n == 0 {
            info!("No product images, using placeholders for every slot");
        }

        let downloads = images[..n]
            .iter()
            .enumerate()
            .map(|(slot, url)| self.download_slot(slot, url, workspace));
        let mut assets = Vec::with_capacity(SLOT_COUNT);
        for asset in join_all(downloads).await {
            assets.push(asset?);
        }

        for slot in n..SLOT_COUNT {
            assets.push(self.placeholder(slot, workspace).await?);
        }

        Ok(assets)
    }

    async fn download_slot(&self, slot: usize, url: &str, workspace: &JobWorkspace) -> MediaResult<ImageAsset> {
        let dest = workspace.download_path(slot);
        match self.fetcher.fetch_with_retry(slot, url, &dest).await {
            Ok(()) => Ok(ImageAsset::downloaded(slot, dest)),
            Err(failure) => {
                warn!(slot, url, "{}; using placeholder", failure);
                self.placeholder(slot, workspace).await
            }
        }
    }

    /// Generate the placeholder image for `slot`.
    pub async fn placeholder(&self, slot: usize, workspace: &JobWorkspace) -> MediaResult<ImageAsset> {
        let path = create_placeholder(workspace.placeholder_path(slot), self.canvas).await?;
        Ok(ImageAsset::placeholder(slot, path))
    }
}
