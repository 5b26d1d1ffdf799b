use futures::future::join_all;
use tracing::{debug, warn};

use engine::{AssetOrigin, ImageAsset, Resolution};

use crate::error::MediaResult;
use crate::jobs::workspace::JobWorkspace;
use crate::media::raster::{cover_fit, create_placeholder};

/// Brings every acquired asset to the output canvas.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    canvas: Resolution,
}

impl Normalizer {
    pub fn new(canvas: Resolution) -> Self {
        Normalizer { canvas }
    }

    /// Downloaded images are cover-fit to the canvas. An image that fails to
    /// decode or resize turns its slot into a placeholder; placeholders are
    /// already canvas-sized and pass through.
    pub async fn normalize(
        &self,
        assets: Vec<ImageAsset>,
        workspace: &JobWorkspace,
    ) -> MediaResult<Vec<ImageAsset>> {
        let results = join_all(assets.into_iter().map(|a| self.normalize_one(a, workspace))).await;
        results.into_iter().collect()
    }

    async fn normalize_one(&self, asset: ImageAsset, workspace: &JobWorkspace) -> MediaResult<ImageAsset> {
        if asset.origin == AssetOrigin::Placeholder {
            return Ok(asset);
        }

        let slot = asset.sequence_index;
        let dest = workspace.resized_path(slot);
        match cover_fit(asset.local_path.clone(), dest, self.canvas).await {
            Ok(resized) => {
                debug!(slot, "Resized {}", asset.local_path.display());
                Ok(ImageAsset::downloaded(slot, resized))
            }
            Err(e) => {
                warn!(slot, error = %e, "Image could not be normalized; using placeholder");
                let path = create_placeholder(workspace.placeholder_path(slot), self.canvas).await?;
                Ok(ImageAsset::placeholder(slot, path))
            }
        }
    }
}
