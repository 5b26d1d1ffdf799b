use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::timeline::SLOT_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetOrigin {
    Downloaded,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub sequence_index: usize,
    pub local_path: PathBuf,
    pub origin: AssetOrigin,
}

impl ImageAsset {
    pub fn downloaded(sequence_index: usize, local_path: impl Into<PathBuf>) -> Self {
        ImageAsset {
            sequence_index,
            local_path: local_path.into(),
            origin: AssetOrigin::Downloaded,
        }
    }

    pub fn placeholder(sequence_index: usize, local_path: impl Into<PathBuf>) -> Self {
        ImageAsset {
            sequence_index,
            local_path: local_path.into(),
            origin: AssetOrigin::Placeholder,
        }
    }

    pub fn path(&self) -> &Path {
        &self.local_path
    }

    pub fn is_placeholder(&self) -> bool {
        self.origin == AssetOrigin::Placeholder
    }
}

/// Exactly [`SLOT_COUNT`] assets ordered by sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetSet {
    assets: Vec<ImageAsset>,
}

impl AssetSet {
    pub fn new(mut assets: Vec<ImageAsset>) -> Result<Self, EngineError> {
        if assets.len() != SLOT_COUNT {
            return Err(EngineError::AssetCount {
                expected: SLOT_COUNT,
                actual: assets.len(),
            });
        }
        assets.sort_by_key(|a| a.sequence_index);
        for (position, asset) in assets.iter().enumerate() {
            if asset.sequence_index != position {
                return Err(EngineError::AssetOrder {
                    position,
                    index: asset.sequence_index,
                });
            }
        }
        Ok(AssetSet { assets })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImageAsset> {
        self.assets.iter()
    }

    pub fn get(&self, slot: usize) -> Option<&ImageAsset> {
        self.assets.get(slot)
    }

    pub fn count_origin(&self, origin: AssetOrigin) -> usize {
        self.assets.iter().filter(|a| a.origin == origin).count()
    }

    pub fn into_inner(self) -> Vec<ImageAsset> {
        self.assets
    }
}

impl<'a> IntoIterator for &'a AssetSet {
    type Item = &'a ImageAsset;
    type IntoIter = std::slice::Iter<'a, ImageAsset>;

    fn into_iter(self) -> Self::IntoIter {
        self.assets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_three_assets_in_any_order() {
        let set = AssetSet::new(vec![
            ImageAsset::placeholder(2, "/tmp/c.png"),
            ImageAsset::downloaded(0, "/tmp/a.jpg"),
            ImageAsset::downloaded(1, "/tmp/b.jpg"),
        ])
        .unwrap();

        let indices: Vec<_> = set.iter().map(|a| a.sequence_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(set.count_origin(AssetOrigin::Downloaded), 2);
        assert!(set.get(2).unwrap().is_placeholder());
    }

    #[test]
    fn rejects_wrong_count() {
        let err = AssetSet::new(vec![ImageAsset::placeholder(0, "/tmp/a.png")]).unwrap_err();
        assert_eq!(err, EngineError::AssetCount { expected: 3, actual: 1 });
    }

    #[test]
    fn rejects_duplicate_slots() {
        let err = AssetSet::new(vec![
            ImageAsset::placeholder(0, "/tmp/a.png"),
            ImageAsset::placeholder(0, "/tmp/b.png"),
            ImageAsset::placeholder(2, "/tmp/c.png"),
        ])
        .unwrap_err();
        assert_eq!(err, EngineError::AssetOrder { position: 1, index: 0 });
    }
}
