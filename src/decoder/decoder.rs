use anyhow::{Context, Result};
use image::DynamicImage;
use std::path::{Component, Path, PathBuf};

use crate::geometry::TileId;

/// 瓦片解码器统一接口
/// 解码在工作线程中执行，所以要求 Send + Sync
pub trait TileDecoder: Send + Sync {
    /// 获取并解码单个瓦片
    fn decode(&self, id: &TileId) -> Result<DynamicImage>;
}

/// 从本地目录读取瓦片，标识即相对路径
pub struct FileTileDecoder {
    root: PathBuf,
}

impl FileTileDecoder {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, id: &TileId) -> Result<PathBuf> {
        let relative = Path::new(id.as_str());
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            anyhow::bail!("tile id {} escapes the tile root", id);
        }
        Ok(self.root.join(relative))
    }
}

impl TileDecoder for FileTileDecoder {
    fn decode(&self, id: &TileId) -> Result<DynamicImage> {
        let path = self.resolve(id)?;
        image::open(&path).with_context(|| format!("failed to decode tile {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn decodes_tile_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("0/1")).unwrap();
        RgbaImage::from_pixel(3, 2, Rgba([255, 0, 0, 255]))
            .save(dir.path().join("0/1/0_0.png"))
            .unwrap();

        let decoder = FileTileDecoder::new(dir.path());
        let image = decoder.decode(&TileId::from("0/1/0_0.png")).unwrap();
        assert_eq!((image.width(), image.height()), (3, 2));
    }

    #[test]
    fn missing_tile_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = FileTileDecoder::new(dir.path());
        let err = decoder.decode(&TileId::from("9/9/9_9.png")).unwrap_err();
        assert!(err.to_string().contains("failed to decode tile"));
    }

    #[test]
    fn rejects_ids_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = FileTileDecoder::new(dir.path());
        assert!(decoder.decode(&TileId::from("../secret.png")).is_err());
        assert!(decoder.decode(&TileId::from("/etc/passwd")).is_err());
    }
}
