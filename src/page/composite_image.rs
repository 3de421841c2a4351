use log::warn;
use std::collections::HashMap;

use super::TileLoadMap;
use crate::cache::ImageCache;
use crate::geometry::{TileId, TileSource, ZoomLevel};

/// 瓦片在金字塔中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLocation {
    pub level: usize,
    pub row: usize,
    pub col: usize,
}

/// 单页所有分辨率层级的瓦片合成
///
/// 根据已加载的瓦片决定当前应当绘制哪些瓦片。层级按分辨率从高到低排列，
/// 相邻层级之间是 2x2 的四叉关系。
pub struct CompositeImage {
    levels: Vec<ZoomLevel>,
    url_index: HashMap<TileId, TileLocation>,
    load_maps: Vec<TileLoadMap>,
}

impl CompositeImage {
    pub fn new(levels: Vec<ZoomLevel>) -> Self {
        for (index, pair) in levels.windows(2).enumerate() {
            let (finer, coarser) = (&pair[0], &pair[1]);
            if coarser.rows != finer.rows.div_ceil(2) || coarser.cols != finer.cols.div_ceil(2) {
                warn!(
                    "[CompositeImage] level {} ({}x{}) is not a quad reduction of level {} ({}x{})",
                    index + 1,
                    coarser.rows,
                    coarser.cols,
                    index,
                    finer.rows,
                    finer.cols
                );
            }
        }

        let mut url_index = HashMap::new();
        for (level, zoom_level) in levels.iter().enumerate() {
            for tile in &zoom_level.tiles {
                url_index.insert(
                    tile.url.clone(),
                    TileLocation {
                        level,
                        row: tile.row,
                        col: tile.col,
                    },
                );
            }
        }

        let load_maps = levels
            .iter()
            .map(|level| TileLoadMap::new(level.rows, level.cols))
            .collect();

        Self {
            levels,
            url_index,
            load_maps,
        }
    }

    pub fn levels(&self) -> &[ZoomLevel] {
        &self.levels
    }

    /// 最高分辨率层级
    pub fn best_level(&self) -> Option<&ZoomLevel> {
        self.levels.first()
    }

    pub fn contains(&self, url: &TileId) -> bool {
        self.url_index.contains_key(url)
    }

    pub fn location(&self, url: &TileId) -> Option<TileLocation> {
        self.url_index.get(url).copied()
    }

    /// 按标识查找瓦片定义
    pub fn tile(&self, url: &TileId) -> Option<&TileSource> {
        let loc = self.location(url)?;
        self.levels[loc.level]
            .tiles
            .iter()
            .find(|tile| tile.row == loc.row && tile.col == loc.col)
    }

    pub fn is_loaded(&self, url: &TileId) -> bool {
        self.location(url)
            .is_some_and(|loc| self.load_maps[loc.level].is_loaded(loc.row, loc.col))
    }

    /// 当前应绘制的瓦片，高分辨率在前
    ///
    /// 按顺序绘制时粗瓦片不会覆盖细瓦片。已被上一层 2x2 瓦片完全覆盖的粗瓦片被跳过；
    /// 部分覆盖的粗瓦片整块绘制。
    pub fn get_tiles(&self) -> Vec<&TileSource> {
        let mut tiles = Vec::new();

        for (level, zoom_level) in self.levels.iter().enumerate() {
            let load_map = &self.load_maps[level];
            let finer_map = level.checked_sub(1).map(|finer| &self.load_maps[finer]);

            for tile in &zoom_level.tiles {
                if !load_map.is_loaded(tile.row, tile.col) {
                    continue;
                }
                if finer_map.is_some_and(|finer| is_covered(finer, tile.row, tile.col)) {
                    continue;
                }
                tiles.push(tile);
            }
        }

        tiles
    }

    /// 按缓存内容全量重建加载状态
    pub fn update_from_cache(&mut self, cache: &ImageCache) {
        for (level, zoom_level) in self.levels.iter().enumerate() {
            let load_map = &mut self.load_maps[level];
            load_map.clear();
            for tile in &zoom_level.tiles {
                if cache.has(&tile.url) {
                    load_map.set(tile.row, tile.col, true);
                }
            }
        }
    }

    /// 增量标记新加载的瓦片
    pub fn update_with_loaded_urls<'a, I>(&mut self, urls: I)
    where
        I: IntoIterator<Item = &'a TileId>,
    {
        for url in urls {
            match self.url_index.get(url) {
                Some(loc) => self.load_maps[loc.level].set(loc.row, loc.col, true),
                None => warn!("[CompositeImage] tile {} does not belong to this page", url),
            }
        }
    }
}

fn is_covered(finer: &TileLoadMap, row: usize, col: usize) -> bool {
    let (r, c) = (row * 2, col * 2);
    finer.is_loaded(r, c)
        && finer.is_loaded(r, c + 1)
        && finer.is_loaded(r + 1, c)
        && finer.is_loaded(r + 1, c + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Dimensions, Offset};
    use image::DynamicImage;

    /// 每层 rows x cols 个瓦片，标识为 "{level}/{row}_{col}"
    fn pyramid(grids: &[(usize, usize)]) -> Vec<ZoomLevel> {
        grids
            .iter()
            .enumerate()
            .map(|(level, &(rows, cols))| {
                let extent = 100.0 * 2f64.powi(level as i32);
                let mut tiles = Vec::new();
                for row in 0..rows {
                    for col in 0..cols {
                        tiles.push(TileSource {
                            url: TileId::new(format!("{}/{}_{}", level, row, col)),
                            row,
                            col,
                            dimensions: Dimensions::new(extent, extent),
                            offset: Offset::new(row as f64 * extent, col as f64 * extent),
                            scale_ratio: 2f64.powi(level as i32),
                        });
                    }
                }
                ZoomLevel::new(rows, cols, tiles)
            })
            .collect()
    }

    fn urls(tiles: &[&TileSource]) -> Vec<String> {
        tiles.iter().map(|t| t.url.to_string()).collect()
    }

    fn cache_with(ids: &[&str]) -> ImageCache {
        let mut cache = ImageCache::new(64);
        for id in ids {
            cache.put(TileId::from(*id), DynamicImage::new_rgba8(1, 1));
        }
        cache
    }

    #[test]
    fn coarse_tile_shown_until_fine_tiles_cover_it() {
        let mut composite = CompositeImage::new(pyramid(&[(2, 2), (1, 1)]));
        composite.update_from_cache(&cache_with(&["1/0_0"]));
        assert_eq!(urls(&composite.get_tiles()), ["1/0_0"]);

        let fine = ["0/0_0", "0/0_1", "0/1_0", "0/1_1"].map(TileId::from);
        composite.update_with_loaded_urls(&fine);
        assert_eq!(urls(&composite.get_tiles()), ["0/0_0", "0/0_1", "0/1_0", "0/1_1"]);
    }

    #[test]
    fn nothing_loaded_yields_nothing() {
        let mut composite = CompositeImage::new(pyramid(&[(2, 2), (1, 1)]));
        composite.update_from_cache(&ImageCache::new(4));
        assert!(composite.get_tiles().is_empty());
    }

    #[test]
    fn partially_covered_tile_is_drawn_after_fine_tiles() {
        let mut composite = CompositeImage::new(pyramid(&[(2, 2), (1, 1)]));
        composite.update_from_cache(&cache_with(&["1/0_0", "0/1_1", "0/0_0"]));
        assert_eq!(urls(&composite.get_tiles()), ["0/0_0", "0/1_1", "1/0_0"]);
    }

    #[test]
    fn occlusion_only_checks_the_next_finer_level() {
        let mut composite = CompositeImage::new(pyramid(&[(4, 4), (2, 2), (1, 1)]));
        composite.update_from_cache(&cache_with(&[
            "2/0_0", "1/0_0", "1/0_1", "1/1_0", "1/1_1", "0/0_0", "0/0_1", "0/1_0", "0/1_1",
        ]));
        assert_eq!(
            urls(&composite.get_tiles()),
            ["0/0_0", "0/0_1", "0/1_0", "0/1_1", "1/0_1", "1/1_0", "1/1_1"]
        );
    }

    #[test]
    fn edge_tiles_are_occluded_by_in_bounds_children() {
        // 第 0 层是 3x3，第 1 层的 (1,1) 只有一个子瓦片在范围内
        let mut composite = CompositeImage::new(pyramid(&[(3, 3), (2, 2)]));
        composite.update_from_cache(&cache_with(&["1/1_1", "1/0_0"]));
        assert_eq!(urls(&composite.get_tiles()), ["1/0_0", "1/1_1"]);

        composite.update_with_loaded_urls([&TileId::from("0/2_2")]);
        assert_eq!(urls(&composite.get_tiles()), ["0/2_2", "1/0_0"]);
    }

    #[test]
    fn resync_is_idempotent() {
        let cache = cache_with(&["1/0_0", "0/0_1"]);
        let mut composite = CompositeImage::new(pyramid(&[(2, 2), (1, 1)]));
        composite.update_from_cache(&cache);
        let first = urls(&composite.get_tiles());
        composite.update_from_cache(&cache);
        assert_eq!(urls(&composite.get_tiles()), first);
    }

    #[test]
    fn resync_forgets_evicted_tiles() {
        let mut composite = CompositeImage::new(pyramid(&[(2, 2), (1, 1)]));
        composite.update_with_loaded_urls([&TileId::from("1/0_0"), &TileId::from("0/0_0")]);
        composite.update_from_cache(&cache_with(&["1/0_0"]));
        assert_eq!(urls(&composite.get_tiles()), ["1/0_0"]);
        assert!(!composite.is_loaded(&TileId::from("0/0_0")));
    }

    #[test]
    fn incremental_updates_match_full_resync() {
        let loaded = ["0/1_2", "1/0_1", "2/0_0", "0/0_0", "0/0_1", "0/1_0", "0/1_1", "1/1_1"];
        let levels = pyramid(&[(4, 4), (2, 2), (1, 1)]);

        let mut incremental = CompositeImage::new(levels.clone());
        for url in loaded {
            incremental.update_with_loaded_urls([&TileId::from(url)]);
        }

        let mut full = CompositeImage::new(levels);
        full.update_from_cache(&cache_with(&loaded));

        assert_eq!(urls(&incremental.get_tiles()), urls(&full.get_tiles()));
    }

    #[test]
    fn reverse_index_locates_tiles() {
        let composite = CompositeImage::new(pyramid(&[(2, 2), (1, 1)]));
        assert_eq!(
            composite.location(&TileId::from("0/1_0")),
            Some(TileLocation {
                level: 0,
                row: 1,
                col: 0
            })
        );
        assert!(composite.contains(&TileId::from("1/0_0")));
        assert!(!composite.contains(&TileId::from("2/0_0")));
        assert_eq!(composite.best_level().map(|l| l.tiles.len()), Some(4));
    }

    #[test]
    fn foreign_urls_are_ignored() {
        let mut composite = CompositeImage::new(pyramid(&[(1, 1)]));
        composite.update_with_loaded_urls([&TileId::from("other-page/0_0")]);
        assert!(composite.get_tiles().is_empty());
    }
}
