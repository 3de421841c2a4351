use image::DynamicImage;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;

use crate::geometry::TileId;

/// 已解码瓦片缓存
///
/// 每项带一个保留计数：正在绘制的瓦片被 `acquire`，不再绘制时 `release`。
/// 超出容量时只淘汰保留计数为 0 的项（最久未使用优先），
/// 所以全部被保留时缓存可以暂时超出容量。
pub struct ImageCache {
    cache: HashMap<TileId, CachedImage>,
    max_size: usize,
    tick: u64,
    evictions: u64,
}

#[derive(Clone)]
pub struct CachedImage {
    pub image: Arc<DynamicImage>,
    /// 最近一次访问的逻辑时间
    pub timestamp: u64,
    pub retain_count: usize,
}

impl ImageCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            cache: HashMap::new(),
            max_size,
            tick: 0,
            evictions: 0,
        }
    }

    pub fn has(&self, key: &TileId) -> bool {
        self.cache.contains_key(key)
    }

    pub fn get(&mut self, key: &TileId) -> Option<Arc<DynamicImage>> {
        self.tick += 1;
        let tick = self.tick;

        let cached = self.cache.get_mut(key)?;
        cached.timestamp = tick;
        Some(cached.image.clone())
    }

    pub fn put(&mut self, key: TileId, image: DynamicImage) -> Arc<DynamicImage> {
        self.tick += 1;

        let image = Arc::new(image);
        let retain_count = self.cache.get(&key).map_or(0, |old| old.retain_count);
        self.cache.insert(
            key.clone(),
            CachedImage {
                image: image.clone(),
                timestamp: self.tick,
                retain_count,
            },
        );

        self.evict_overflow(Some(&key));
        image
    }

    /// 增加保留计数
    pub fn acquire(&mut self, key: &TileId) {
        match self.cache.get_mut(key) {
            Some(cached) => cached.retain_count += 1,
            None => warn!("[ImageCache] acquire of uncached tile {}", key),
        }
    }

    /// 减少保留计数，降为 0 后该项可以被淘汰
    pub fn release(&mut self, key: &TileId) {
        let Some(cached) = self.cache.get_mut(key) else {
            warn!("[ImageCache] release of uncached tile {}", key);
            return;
        };

        if cached.retain_count == 0 {
            warn!("[ImageCache] release of unretained tile {}", key);
            return;
        }
        cached.retain_count -= 1;

        if cached.retain_count == 0 {
            self.evict_overflow(None);
        }
    }

    pub fn retain_count(&self, key: &TileId) -> usize {
        self.cache.get(key).map_or(0, |cached| cached.retain_count)
    }

    pub fn remove(&mut self, key: &TileId) -> bool {
        let removed = self.cache.remove(key).is_some();
        if removed {
            self.evictions += 1;
        }
        removed
    }

    pub fn clear(&mut self) {
        self.evictions += self.cache.len() as u64;
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// 累计被移出缓存的项数（淘汰、remove、clear）
    pub fn eviction_count(&self) -> u64 {
        self.evictions
    }

    fn evict_overflow(&mut self, keep: Option<&TileId>) {
        while self.cache.len() > self.max_size {
            // 找到最久未使用且未被保留的项
            let oldest_key = self
                .cache
                .iter()
                .filter(|(key, cached)| cached.retain_count == 0 && Some(*key) != keep)
                .min_by_key(|(_, cached)| cached.timestamp)
                .map(|(key, _)| key.clone());

            let Some(key) = oldest_key else {
                break;
            };
            debug!("[ImageCache] evict ...{}", key.short());
            self.cache.remove(&key);
            self.evictions += 1;
        }
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile() -> DynamicImage {
        DynamicImage::new_rgba8(4, 4)
    }

    fn id(s: &str) -> TileId {
        TileId::from(s)
    }

    #[test]
    fn evicts_least_recently_used_first() {
        let mut cache = ImageCache::new(2);
        cache.put(id("a"), tile());
        cache.put(id("b"), tile());
        cache.get(&id("a"));
        cache.put(id("c"), tile());

        assert!(cache.has(&id("a")));
        assert!(!cache.has(&id("b")));
        assert!(cache.has(&id("c")));
        assert_eq!(cache.eviction_count(), 1);
    }

    #[test]
    fn replacing_an_entry_refreshes_its_recency() {
        let mut cache = ImageCache::new(2);
        cache.put(id("a"), tile());
        cache.put(id("b"), tile());
        cache.get(&id("b"));
        cache.put(id("a"), tile());
        cache.put(id("c"), tile());

        assert!(cache.has(&id("a")));
        assert!(!cache.has(&id("b")));
        assert_eq!(cache.retain_count(&id("a")), 0);
    }

    #[test]
    fn retained_entries_survive_overflow() {
        let mut cache = ImageCache::new(1);
        cache.put(id("a"), tile());
        cache.acquire(&id("a"));
        cache.put(id("b"), tile());

        // "a" 被保留，"b" 是刚插入的
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.retain_count(&id("a")), 1);

        cache.acquire(&id("b"));
        cache.release(&id("a"));
        assert!(!cache.has(&id("a")));
        assert!(cache.has(&id("b")));
    }

    #[test]
    fn release_never_underflows() {
        let mut cache = ImageCache::new(4);
        cache.put(id("a"), tile());
        cache.release(&id("a"));
        cache.release(&id("missing"));
        assert_eq!(cache.retain_count(&id("a")), 0);

        cache.acquire(&id("a"));
        cache.acquire(&id("a"));
        cache.release(&id("a"));
        assert_eq!(cache.retain_count(&id("a")), 1);
    }

    #[test]
    fn replacing_an_entry_keeps_its_retain_count() {
        let mut cache = ImageCache::new(4);
        cache.put(id("a"), tile());
        cache.acquire(&id("a"));
        cache.put(id("a"), DynamicImage::new_rgba8(8, 8));
        assert_eq!(cache.retain_count(&id("a")), 1);
        assert_eq!(cache.get(&id("a")).unwrap().width(), 8);
    }

    #[test]
    fn acquire_of_missing_entry_is_ignored() {
        let mut cache = ImageCache::new(4);
        cache.acquire(&id("nope"));
        assert!(cache.is_empty());
        assert_eq!(cache.retain_count(&id("nope")), 0);
    }
}
