use anyhow::{anyhow, Result};
use image::DynamicImage;
use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};

use super::{RasterSurface, RenderedPageInfo, ScrollDirection, ViewHooks, Viewport};
use crate::cache::ImageCache;
use crate::decoder::{RequestCompletion, RequestHandle, TileRequester};
use crate::geometry::{
    Dimensions, DocumentLayout, GeometryProvider, LayoutConfig, Offset, PageLookup, Rect, TileId,
    TileSource,
};
use crate::page::CompositeImage;

/// 渲染统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub render_passes: u64,
    pub paints: u64,
    pub tiles_drawn: u64,
    pub requests_issued: u64,
    pub requests_failed: u64,
    /// 页面重建后才到达、被转交给新合成图的结果
    pub stale_completions: u64,
    /// 标记为已加载但缓存中没有的瓦片
    pub consistency_errors: u64,
}

/// 当前渲染页面的合成图，generation 在每次重建时递增
struct PageSlot {
    generation: u64,
    composite: CompositeImage,
}

struct PendingRequest {
    page_index: usize,
    generation: u64,
    source: TileSource,
    handle: RequestHandle,
}

/// 视口驱动的瓦片渲染器
///
/// 每次视口变化后计算可见页面，为缺失的可见瓦片发起请求，并把已加载的瓦片绘制到画布上。
/// 所有操作都在调用线程上同步完成；瓦片结果通过 [`Renderer::process_completed_requests`]
/// 逐个回到渲染循环。
pub struct Renderer<G, R, S>
where
    G: GeometryProvider,
    R: TileRequester,
    S: RasterSurface,
{
    viewport: Viewport,
    surface: S,
    requester: R,
    hooks: ViewHooks,
    cache: ImageCache,

    source_resolver: Option<G>,
    dimens: Option<DocumentLayout>,
    page_lookup: PageLookup,

    composite_images: HashMap<usize, PageSlot>,
    next_generation: u64,
    rendered_pages: Vec<usize>,
    rendered_tiles: Vec<TileId>,
    pending_requests: HashMap<TileId, PendingRequest>,
    /// 上次全量同步时缓存的淘汰计数
    synced_evictions: u64,
    stats: RenderStats,
}

impl<G, R, S> Renderer<G, R, S>
where
    G: GeometryProvider,
    R: TileRequester,
    S: RasterSurface,
{
    pub fn new(
        viewport: Viewport,
        surface: S,
        requester: R,
        cache: ImageCache,
        hooks: ViewHooks,
    ) -> Self {
        let synced_evictions = cache.eviction_count();
        Self {
            viewport,
            surface,
            requester,
            hooks,
            cache,
            source_resolver: None,
            dimens: None,
            page_lookup: PageLookup::default(),
            composite_images: HashMap::new(),
            next_generation: 0,
            rendered_pages: Vec::new(),
            rendered_tiles: Vec::new(),
            pending_requests: HashMap::new(),
            synced_evictions,
            stats: RenderStats::default(),
        }
    }

    /// 加载（或重新加载）文档布局并跳转到配置中的锚点
    ///
    /// 锚点页面不存在时返回错误，渲染状态保持不变。
    pub fn load(&mut self, config: &LayoutConfig, mut geometry: G) -> Result<()> {
        self.hooks.view_will_load();

        let dimens = geometry.layout(config)?;
        let page_lookup = PageLookup::from_groups(&dimens.page_groups);
        let anchor = config.position;
        if !page_lookup.contains(anchor.anchor_page) {
            anyhow::bail!("invalid page: {}", anchor.anchor_page);
        }

        self.source_resolver = Some(geometry);
        self.dimens = Some(dimens);
        self.page_lookup = page_lookup;
        // 布局变了，旧的合成图全部作废
        self.composite_images.clear();

        let (width, height) = self.viewport.pixel_size();
        if self.surface.width() != width || self.surface.height() != height {
            debug!(
                "[Renderer] Canvas dimension change: ({}, {}) -> ({}, {})",
                self.surface.width(),
                self.surface.height(),
                width,
                height
            );
            self.surface.resize(width, height);
        } else {
            debug!("[Renderer] Reload, no size change");
        }

        self.goto(
            anchor.anchor_page,
            anchor.vertical_offset,
            anchor.horizontal_offset,
        )?;

        self.hooks.view_did_load();
        Ok(())
    }

    /// 让页面上的给定点位于视口中心并重新渲染
    pub fn goto(
        &mut self,
        page_index: usize,
        vertical_offset: f64,
        horizontal_offset: f64,
    ) -> Result<()> {
        let page_offset = self
            .page_offset(page_index)
            .ok_or_else(|| anyhow!("invalid page: {}", page_index))?;

        self.viewport.top =
            page_offset.top + vertical_offset - (self.viewport.height / 2.0).floor();
        self.viewport.left =
            page_offset.left + horizontal_offset - (self.viewport.width / 2.0).floor();

        self.render(ScrollDirection::None);
        self.notify_view_did_update(Some(page_index));
        Ok(())
    }

    /// 视口被外部修改（如滚动）后重新渲染
    pub fn adjust(&mut self, direction: ScrollDirection) {
        self.render(direction);
        self.notify_view_did_update(None);
    }

    /// 处理已完成的瓦片请求，返回处理的数量
    pub fn process_completed_requests(&mut self) -> usize {
        let completed = self.requester.poll_completed();
        let count = completed.len();
        for completion in completed {
            self.handle_completion(completion);
        }
        count
    }

    /// 取消所有进行中的请求，交还画布
    pub fn destroy(mut self) -> S {
        info!(
            "[Renderer] destroy, aborting {} pending requests",
            self.pending_requests.len()
        );
        for (_, pending) in self.pending_requests.drain() {
            pending.handle.abort();
        }
        self.surface
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn document_dimensions(&self) -> Option<Dimensions> {
        self.dimens.as_ref().map(|dimens| dimens.dimensions)
    }

    pub fn pending_request_count(&self) -> usize {
        self.pending_requests.len()
    }

    pub fn is_request_pending(&self, url: &TileId) -> bool {
        self.pending_requests.contains_key(url)
    }

    pub fn composite_image(&self, page_index: usize) -> Option<&CompositeImage> {
        self.composite_images.get(&page_index).map(|slot| &slot.composite)
    }

    pub fn rendered_pages(&self) -> &[usize] {
        &self.rendered_pages
    }

    pub fn rendered_tiles(&self) -> &[TileId] {
        &self.rendered_tiles
    }

    pub fn is_page_visible(&self, page_index: usize) -> bool {
        self.page_region(page_index)
            .is_some_and(|region| self.viewport.intersects_region(&region))
    }

    pub fn is_page_loaded(&self, page_index: usize) -> bool {
        self.rendered_pages.contains(&page_index)
    }

    pub fn page_region(&self, page_index: usize) -> Option<Rect> {
        self.page_lookup.get(page_index).map(|page| page.region())
    }

    pub fn page_offset(&self, page_index: usize) -> Option<Offset> {
        self.page_region(page_index).map(|region| region.origin())
    }

    pub fn page_dimensions(&self, page_index: usize) -> Option<Dimensions> {
        self.page_region(page_index).map(|region| region.dimensions())
    }

    /// 视口中心相对于页面原点的位置 (x, y)
    pub fn page_to_viewport_center_offset(&self, page_index: usize) -> Option<(f64, f64)> {
        let offset = self.page_offset(page_index)?;
        let x = self.viewport.left - offset.left + (self.viewport.width / 2.0).floor();
        let y = self.viewport.top - offset.top + (self.viewport.height / 2.0).floor();
        Some((x, y))
    }
}

impl<G, R, S> Renderer<G, R, S>
where
    G: GeometryProvider,
    R: TileRequester,
    S: RasterSurface,
{
    fn render(&mut self, direction: ScrollDirection) {
        let Some(dimens) = self.dimens.as_ref() else {
            debug!("[Renderer] render before load, ignored");
            return;
        };
        self.stats.render_passes += 1;
        debug!("[Renderer] render pass, direction: {:?}", direction);

        // 先按分组粗筛，再逐页判断
        let mut new_rendered_pages = Vec::new();
        for group in &dimens.page_groups {
            if !self.viewport.intersects_region(&group.region) {
                continue;
            }
            new_rendered_pages.extend(
                group
                    .pages
                    .iter()
                    .map(|page| page.index)
                    .filter(|&index| self.is_page_visible(index)),
            );
        }

        self.surface.clear();

        for &page_index in &new_rendered_pages {
            if !self.composite_images.contains_key(&page_index) {
                self.create_composite_image(page_index);
            }
            self.initiate_page_tile_requests(page_index);
        }

        let previous = std::mem::replace(&mut self.rendered_pages, new_rendered_pages);
        for page_index in previous {
            if !self.rendered_pages.contains(&page_index) {
                self.composite_images.remove(&page_index);
            }
        }

        self.paint();
    }

    fn create_composite_image(&mut self, page_index: usize) {
        let (Some(resolver), Some(page)) = (
            self.source_resolver.as_ref(),
            self.page_lookup.get(page_index),
        ) else {
            return;
        };

        let mut composite = CompositeImage::new(resolver.zoom_levels(page));
        composite.update_from_cache(&self.cache);

        self.next_generation += 1;
        self.composite_images.insert(
            page_index,
            PageSlot {
                generation: self.next_generation,
                composite,
            },
        );
    }

    fn initiate_page_tile_requests(&mut self, page_index: usize) {
        let Some(slot) = self.composite_images.get(&page_index) else {
            return;
        };
        let generation = slot.generation;
        let Some(best_level) = slot.composite.best_level() else {
            return;
        };

        let missing: Vec<TileSource> = best_level
            .tiles
            .iter()
            .filter(|source| {
                !self.pending_requests.contains_key(&source.url)
                    && !self.cache.has(&source.url)
                    && self.is_tile_visible(page_index, source)
            })
            .cloned()
            .collect();

        for source in missing {
            let handle = self.requester.request(&source);
            self.stats.requests_issued += 1;
            if handle.is_aborted() {
                // 请求方已无法受理，按失败处理，下一次渲染再请求
                warn!("[Renderer] request for tile {} refused", source.url);
                self.stats.requests_failed += 1;
                continue;
            }
            self.pending_requests.insert(
                source.url.clone(),
                PendingRequest {
                    page_index,
                    generation,
                    source,
                    handle,
                },
            );
        }
    }

    fn handle_completion(&mut self, completion: RequestCompletion) {
        let RequestCompletion {
            ticket,
            id,
            outcome,
        } = completion;

        match self.pending_requests.get(&id) {
            Some(pending) if pending.handle.ticket() == ticket => {}
            _ => {
                debug!("[Renderer] completion for unknown request ...{}", id.short());
                return;
            }
        }
        let Some(pending) = self.pending_requests.remove(&id) else {
            return;
        };

        match outcome {
            Ok(image) => self.on_tile_loaded(pending, image),
            Err(err) => {
                // 不重试；仍然可见的话下一次渲染会重新请求
                warn!("[Renderer] tile {} failed: {:#}", id, err);
                self.stats.requests_failed += 1;
            }
        }
    }

    fn on_tile_loaded(&mut self, pending: PendingRequest, image: DynamicImage) {
        let PendingRequest {
            page_index,
            generation,
            source,
            ..
        } = pending;
        self.cache.put(source.url.clone(), image);

        // 页面重建后瓦片几何可能已变（如缩放），以当前合成图中的定义为准
        let current = match self.composite_images.get_mut(&page_index) {
            Some(slot) if slot.generation == generation || slot.composite.contains(&source.url) => {
                if slot.generation != generation {
                    debug!(
                        "[Renderer] page {} rebuilt while tile ...{} was loading",
                        page_index,
                        source.url.short()
                    );
                    self.stats.stale_completions += 1;
                }
                slot.composite.update_with_loaded_urls([&source.url]);
                slot.composite.tile(&source.url).cloned()
            }
            _ => None,
        };

        let Some(source) = current else {
            debug!(
                "[Renderer] page {} no longer rendered, tile ...{} cached only",
                page_index,
                source.url.short()
            );
            return;
        };

        if self.is_tile_visible(page_index, &source) {
            self.paint();
        } else {
            debug!(
                "[Renderer] Page {}, tile ({}, {}) no longer visible on image load",
                page_index, source.row, source.col
            );
        }
    }

    fn paint(&mut self) {
        if self.cache.eviction_count() != self.synced_evictions {
            self.resync_composite_images();
        }
        self.stats.paints += 1;

        let mut rendered_tiles = Vec::new();
        for page_index in self.rendered_pages.clone() {
            let tiles: Vec<TileSource> = match self.composite_images.get(&page_index) {
                Some(slot) => slot.composite.get_tiles().into_iter().cloned().collect(),
                None => continue,
            };

            for tile in tiles {
                if !self.is_tile_visible(page_index, &tile) {
                    continue;
                }
                match self.cache.get(&tile.url) {
                    Some(image) => {
                        self.draw_tile(page_index, &tile, &image);
                        rendered_tiles.push(tile.url);
                    }
                    None => {
                        error!(
                            "[Renderer] Image for {} not cached (this should not be possible)",
                            tile.url
                        );
                        self.stats.consistency_errors += 1;
                    }
                }
            }
        }
        self.stats.tiles_drawn += rendered_tiles.len() as u64;

        let (added, removed) = find_changes(&self.rendered_tiles, &rendered_tiles);
        for url in &added {
            debug!("[Renderer] Tile ...{} now visible", url.short());
            self.cache.acquire(url);
        }
        for url in &removed {
            debug!("[Renderer] Tile ...{} not visible", url.short());
            self.cache.release(url);
        }

        // 释放可能触发了淘汰
        if !removed.is_empty() {
            self.resync_composite_images();
        }

        self.rendered_tiles = rendered_tiles;
    }

    fn resync_composite_images(&mut self) {
        for slot in self.composite_images.values_mut() {
            slot.composite.update_from_cache(&self.cache);
        }
        self.synced_evictions = self.cache.eviction_count();
    }

    fn draw_tile(&mut self, page_index: usize, tile: &TileSource, image: &DynamicImage) {
        let Some(tile_offset) = self.tile_document_offset(page_index, tile) else {
            return;
        };
        let document = self.document_dimensions().unwrap_or_default();

        // 文档比视口小时居中显示
        let viewport_padding_x = ((self.viewport.width - document.width) / 2.0).max(0.0);
        let viewport_padding_y = ((self.viewport.height - document.height) / 2.0).max(0.0);

        let viewport_offset_x = tile_offset.left - self.viewport.left + viewport_padding_x;
        let viewport_offset_y = tile_offset.top - self.viewport.top + viewport_padding_y;

        let dest_x_offset = (-viewport_offset_x).max(0.0);
        let dest_y_offset = (-viewport_offset_y).max(0.0);

        let ratio = tile.scale_ratio;
        let source_x = dest_x_offset / ratio;
        let source_y = dest_y_offset / ratio;

        let canvas_x = viewport_offset_x.max(0.0);
        let canvas_y = viewport_offset_y.max(0.0);

        // 目标尺寸不超过图像实际尺寸
        let dest_width =
            tile.dimensions.width.min(image.width() as f64 * ratio) - dest_x_offset;
        let dest_height =
            tile.dimensions.height.min(image.height() as f64 * ratio) - dest_y_offset;
        if dest_width <= 0.0 || dest_height <= 0.0 {
            return;
        }

        let source_width = dest_width / ratio;
        let source_height = dest_height / ratio;

        self.surface.draw_image(
            image,
            Rect::new(source_x, source_y, source_x + source_width, source_y + source_height),
            Rect::new(canvas_x, canvas_y, canvas_x + dest_width, canvas_y + dest_height),
        );
    }

    fn is_tile_visible(&self, page_index: usize, source: &TileSource) -> bool {
        self.tile_document_offset(page_index, source)
            .is_some_and(|offset| {
                self.viewport
                    .intersects_region(&Rect::from_origin(offset, source.dimensions))
            })
    }

    fn tile_document_offset(&self, page_index: usize, source: &TileSource) -> Option<Offset> {
        self.page_lookup
            .get(page_index)
            .map(|page| page.image_offset() + source.offset)
    }

    fn notify_view_did_update(&mut self, target_page: Option<usize>) {
        if !self.hooks.wants_update() {
            return;
        }
        let pages = self.page_info_for_update_hook();
        self.hooks.view_did_update(&pages, target_page);
    }

    fn page_info_for_update_hook(&self) -> Vec<RenderedPageInfo> {
        self.rendered_pages
            .iter()
            .filter_map(|&index| self.page_lookup.get(index))
            .map(|page| RenderedPageInfo {
                index: page.index,
                dimensions: page.dimensions,
                group_index: page.group_index,
                padding_region_offset: page.region().origin(),
                image_offset: page.image_offset(),
            })
            .collect()
    }
}

/// 两次绘制之间新增和移除的瓦片，保持原有顺序
fn find_changes(old: &[TileId], new: &[TileId]) -> (Vec<TileId>, Vec<TileId>) {
    let old_set: HashSet<&TileId> = old.iter().collect();
    let new_set: HashSet<&TileId> = new.iter().collect();

    let added = new
        .iter()
        .filter(|url| !old_set.contains(url))
        .cloned()
        .collect();
    let removed = old
        .iter()
        .filter(|url| !new_set.contains(url))
        .cloned()
        .collect();
    (added, removed)
}
