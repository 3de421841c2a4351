use log::debug;

use super::{
    Dimensions, DocumentLayout, GeometryProvider, GroupPage, LayoutConfig, Offset, PageEntry,
    PageGroup, Rect, TileId, TileSource, ZoomLevel,
};

/// 滚动方向
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Orientation {
    Vertical,
    Horizontal,
}

/// 单页一组、顺序排列的简单布局，瓦片按 2 的幂金字塔切分
///
/// 瓦片标识形如 `{page}/{zoom}/{row}_{col}.{ext}`，可以直接作为瓦片目录下的相对路径。
pub struct StackedLayout {
    /// 每页最高分辨率下的原始尺寸
    pages: Vec<Dimensions>,
    orientation: Orientation,
    max_zoom: u32,
    tile_size: u32,
    padding: f64,
    extension: String,
    zoom: u32,
}

impl StackedLayout {
    pub fn new(pages: Vec<Dimensions>, max_zoom: u32) -> Self {
        Self {
            pages,
            orientation: Orientation::Vertical,
            max_zoom,
            tile_size: 256,
            padding: 10.0,
            extension: "jpg".to_string(),
            zoom: max_zoom,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size.max(1);
        self
    }

    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = padding.max(0.0);
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn max_zoom(&self) -> u32 {
        self.max_zoom
    }

    fn scale(&self) -> f64 {
        2f64.powi(self.zoom as i32 - self.max_zoom as i32)
    }

    fn display_size(&self, index: usize) -> Option<Dimensions> {
        let scale = self.scale();
        self.pages
            .get(index)
            .map(|native| Dimensions::new(native.width * scale, native.height * scale))
    }

    /// 垂直布局
    fn layout_vertical(&self) -> DocumentLayout {
        let p = self.padding;
        let sizes: Vec<Dimensions> = (0..self.pages.len())
            .filter_map(|i| self.display_size(i))
            .collect();
        let doc_width = sizes
            .iter()
            .map(|d| d.width + 2.0 * p)
            .fold(0.0, f64::max);

        let mut current_y = 0.0;
        let mut groups = Vec::with_capacity(sizes.len());
        for (index, size) in sizes.iter().enumerate() {
            let group_size = Dimensions::new(size.width + 2.0 * p, size.height + p);
            let left = (doc_width - group_size.width) / 2.0;
            groups.push(single_page_group(index, Offset::new(current_y, left), group_size, p));
            current_y += group_size.height;
        }

        DocumentLayout {
            page_groups: groups,
            dimensions: Dimensions::new(doc_width, current_y + p),
        }
    }

    /// 水平布局
    fn layout_horizontal(&self) -> DocumentLayout {
        let p = self.padding;
        let sizes: Vec<Dimensions> = (0..self.pages.len())
            .filter_map(|i| self.display_size(i))
            .collect();
        let doc_height = sizes
            .iter()
            .map(|d| d.height + 2.0 * p)
            .fold(0.0, f64::max);

        let mut current_x = 0.0;
        let mut groups = Vec::with_capacity(sizes.len());
        for (index, size) in sizes.iter().enumerate() {
            let group_size = Dimensions::new(size.width + p, size.height + 2.0 * p);
            let top = (doc_height - group_size.height) / 2.0;
            groups.push(single_page_group(index, Offset::new(top, current_x), group_size, p));
            current_x += group_size.width;
        }

        DocumentLayout {
            page_groups: groups,
            dimensions: Dimensions::new(current_x + p, doc_height),
        }
    }
}

fn single_page_group(index: usize, origin: Offset, size: Dimensions, padding: f64) -> PageGroup {
    PageGroup {
        region: Rect::from_origin(origin, size),
        padding: Offset::new(padding, padding),
        pages: vec![GroupPage {
            index,
            dimensions: size,
            group_offset: Offset::default(),
        }],
    }
}

impl GeometryProvider for StackedLayout {
    fn layout(&mut self, config: &LayoutConfig) -> anyhow::Result<DocumentLayout> {
        if config.zoom_level > self.max_zoom {
            anyhow::bail!(
                "zoom level {} exceeds maximum {}",
                config.zoom_level,
                self.max_zoom
            );
        }
        self.zoom = config.zoom_level;

        let layout = match self.orientation {
            Orientation::Vertical => self.layout_vertical(),
            Orientation::Horizontal => self.layout_horizontal(),
        };
        debug!(
            "[StackedLayout] zoom:{} pages:{} total:{:?}",
            self.zoom,
            self.pages.len(),
            layout.dimensions
        );
        Ok(layout)
    }

    fn zoom_levels(&self, page: &PageEntry) -> Vec<ZoomLevel> {
        let Some(size) = self.display_size(page.index) else {
            return Vec::new();
        };

        (0..=self.zoom)
            .map(|k| {
                let factor = 2f64.powi(k as i32);
                let tile_extent = self.tile_size as f64 * factor;
                let rows = ((size.height / tile_extent).ceil() as usize).max(1);
                let cols = ((size.width / tile_extent).ceil() as usize).max(1);
                let source_zoom = self.zoom - k;

                let mut tiles = Vec::with_capacity(rows * cols);
                for row in 0..rows {
                    for col in 0..cols {
                        let top = row as f64 * tile_extent;
                        let left = col as f64 * tile_extent;
                        tiles.push(TileSource {
                            url: TileId::new(format!(
                                "{}/{}/{}_{}.{}",
                                page.index, source_zoom, row, col, self.extension
                            )),
                            row,
                            col,
                            dimensions: Dimensions::new(
                                tile_extent.min(size.width - left),
                                tile_extent.min(size.height - top),
                            ),
                            offset: Offset::new(top, left),
                            scale_ratio: factor,
                        });
                    }
                }
                ZoomLevel::new(rows, cols, tiles)
            })
            .collect()
    }
}
