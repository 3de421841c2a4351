//! 渲染一帧并保存为 PNG
//!
//! 用法：`cargo run --example render_frame -- [输出路径]`
//!
//! 瓦片根目录（RTILES_TILE_ROOT）存在时从磁盘读取瓦片，否则使用生成的测试瓦片。

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use env_logger::Env;
use image::{DynamicImage, Rgba, RgbaImage};
use log::{info, warn};

use rtiles::geometry::{AnchorPosition, Dimensions};
use rtiles::{
    DecodeService, FileTileDecoder, ImageCache, ImageSurface, LayoutConfig, Renderer,
    StackedLayout, TileDecoder, TileId, ViewHooks, ViewerConfig, Viewport,
};

const TILE_SIZE: u32 = 256;

/// 按瓦片标识生成纯色瓦片，带一像素边框
struct SyntheticDecoder;

impl TileDecoder for SyntheticDecoder {
    fn decode(&self, id: &TileId) -> Result<DynamicImage> {
        let seed = id
            .as_str()
            .bytes()
            .fold(7u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        let fill = Rgba([
            (seed & 0xff) as u8,
            ((seed >> 8) & 0xff) as u8,
            ((seed >> 16) & 0xff) as u8,
            255,
        ]);
        let border = Rgba([40, 40, 40, 255]);

        let image = RgbaImage::from_fn(TILE_SIZE, TILE_SIZE, |x, y| {
            if x == 0 || y == 0 || x == TILE_SIZE - 1 || y == TILE_SIZE - 1 {
                border
            } else {
                fill
            }
        });
        Ok(DynamicImage::ImageRgba8(image))
    }
}

fn main() -> Result<()> {
    let config = ViewerConfig::from_env()?;
    env_logger::Builder::from_env(Env::default().default_filter_or(config.log_filter.as_str()))
        .init();

    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("frame.png"));

    let decoder: Arc<dyn TileDecoder> = if config.tile_root.is_dir() {
        info!("[Demo] reading tiles from {:?}", config.tile_root);
        Arc::new(FileTileDecoder::new(&config.tile_root))
    } else {
        warn!(
            "[Demo] tile root {:?} not found, using generated tiles",
            config.tile_root
        );
        Arc::new(SyntheticDecoder)
    };
    let service = DecodeService::new(decoder, config.request_workers);

    let layout = StackedLayout::new(vec![Dimensions::new(1200.0, 1600.0); 5], 3)
        .with_tile_size(TILE_SIZE);
    let hooks = ViewHooks::new().on_view_did_update(|pages, target| {
        let indices: Vec<usize> = pages.iter().map(|page| page.index).collect();
        info!("[Demo] rendered pages {:?}, target {:?}", indices, target);
    });

    let mut renderer = Renderer::new(
        Viewport::new(1024.0, 768.0),
        ImageSurface::new(1024, 768),
        service,
        ImageCache::new(config.cache_capacity),
        hooks,
    );

    let layout_config = LayoutConfig {
        zoom_level: 2,
        position: AnchorPosition {
            anchor_page: 1,
            vertical_offset: 0.0,
            horizontal_offset: 300.0,
        },
    };
    renderer.load(&layout_config, layout)?;

    let deadline = Instant::now() + Duration::from_secs(10);
    while renderer.pending_request_count() > 0 && Instant::now() < deadline {
        if renderer.process_completed_requests() == 0 {
            thread::sleep(Duration::from_millis(10));
        }
    }
    if renderer.pending_request_count() > 0 {
        warn!(
            "[Demo] {} tiles still loading, saving partial frame",
            renderer.pending_request_count()
        );
    }

    let stats = renderer.stats();
    info!(
        "[Demo] passes:{} paints:{} drawn:{} requests:{} failed:{}",
        stats.render_passes,
        stats.paints,
        stats.tiles_drawn,
        stats.requests_issued,
        stats.requests_failed
    );

    let surface = renderer.destroy();
    surface.save(&output)?;
    info!("[Demo] saved frame to {:?}", output);
    Ok(())
}
