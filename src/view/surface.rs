use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use std::path::Path;

use crate::geometry::Rect;

/// 2D 绘制目标，尺寸等于视口的像素尺寸
pub trait RasterSurface {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn resize(&mut self, width: u32, height: u32);

    fn clear(&mut self);

    /// 把图像的 `source` 区域（图像像素）缩放绘制到画布的 `dest` 区域（画布像素）
    fn draw_image(&mut self, image: &DynamicImage, source: Rect, dest: Rect);
}

/// 基于内存 RGBA 缓冲的画布
pub struct ImageSurface {
    canvas: RgbaImage,
    background: Rgba<u8>,
}

impl ImageSurface {
    pub fn new(width: u32, height: u32) -> Self {
        let background = Rgba([0, 0, 0, 0]);
        Self {
            canvas: RgbaImage::from_pixel(width, height, background),
            background,
        }
    }

    pub fn with_background(mut self, background: Rgba<u8>) -> Self {
        self.background = background;
        self.clear();
        self
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.canvas
            .save(path)
            .with_context(|| format!("failed to save frame to {}", path.display()))
    }
}

impl RasterSurface for ImageSurface {
    fn width(&self) -> u32 {
        self.canvas.width()
    }

    fn height(&self) -> u32 {
        self.canvas.height()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.canvas = RgbaImage::from_pixel(width, height, self.background);
    }

    fn clear(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = self.background;
        }
    }

    fn draw_image(&mut self, image: &DynamicImage, source: Rect, dest: Rect) {
        let (image_width, image_height) = image.dimensions();
        let sx = (source.left.max(0.0).floor() as u32).min(image_width);
        let sy = (source.top.max(0.0).floor() as u32).min(image_height);
        let sw = (source.width().round().max(0.0) as u32).min(image_width - sx);
        let sh = (source.height().round().max(0.0) as u32).min(image_height - sy);
        let dw = dest.width().round().max(0.0) as u32;
        let dh = dest.height().round().max(0.0) as u32;
        if sw == 0 || sh == 0 || dw == 0 || dh == 0 {
            return;
        }

        let cropped = image.crop_imm(sx, sy, sw, sh);
        let scaled = if (sw, sh) == (dw, dh) {
            cropped.to_rgba8()
        } else {
            imageops::resize(&cropped, dw, dh, FilterType::Triangle)
        };
        imageops::overlay(
            &mut self.canvas,
            &scaled,
            dest.left.round() as i64,
            dest.top.round() as i64,
        );
    }
}
