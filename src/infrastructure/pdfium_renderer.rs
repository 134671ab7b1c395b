//! 整页渲染 - 基础设施层
//!
//! 用 PDFium 把每一页完整渲染为 PNG，文字、矢量图形和内嵌图片都会画出来。
//! PDFium 动态库在运行时加载；`Pdfium` 不是 Send，每次调用重新绑定一次，
//! 操作系统会缓存已加载的动态库
//!
//! 查找顺序：
//! 1. `PDFIUM_DYNAMIC_LIB_PATH` 环境变量指定的文件
//! 2. 可执行文件所在目录
//! 3. 系统库路径

use image::{DynamicImage, RgbaImage};
use pdfium_render::prelude::*;
use tracing::debug;

use crate::error::RenderError;
use crate::infrastructure::pdf_renderer::{encode_png, PageRenderer, RenderedPage};

/// 渲染分辨率
pub const RENDER_DPI: f32 = 200.0;

/// 渲染结果的单边最大像素数
const MAX_DIMENSION_PX: f32 = 4096.0;

const POINTS_PER_INCH: f32 = 72.0;

/// 基于 PDFium 的整页渲染器
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumPageRenderer;

impl PdfiumPageRenderer {
    /// PDFium 动态库当前是否可以加载
    pub fn is_available() -> bool {
        load_pdfium().is_ok()
    }
}

impl PageRenderer for PdfiumPageRenderer {
    fn render_pages(
        &self,
        document: &[u8],
    ) -> Result<Vec<Result<RenderedPage, RenderError>>, RenderError> {
        let pdfium = load_pdfium()?;
        let doc = pdfium
            .load_pdf_from_byte_slice(document, None)
            .map_err(|e| RenderError::Parse(e.to_string()))?;

        let pages = doc.pages();
        debug!("PDFium: 共 {} 页", pages.len());

        Ok(pages
            .iter()
            .enumerate()
            .map(|(index, page)| render_page(&page, index as u32 + 1))
            .collect())
    }
}

fn load_pdfium() -> Result<Pdfium, RenderError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        let bindings = Pdfium::bind_to_library(&path)
            .map_err(|e| RenderError::Unavailable(format!("{path}: {e}")))?;
        return Ok(Pdfium::new(bindings));
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()))
    {
        let lib_path =
            Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            debug!("从 {} 加载 PDFium", exe_dir.display());
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| RenderError::Unavailable(format!("未找到 PDFium 动态库: {e}")))?;
    Ok(Pdfium::new(bindings))
}

fn render_page(page: &PdfPage, number: u32) -> Result<RenderedPage, RenderError> {
    let page_error = |message: String| RenderError::Page {
        page: number,
        message,
    };

    let (width, height) = target_size(page.width().value, page.height().value);
    let config = PdfRenderConfig::new()
        .set_target_width(width as i32)
        .set_maximum_height(height as i32);

    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| page_error(format!("渲染失败: {e}")))?;

    let raw = bitmap.as_raw_bytes().to_vec();
    let img = bgra_to_image(bitmap.width() as u32, bitmap.height() as u32, &raw)
        .ok_or_else(|| page_error("位图数据长度与尺寸不符".to_string()))?;

    encode_png(&img).map_err(page_error)
}

/// 按 DPI 计算目标像素尺寸，超过上限时等比缩小
fn target_size(width_points: f32, height_points: f32) -> (u32, u32) {
    let scale = RENDER_DPI / POINTS_PER_INCH;
    let width = (width_points * scale).max(1.0);
    let height = (height_points * scale).max(1.0);

    let ratio = (MAX_DIMENSION_PX / width.max(height)).min(1.0);
    (
        ((width * ratio) as u32).max(1),
        ((height * ratio) as u32).max(1),
    )
}

/// PDFium 位图为 BGRA，每行可能有对齐填充
fn bgra_to_image(width: u32, height: u32, raw: &[u8]) -> Option<DynamicImage> {
    if width == 0 || height == 0 {
        return None;
    }
    let row = width as usize * 4;
    let stride = raw.len() / height as usize;
    if stride < row {
        return None;
    }

    let mut rgba = Vec::with_capacity(row * height as usize);
    for line in raw.chunks_exact(stride).take(height as usize) {
        for px in line[..row].chunks_exact(4) {
            rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
        }
    }
    RgbaImage::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a4_at_render_dpi() {
        let (w, h) = target_size(595.0, 842.0);
        assert!((1600..1700).contains(&w), "A4 宽度: {w}");
        assert!((2300..2400).contains(&h), "A4 高度: {h}");
    }

    #[test]
    fn test_oversized_page_is_capped() {
        let (w, h) = target_size(5000.0, 2500.0);
        assert_eq!(w, 4096);
        assert_eq!(h, 2048);
    }

    #[test]
    fn test_bgra_swapped_and_padding_dropped() {
        // 1x2 位图，每行 8 字节（4 字节像素 + 4 字节填充）
        let raw = [
            10, 20, 30, 255, 0, 0, 0, 0, //
            1, 2, 3, 128, 0, 0, 0, 0,
        ];
        let img = bgra_to_image(1, 2, &raw).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(0, 0).0, [30, 20, 10, 255]);
        assert_eq!(img.get_pixel(0, 1).0, [3, 2, 1, 128]);

        assert!(bgra_to_image(2, 2, &raw[..8]).is_none());
    }
}
