//! 多页文档渲染 - 基础设施层
//!
//! 把 PDF 拆成逐页的栅格图片：
//! - `PdfiumPageRenderer`（见 `pdfium_renderer`）整页渲染，文字和矢量内容都会画出来
//! - `LopdfPageRenderer` 只取每页最大的内嵌图片：JPEG 原样输出，其他像素数据重新编码为 PNG
//! - `FallbackRenderer` 组合两者，PDFium 不可用或某页失败时退回 lopdf

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::io::Cursor;

use crate::error::RenderError;
use crate::infrastructure::pdfium_renderer::PdfiumPageRenderer;

/// 单页渲染结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

/// 页面渲染器
pub trait PageRenderer: Send + Sync + 'static {
    /// 按文档顺序渲染全部页面
    ///
    /// 外层错误表示整个文档无法解析；内层按页给出结果，单页失败不影响其他页
    fn render_pages(
        &self,
        document: &[u8],
    ) -> Result<Vec<Result<RenderedPage, RenderError>>, RenderError>;
}

/// 主渲染器优先的组合渲染器
///
/// 主渲染器整体失败（例如动态库缺失）时整份交给备用渲染器；
/// 主渲染器只有部分页面失败时，这些页面改用备用渲染器的同页结果
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackRenderer<P, F> {
    primary: P,
    fallback: F,
}

/// 流水线默认使用的渲染器
pub type DefaultPageRenderer = FallbackRenderer<PdfiumPageRenderer, LopdfPageRenderer>;

impl<P: PageRenderer, F: PageRenderer> FallbackRenderer<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: PageRenderer, F: PageRenderer> PageRenderer for FallbackRenderer<P, F> {
    fn render_pages(
        &self,
        document: &[u8],
    ) -> Result<Vec<Result<RenderedPage, RenderError>>, RenderError> {
        let pages = match self.primary.render_pages(document) {
            Ok(pages) => pages,
            Err(RenderError::Unavailable(reason)) => {
                tracing::debug!("整页渲染不可用，改为提取内嵌图片: {}", reason);
                return self.fallback.render_pages(document);
            }
            Err(e) => {
                tracing::warn!("整页渲染失败，改为提取内嵌图片: {}", e);
                return self.fallback.render_pages(document);
            }
        };

        if pages.iter().all(Result::is_ok) {
            return Ok(pages);
        }
        let backup = match self.fallback.render_pages(document) {
            Ok(backup) => backup,
            Err(_) => return Ok(pages),
        };

        Ok(pages
            .into_iter()
            .enumerate()
            .map(|(index, page)| match (page, backup.get(index)) {
                (Ok(page), _) => Ok(page),
                (Err(_), Some(Ok(fallback_page))) => Ok(fallback_page.clone()),
                (Err(e), _) => Err(e),
            })
            .collect())
    }
}

/// 基于 lopdf 的页面渲染器
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfPageRenderer;

impl PageRenderer for LopdfPageRenderer {
    fn render_pages(
        &self,
        document: &[u8],
    ) -> Result<Vec<Result<RenderedPage, RenderError>>, RenderError> {
        let doc = Document::load_mem(document).map_err(|e| RenderError::Parse(e.to_string()))?;

        let pages = doc.get_pages();
        tracing::debug!("PDF 共 {} 页", pages.len());

        Ok(pages
            .iter()
            .map(|(&number, &page_id)| render_page(&doc, number, page_id))
            .collect())
    }
}

fn render_page(doc: &Document, number: u32, page_id: ObjectId) -> Result<RenderedPage, RenderError> {
    let page_error = |message: String| RenderError::Page {
        page: number,
        message,
    };

    let page = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| page_error(format!("页面对象无效: {e}")))?;

    let resources =
        page_resources(doc, page).ok_or_else(|| page_error("页面没有 /Resources".to_string()))?;
    let xobjects = resources
        .get(b"XObject")
        .ok()
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
        .ok_or_else(|| page_error("页面没有内嵌图片".to_string()))?;

    let mut largest: Option<RenderedPage> = None;
    for (_name, obj) in xobjects.iter() {
        let stream = match resolve(doc, obj) {
            Object::Stream(stream) => stream,
            _ => continue,
        };
        if !is_image(&stream.dict) {
            continue;
        }

        match encode_stream_image(stream) {
            Ok(rendered) => {
                if largest
                    .as_ref()
                    .map_or(true, |prev| rendered.bytes.len() > prev.bytes.len())
                {
                    largest = Some(rendered);
                }
            }
            Err(message) => {
                tracing::debug!("第 {} 页的一张图片无法解码: {}", number, message);
            }
        }
    }

    largest.ok_or_else(|| page_error("页面没有可用的栅格图片".to_string()))
}

/// 页面资源，允许从父节点继承
fn page_resources<'a>(doc: &'a Document, page: &'a Dictionary) -> Option<&'a Dictionary> {
    let mut current = page;
    // 页面树深度有限，防止循环引用
    for _ in 0..32 {
        if let Ok(obj) = current.get(b"Resources") {
            return resolve(doc, obj).as_dict().ok();
        }
        let parent = current.get(b"Parent").ok()?;
        current = resolve(doc, parent).as_dict().ok()?;
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn is_image(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Image")
}

/// 图片流最后一个过滤器（即图片编码）
fn image_filter(dict: &Dictionary) -> Option<&[u8]> {
    match dict.get(b"Filter").ok()? {
        Object::Name(name) => Some(name.as_slice()),
        Object::Array(filters) => filters.iter().rev().find_map(|f| match f {
            Object::Name(name) => Some(name.as_slice()),
            _ => None,
        }),
        _ => None,
    }
}

fn encode_stream_image(stream: &Stream) -> Result<RenderedPage, String> {
    match image_filter(&stream.dict) {
        Some(b"DCTDecode") => {
            return Ok(RenderedPage {
                media_type: "image/jpeg",
                bytes: stream.content.clone(),
            })
        }
        Some(b"JPXDecode") => {
            return Ok(RenderedPage {
                media_type: "image/jp2",
                bytes: stream.content.clone(),
            })
        }
        _ => {}
    }

    let content = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    // 有些流本身就是完整的图片文件
    if let Ok(img) = image::load_from_memory(&content) {
        return encode_png(&img);
    }

    let img = reconstruct_raw(&stream.dict, content)?;
    encode_png(&img)
}

/// 按 /Width /Height /ColorSpace 还原原始像素（仅支持 8 位灰度和 RGB）
fn reconstruct_raw(dict: &Dictionary, pixels: Vec<u8>) -> Result<DynamicImage, String> {
    let width = int_entry(dict, b"Width")? as u32;
    let height = int_entry(dict, b"Height")? as u32;
    let bits = int_entry(dict, b"BitsPerComponent").unwrap_or(8);
    if bits != 8 {
        return Err(format!("不支持 {} 位像素", bits));
    }

    let color_space = match dict.get(b"ColorSpace") {
        Ok(Object::Name(name)) => name.as_slice(),
        _ => b"DeviceRGB".as_slice(),
    };

    let img = match color_space {
        b"DeviceGray" => GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        b"DeviceRGB" => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        other => {
            return Err(format!(
                "不支持的色彩空间: {}",
                String::from_utf8_lossy(other)
            ))
        }
    };

    img.ok_or_else(|| format!("像素数据长度与 {}x{} 不符", width, height))
}

fn int_entry(dict: &Dictionary, key: &[u8]) -> Result<i64, String> {
    dict.get(key)
        .and_then(Object::as_i64)
        .map_err(|_| format!("缺少 /{}", String::from_utf8_lossy(key)))
}

pub(crate) fn encode_png(img: &DynamicImage) -> Result<RenderedPage, String> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| format!("PNG 编码失败: {e}"))?;
    Ok(RenderedPage {
        media_type: "image/png",
        bytes: buf.into_inner(),
    })
}
