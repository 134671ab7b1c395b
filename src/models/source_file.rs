use phf::phf_map;
use std::path::Path;

/// 按扩展名推断媒体类型
static MEDIA_TYPES: phf::Map<&'static str, &'static str> = phf_map! {
    "jpg" => "image/jpeg",
    "jpeg" => "image/jpeg",
    "png" => "image/png",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "bmp" => "image/bmp",
    "tif" => "image/tiff",
    "tiff" => "image/tiff",
    "pdf" => "application/pdf",
};

/// 未知类型
pub const OCTET_STREAM: &str = "application/octet-stream";

/// 源文件类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// 单张图片
    Image,
    /// 多页文档（PDF）
    Pdf,
    /// 不支持的类型，展开时跳过
    Unsupported,
}

/// 待录入的源文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn kind(&self) -> SourceKind {
        let media_type = self.media_type.trim().to_ascii_lowercase();
        if media_type.starts_with("image/") {
            SourceKind::Image
        } else if media_type == "application/pdf" {
            SourceKind::Pdf
        } else {
            SourceKind::Unsupported
        }
    }
}

/// 根据文件扩展名推断媒体类型
pub fn media_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    MEDIA_TYPES.get(ext.as_str()).copied()
}
