use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// 编码后的图片
///
/// 以 `data:<媒体类型>;base64,<内容>` 形式保存的不透明图片值，
/// 扫描件、签名、收件人照片都使用这一类型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedImage(String);

impl EncodedImage {
    /// 直接包装一个 data URL（来自拍照/签名等外部组件）
    pub fn from_data_url(data_url: impl Into<String>) -> Self {
        Self(data_url.into())
    }

    /// 从原始字节编码
    pub fn from_bytes(media_type: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{};base64,{}", media_type, STANDARD.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// 媒体类型，例如 `image/jpeg`
    pub fn media_type(&self) -> Option<&str> {
        let rest = self.0.strip_prefix("data:")?;
        let (header, _) = rest.split_once(',')?;
        header.split(';').next().filter(|m| !m.is_empty())
    }

    /// 解码出原始字节，非 base64 data URL 时返回 None
    pub fn decode_bytes(&self) -> Option<Vec<u8>> {
        let (header, payload) = self.0.split_once(',')?;
        if !header.ends_with(";base64") {
            return None;
        }
        STANDARD.decode(payload).ok()
    }
}

impl std::fmt::Display for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 图片内容可能很长，只显示类型和大小
        write!(
            f,
            "<{} {} 字节>",
            self.media_type().unwrap_or("unknown"),
            self.0.len()
        )
    }
}
