use crate::models::draft::ExtractedFields;
use crate::models::image::EncodedImage;

/// 批次项处理状态
///
/// 完成态携带提取字段，失败态携带错误信息，二者互斥
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingState {
    /// 等待处理
    Pending,
    /// 正在提取
    Analyzing,
    /// 提取完成
    Complete(ExtractedFields),
    /// 提取失败
    Failed(String),
}

impl ProcessingState {
    pub fn label(&self) -> &'static str {
        match self {
            ProcessingState::Pending => "pending",
            ProcessingState::Analyzing => "analyzing",
            ProcessingState::Complete(_) => "complete",
            ProcessingState::Failed(_) => "error",
        }
    }

    /// 是否已有结果（完成或失败）
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            ProcessingState::Complete(_) | ProcessingState::Failed(_)
        )
    }
}

/// 批次项：一个文件或 PDF 中一页的提取与编辑状态
///
/// 只存在于批处理过程中，不会被持久化
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub id: String,
    pub source_file_name: String,
    /// 多页文件中的页码（从 1 开始）
    pub page_number: Option<u32>,
    pub source_image: EncodedImage,
    pub(crate) state: ProcessingState,
}

impl BatchItem {
    /// 创建待处理项
    pub fn pending(
        id: impl Into<String>,
        source_file_name: impl Into<String>,
        page_number: Option<u32>,
        source_image: EncodedImage,
    ) -> Self {
        Self {
            id: id.into(),
            source_file_name: source_file_name.into(),
            page_number,
            source_image,
            state: ProcessingState::Pending,
        }
    }

    pub fn state(&self) -> &ProcessingState {
        &self.state
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, ProcessingState::Complete(_))
    }

    /// 提取字段（仅完成态有值）
    pub fn extracted_fields(&self) -> Option<&ExtractedFields> {
        match &self.state {
            ProcessingState::Complete(fields) => Some(fields),
            _ => None,
        }
    }

    /// 错误信息（仅失败态有值）
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            ProcessingState::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// 用于日志显示的名称
    pub fn display_name(&self) -> String {
        match self.page_number {
            Some(page) => format!("{} 第{}页", self.source_file_name, page),
            None => self.source_file_name.clone(),
        }
    }
}
