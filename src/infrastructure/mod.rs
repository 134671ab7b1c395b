//! 基础设施层（Infrastructure Layer）
//!
//! 只暴露能力，不包含业务规则：
//! - `clock` - 当前时间与新标识
//! - `store_backend` - 序列化文本的读写槽位
//! - `pdf_renderer` / `pdfium_renderer` - 多页文档拆分为逐页图片

pub mod clock;
pub mod pdf_renderer;
pub mod pdfium_renderer;
pub mod store_backend;

pub use clock::{Clock, IdGenerator, ManualClock, SequentialIds, SystemClock, UuidIdGenerator};
pub use pdf_renderer::{
    DefaultPageRenderer, FallbackRenderer, LopdfPageRenderer, PageRenderer, RenderedPage,
};
pub use pdfium_renderer::PdfiumPageRenderer;
pub use store_backend::{FileBackend, MemoryBackend, StoreBackend};
