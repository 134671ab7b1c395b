//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量录入和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量录入处理器
//! - 管理应用生命周期（初始化、运行）
//! - 扫描待录入目录
//! - 持有文档存储
//! - 输出全局统计信息
//!
//! ### `ingestion` - 批量录入流水线
//! - 把源文件展开为批次项（PDF 按页展开）
//! - 每项一个提取任务，按 id 合并结果
//! - 编辑已完成项、提交为创建请求
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (一次运行)
//!     ↓
//! ingestion::BatchPipeline (处理 Vec<BatchItem>)
//!     ↓
//! services (能力层：extraction / document_store / lifecycle)
//!     ↓
//! infrastructure (基础设施：clock / store_backend / pdf_renderer)
//! ```

pub mod batch_processor;
pub mod ingestion;

pub use batch_processor::{App, RunReport};
pub use ingestion::{
    commit, edit_field, merge_outcome, summary, BatchPipeline, BatchSummary, CommonFields,
    ItemOutcome,
};
