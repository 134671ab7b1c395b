//! # Docflow
//!
//! 公文收发登记：收文录入、送签、发送、归档，以及扫描件的批量录入
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 只暴露能力，不包含业务规则
//! - `StoreBackend` - 文档集合的序列化文本槽位（内存 / 文件）
//! - `Clock` / `IdGenerator` - 当前时间与新标识，测试中可替换
//! - `PageRenderer` - 多页 PDF 拆分为逐页图片（PDFium 整页渲染，lopdf 兜底）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `DocumentStore` - 文档集合的加载、创建、更新
//! - `lifecycle` - 状态迁移规则与状态历史
//! - `ExtractionClient` - 从扫描图片提取文档字段
//! - `dashboard` - 收文 / 已发送两个列表及搜索
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 与界面无关的状态机
//! - `navigation` - 视图之间的跳转
//! - `manual_intake` / `outgoing_entry` - 手工收文与发文录入
//! - `dispatch_form` - 发送表单
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/ingestion` - 批量录入流水线，有上限的并发提取
//! - `orchestrator/batch_processor` - 一次完整的目录录入
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{FileBackend, MemoryBackend, StoreBackend};
pub use models::{
    BatchItem, DispatchedDetails, Document, DocumentDraft, DocumentStatus, EncodedImage,
    IntakeSource, SourceFile,
};
pub use orchestrator::{App, BatchPipeline, CommonFields, RunReport};
pub use services::{DocumentStore, ExtractionClient, LlmExtractionClient};
