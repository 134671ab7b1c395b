//! 批量录入处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责一次完整的批量录入：
//!
//! 1. **应用初始化**：打开存储、创建提取服务与流水线
//! 2. **批量加载**：扫描待录入目录中的所有源文件
//! 3. **展开与提取**：委托 `BatchPipeline` 展开并并发提取
//! 4. **提交**：已完成项与配置中的批次公共字段合并后一次写入存储
//! 5. **全局统计**：汇总本次录入的结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个批次项的细节
//! - **资源所有者**：唯一持有 `DocumentStore` 的模块

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, BatchError};
use crate::infrastructure::{FileBackend, StoreBackend};
use crate::models::{load_all_source_files, Document, ProcessingState};
use crate::orchestrator::ingestion::{self, BatchPipeline, BatchSummary, CommonFields};
use crate::services::{DocumentStore, ExtractionClient, LlmExtractionClient};
use crate::utils::logging;

/// 一次运行的结果
#[derive(Debug, Default)]
pub struct RunReport {
    /// 读取到的源文件数
    pub files: usize,
    pub summary: BatchSummary,
    /// 本次写入存储的文档
    pub created: Vec<Document>,
}

/// 应用主结构
pub struct App<E: ExtractionClient = LlmExtractionClient, B: StoreBackend = FileBackend> {
    config: Config,
    pipeline: BatchPipeline<E>,
    store: DocumentStore<B>,
}

impl App {
    /// 初始化应用（文件存储 + LLM 提取服务）
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate()?;

        let store = DocumentStore::open(FileBackend::new(&config.store_path));
        let client = LlmExtractionClient::new(&config);

        Ok(Self::with_parts(config, client, store))
    }
}

impl<E: ExtractionClient, B: StoreBackend> App<E, B> {
    /// 用给定的提取服务和存储组装应用
    pub fn with_parts(config: Config, client: E, store: DocumentStore<B>) -> Self {
        logging::log_startup(
            &config.store_path,
            &config.intake_folder,
            config.max_concurrent_extractions,
        );

        if let Some(notice) = store.corruption_notice() {
            warn!("⚠️ 已有存储无法读取，将以空集合继续: {}", notice);
        }
        info!("📂 存储中已有 {} 份文档", store.len());

        let pipeline = BatchPipeline::new(client, config.max_concurrent_extractions);
        Self {
            config,
            pipeline,
            store,
        }
    }

    pub fn store(&self) -> &DocumentStore<B> {
        &self.store
    }

    /// 运行应用主逻辑
    pub async fn run(&mut self) -> Result<RunReport> {
        // 递送人为空时提交必然失败，提前结束以免白白调用提取服务
        if self.config.delivered_by.trim().is_empty() {
            return Err(AppError::missing_field("deliveredBy").into());
        }

        info!("\n📁 正在扫描待录入的文件...");
        let files = load_all_source_files(&self.config.intake_folder).await?;

        let mut report = RunReport {
            files: files.len(),
            ..Default::default()
        };
        if files.is_empty() {
            warn!("⚠️ 没有找到待录入的文件，程序结束");
            return Ok(report);
        }

        let items = self.pipeline.expand(files).await;
        logging::log_files_loaded(report.files, items.len());
        if items.is_empty() {
            warn!("⚠️ 没有可处理的图片或 PDF 页面，程序结束");
            return Ok(report);
        }

        let total = items.len();
        let mut done = 0;
        let items = self
            .pipeline
            .process_all_with_progress(items, |item| {
                if matches!(item.state, ProcessingState::Analyzing) {
                    debug!("⏳ 开始分析: {}", item.display_name());
                    return;
                }
                done += 1;
                logging::log_progress(done, total, &item.display_name(), item.is_complete());
            })
            .await;

        report.summary = ingestion::summary(&items);
        logging::log_batch_complete(&report.summary);

        let common = CommonFields {
            delivered_by: self.config.delivered_by.clone(),
            signing_office: self.config.signing_office.clone(),
        };
        let drafts = match ingestion::commit(&items, &common) {
            Ok(drafts) => drafts,
            Err(AppError::Batch(BatchError::NothingToCommit { total })) => {
                warn!("⚠️ {} 个批次项全部提取失败，没有文档可以保存", total);
                return Ok(report);
            }
            Err(e) => return Err(e.into()),
        };

        report.created = self.store.create_batch(drafts)?;
        logging::print_final_stats(
            &report.summary,
            report.created.len(),
            &self.store.backend().describe(),
        );

        Ok(report)
    }
}
