//! 批量录入流水线 - 编排层
//!
//! ## 职责
//!
//! 1. **展开**：图片文件 → 一个批次项；PDF → 每页一个批次项
//! 2. **并发提取**：每个待处理项一个任务，互不等待，只受许可数限制
//! 3. **按 id 合并**：结果按完成顺序到达，按 id 写回对应批次项，重复结果忽略
//! 4. **编辑与提交**：修改已完成项的字段，提交时与批次公共字段合并为创建请求
//!
//! 单项失败只记录在该项上，不影响同批其他项

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::error::{AppResult, BatchError, ExtractionError, ValidationError};
use crate::infrastructure::{DefaultPageRenderer, PageRenderer};
use crate::models::{
    BatchItem, DocumentDraft, DocumentField, EncodedImage, ExtractedFields, IntakeSource,
    ProcessingState, SourceFile, SourceKind,
};
use crate::services::ExtractionClient;

/// 单项提取结果
pub type ItemOutcome = Result<ExtractedFields, ExtractionError>;

/// 批次公共字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonFields {
    /// 递送人（必填）
    pub delivered_by: String,
    pub signing_office: Option<String>,
}

/// 各状态数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub pending: usize,
    pub analyzing: usize,
    pub complete: usize,
    pub failed: usize,
}

/// 批量录入流水线
pub struct BatchPipeline<E: ExtractionClient, R: PageRenderer = DefaultPageRenderer> {
    client: Arc<E>,
    renderer: Arc<R>,
    max_concurrent: usize,
    next_item: AtomicU64,
}

impl<E: ExtractionClient> BatchPipeline<E> {
    /// 使用默认的 PDF 渲染器（PDFium 整页渲染，不可用时提取内嵌图片）
    pub fn new(client: E, max_concurrent: usize) -> Self {
        Self::with_renderer(client, DefaultPageRenderer::default(), max_concurrent)
    }
}

impl<E: ExtractionClient, R: PageRenderer> BatchPipeline<E, R> {
    pub fn with_renderer(client: E, renderer: R, max_concurrent: usize) -> Self {
        Self {
            client: Arc::new(client),
            renderer: Arc::new(renderer),
            max_concurrent: max_concurrent.max(1),
            next_item: AtomicU64::new(0),
        }
    }

    fn next_item_id(&self) -> String {
        format!("item_{}", self.next_item.fetch_add(1, Ordering::Relaxed) + 1)
    }

    // ========== 展开 ==========

    /// 把源文件展开为待处理的批次项
    ///
    /// 不支持的类型直接跳过；无法读取的 PDF 或页面记录警告后跳过
    pub async fn expand(&self, files: Vec<SourceFile>) -> Vec<BatchItem> {
        let mut items = Vec::new();

        for file in files {
            match file.kind() {
                SourceKind::Image => {
                    let image = EncodedImage::from_bytes(&file.media_type, &file.bytes);
                    items.push(BatchItem::pending(
                        self.next_item_id(),
                        file.name,
                        None,
                        image,
                    ));
                }
                SourceKind::Pdf => items.extend(self.expand_pdf(file).await),
                SourceKind::Unsupported => {
                    debug!("跳过不支持的文件: {} ({})", file.name, file.media_type);
                }
            }
        }

        items
    }

    async fn expand_pdf(&self, file: SourceFile) -> Vec<BatchItem> {
        let renderer = Arc::clone(&self.renderer);
        let SourceFile { name, bytes, .. } = file;

        let rendered = tokio::task::spawn_blocking(move || renderer.render_pages(&bytes)).await;
        let pages = match rendered {
            Ok(Ok(pages)) => pages,
            Ok(Err(e)) => {
                warn!("⚠️ 跳过 PDF {}: {}", name, e);
                return Vec::new();
            }
            Err(e) => {
                warn!("⚠️ 跳过 PDF {}: 渲染任务异常终止: {}", name, e);
                return Vec::new();
            }
        };

        debug!("📄 {} 共 {} 页", name, pages.len());

        let mut items = Vec::with_capacity(pages.len());
        for (index, page) in pages.into_iter().enumerate() {
            let page_number = index as u32 + 1;
            match page {
                Ok(page) => items.push(BatchItem::pending(
                    self.next_item_id(),
                    name.clone(),
                    Some(page_number),
                    EncodedImage::from_bytes(page.media_type, &page.bytes),
                )),
                Err(e) => warn!("⚠️ 跳过 {} 第{}页: {}", name, page_number, e),
            }
        }
        items
    }

    // ========== 并发提取 ==========

    /// 处理所有待处理项，全部有结果后返回
    pub async fn process_all(&self, items: Vec<BatchItem>) -> Vec<BatchItem> {
        self.process_all_with_progress(items, |_| {}).await
    }

    /// 处理所有待处理项，每项回调两次
    ///
    /// 待处理项在派发时变为 Analyzing 并回调一次，出结果时再回调一次；
    /// 已有结果的项保持不变，也不会回调
    pub async fn process_all_with_progress<F>(
        &self,
        mut items: Vec<BatchItem>,
        mut on_progress: F,
    ) -> Vec<BatchItem>
    where
        F: FnMut(&BatchItem),
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = FuturesUnordered::new();

        for item in items
            .iter_mut()
            .filter(|item| matches!(item.state, ProcessingState::Pending))
        {
            item.state = ProcessingState::Analyzing;
            on_progress(item);

            let client = Arc::clone(&self.client);
            let semaphore = Arc::clone(&semaphore);
            let image = item.source_image.clone();
            let label = item.display_name();

            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| ExtractionError::TaskAborted {
                        message: e.to_string(),
                    })?;
                debug!("🔍 正在提取: {}", label);
                client.extract(&image).await
            });

            let id = item.id.clone();
            tasks.push(async move { (id, handle.await) });
        }

        if tasks.is_empty() {
            return items;
        }
        info!(
            "🚀 已派发 {} 个提取任务 (并发上限 {})",
            tasks.len(),
            self.max_concurrent
        );

        while let Some((id, joined)) = tasks.next().await {
            let outcome = joined.unwrap_or_else(|e| {
                Err(ExtractionError::TaskAborted {
                    message: e.to_string(),
                })
            });

            if let Some(item) = merge_outcome(&mut items, &id, outcome) {
                on_progress(item);
            }
        }

        items
    }
}

// ========== 纯函数 ==========

/// 把一个提取结果写回对应批次项
///
/// # 返回
/// 成功写入时返回该项；id 不存在或该项已有结果时返回 None（不做修改）
pub fn merge_outcome<'a>(
    items: &'a mut [BatchItem],
    id: &str,
    outcome: ItemOutcome,
) -> Option<&'a BatchItem> {
    let item = items.iter_mut().find(|item| item.id == id)?;
    if item.state.is_resolved() {
        debug!("忽略重复结果: {}", item.display_name());
        return None;
    }

    item.state = match outcome {
        Ok(fields) => {
            info!("✓ {} 提取完成: {}", item.display_name(), fields.subject);
            ProcessingState::Complete(fields)
        }
        Err(e) => {
            error!("❌ {} 提取失败: {}", item.display_name(), e);
            ProcessingState::Failed(e.to_string())
        }
    };
    Some(item)
}

/// 修改已完成项的一个字段
///
/// # 返回
/// 是否发生了修改；未完成的项、未知 id 或非提取字段都不做修改
pub fn edit_field(items: &mut [BatchItem], id: &str, field: DocumentField, value: &str) -> bool {
    match items.iter_mut().find(|item| item.id == id) {
        Some(BatchItem {
            state: ProcessingState::Complete(fields),
            ..
        }) => fields.set(field, value),
        _ => false,
    }
}

/// 把已完成项与批次公共字段合并为创建请求
///
/// 失败项和未完成项不参与提交
pub fn commit(items: &[BatchItem], common: &CommonFields) -> AppResult<Vec<DocumentDraft>> {
    let delivered_by = common.delivered_by.trim();
    if delivered_by.is_empty() {
        return Err(ValidationError::MissingField {
            field: DocumentField::DeliveredBy.key(),
        }
        .into());
    }
    let signing_office = common
        .signing_office
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let complete: Vec<(&BatchItem, &ExtractedFields)> = items
        .iter()
        .filter_map(|item| item.extracted_fields().map(|fields| (item, fields)))
        .collect();
    if complete.is_empty() {
        return Err(BatchError::NothingToCommit { total: items.len() }.into());
    }

    let mut drafts = Vec::with_capacity(complete.len());
    for (item, fields) in complete {
        let mut draft = DocumentDraft::from_extracted(fields, IntakeSource::Upload)?;
        draft.scanned_document = Some(item.source_image.clone());
        draft.delivered_by = Some(delivered_by.to_string());
        draft.signing_office = signing_office.map(str::to_string);
        draft.validate()?;
        drafts.push(draft);
    }
    Ok(drafts)
}

/// 统计各状态数量
pub fn summary(items: &[BatchItem]) -> BatchSummary {
    items.iter().fold(
        BatchSummary {
            total: items.len(),
            ..Default::default()
        },
        |mut acc, item| {
            match item.state {
                ProcessingState::Pending => acc.pending += 1,
                ProcessingState::Analyzing => acc.analyzing += 1,
                ProcessingState::Complete(_) => acc.complete += 1,
                ProcessingState::Failed(_) => acc.failed += 1,
            }
            acc
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, RenderError};
    use crate::infrastructure::RenderedPage;
    use std::time::Duration;

    /// 按图片内容决定结果的假提取服务
    ///
    /// 图片字节以 "fail" 开头时失败；以数字开头时先等待对应毫秒数
    struct FakeExtractor;

    impl ExtractionClient for FakeExtractor {
        async fn extract(&self, image: &EncodedImage) -> ItemOutcome {
            let bytes = image.decode_bytes().unwrap_or_default();
            let text = String::from_utf8_lossy(&bytes).to_string();

            if let Some(delay) = text.split(':').next().and_then(|d| d.parse::<u64>().ok()) {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if text.starts_with("fail") {
                return Err(ExtractionError::EmptyResponse {
                    model: "fake".to_string(),
                });
            }
            if text.starts_with("panic") {
                panic!("extractor blew up");
            }

            Ok(ExtractedFields {
                letter_date: "2024-03-01".to_string(),
                sender_name: "Finance Dept".to_string(),
                subject: text,
                reference_number: "FIN/1".to_string(),
                originating_division: "Treasury".to_string(),
            })
        }
    }

    /// 固定页数的假渲染器，第 `broken_page` 页渲染失败
    struct FakeRenderer {
        pages: u32,
        broken_page: Option<u32>,
    }

    impl PageRenderer for FakeRenderer {
        fn render_pages(
            &self,
            document: &[u8],
        ) -> Result<Vec<Result<RenderedPage, RenderError>>, RenderError> {
            if !document.starts_with(b"%PDF") {
                return Err(RenderError::Parse("not a pdf".to_string()));
            }
            Ok((1..=self.pages)
                .map(|page| {
                    if Some(page) == self.broken_page {
                        Err(RenderError::Page {
                            page,
                            message: "vector only".to_string(),
                        })
                    } else {
                        Ok(RenderedPage {
                            media_type: "image/png",
                            bytes: format!("page {}", page).into_bytes(),
                        })
                    }
                })
                .collect())
        }
    }

    fn image_file(name: &str, content: &str) -> SourceFile {
        SourceFile::new(name, "image/jpeg", content.as_bytes().to_vec())
    }

    fn pending(id: &str, content: &str) -> BatchItem {
        BatchItem::pending(
            id,
            format!("{}.jpg", id),
            None,
            EncodedImage::from_bytes("image/jpeg", content.as_bytes()),
        )
    }

    fn fields(subject: &str) -> ExtractedFields {
        ExtractedFields {
            subject: subject.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_expand_images_pdfs_and_unsupported() {
        let pipeline = BatchPipeline::with_renderer(
            FakeExtractor,
            FakeRenderer {
                pages: 3,
                broken_page: None,
            },
            4,
        );

        let items = pipeline
            .expand(vec![
                image_file("a.jpg", "a"),
                SourceFile::new("scan.pdf", "application/pdf", b"%PDF-1.4".to_vec()),
                SourceFile::new("notes.txt", "text/plain", b"hello".to_vec()),
            ])
            .await;

        assert_eq!(items.len(), 4);
        assert_eq!(items[0].page_number, None);
        let pages: Vec<_> = items[1..].iter().map(|i| i.page_number).collect();
        assert_eq!(pages, vec![Some(1), Some(2), Some(3)]);
        assert!(items.iter().all(|i| *i.state() == ProcessingState::Pending));
        assert_eq!(items[2].source_image.media_type(), Some("image/png"));

        let ids: std::collections::HashSet<_> = items.iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids.len(), 4);
    }

    #[tokio::test]
    async fn test_expand_skips_unreadable_pdf_and_broken_page() {
        let pipeline = BatchPipeline::with_renderer(
            FakeExtractor,
            FakeRenderer {
                pages: 3,
                broken_page: Some(2),
            },
            4,
        );

        let items = pipeline
            .expand(vec![
                SourceFile::new("broken.pdf", "application/pdf", b"garbage".to_vec()),
                SourceFile::new("scan.pdf", "application/pdf", b"%PDF-1.7".to_vec()),
            ])
            .await;

        let pages: Vec<_> = items.iter().map(|i| i.page_number).collect();
        assert_eq!(pages, vec![Some(1), Some(3)]);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_affect_others() {
        let pipeline = BatchPipeline::new(FakeExtractor, 8);
        let items = vec![
            pending("a", "30:a"),
            pending("b", "fail"),
            pending("c", "0:c"),
            pending("d", "10:d"),
        ];

        let mut analyzing = Vec::new();
        let mut resolved = Vec::new();
        let items = pipeline
            .process_all_with_progress(items, |item| match item.state {
                ProcessingState::Analyzing => analyzing.push(item.id.clone()),
                _ => resolved.push(item.id.clone()),
            })
            .await;

        // 派发时按输入顺序通知，出结果时各通知一次
        assert_eq!(analyzing, vec!["a", "b", "c", "d"]);
        resolved.sort();
        assert_eq!(resolved, vec!["a", "b", "c", "d"]);
        assert!(items[0].is_complete());
        assert_eq!(items[1].error(), Some("提取服务返回内容为空 (模型: fake)"));
        assert!(items[2].is_complete());
        assert!(items[3].is_complete());
        // 输入顺序保持不变
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_panicking_task_marks_item_failed() {
        let pipeline = BatchPipeline::new(FakeExtractor, 2);
        let items = pipeline
            .process_all(vec![pending("a", "panic"), pending("b", "ok")])
            .await;

        assert!(items[0].error().unwrap().contains("提取任务异常终止"));
        assert!(items[1].is_complete());
    }

    #[tokio::test]
    async fn test_resolved_items_not_dispatched_again() {
        let pipeline = BatchPipeline::new(FakeExtractor, 1);
        let mut done = pending("a", "fail");
        done.state = ProcessingState::Complete(fields("kept"));

        let items = pipeline.process_all(vec![done, pending("b", "fresh")]).await;

        assert_eq!(items[0].extracted_fields().unwrap().subject, "kept");
        assert_eq!(items[1].extracted_fields().unwrap().subject, "fresh");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut items = vec![pending("a", "x")];
        items[0].state = ProcessingState::Analyzing;

        assert!(merge_outcome(&mut items, "a", Ok(fields("first"))).is_some());
        assert!(merge_outcome(&mut items, "a", Ok(fields("second"))).is_none());
        assert!(merge_outcome(
            &mut items,
            "a",
            Err(ExtractionError::EmptyResponse {
                model: "m".to_string()
            })
        )
        .is_none());
        assert!(merge_outcome(&mut items, "missing", Ok(fields("x"))).is_none());

        assert_eq!(items[0].extracted_fields().unwrap().subject, "first");
    }

    #[test]
    fn test_edit_field_only_on_complete_items() {
        let mut items = vec![pending("a", "x"), pending("b", "y")];
        items[0].state = ProcessingState::Complete(fields("Old"));
        items[1].state = ProcessingState::Failed("boom".to_string());

        assert!(edit_field(&mut items, "a", DocumentField::Subject, "New"));
        assert!(!edit_field(&mut items, "b", DocumentField::Subject, "New"));
        assert!(!edit_field(&mut items, "a", DocumentField::DeliveredBy, "Bob"));

        assert_eq!(items[0].extracted_fields().unwrap().subject, "New");
        assert_eq!(items[1].error(), Some("boom"));
    }

    fn mixed_batch() -> Vec<BatchItem> {
        let mut items: Vec<_> = (0..5).map(|i| pending(&format!("i{}", i), "img")).collect();
        for (i, item) in items.iter_mut().enumerate() {
            item.state = if i % 2 == 0 {
                ProcessingState::Complete(fields(&format!("Letter {}", i)))
            } else {
                ProcessingState::Failed("timeout".to_string())
            };
        }
        items
    }

    #[test]
    fn test_commit_only_complete_items() {
        let common = CommonFields {
            delivered_by: "  Courier Bob ".to_string(),
            signing_office: Some("DG Office".to_string()),
        };

        let drafts = commit(&mixed_batch(), &common).unwrap();

        assert_eq!(drafts.len(), 3);
        for draft in &drafts {
            assert_eq!(draft.delivered_by.as_deref(), Some("Courier Bob"));
            assert_eq!(draft.signing_office.as_deref(), Some("DG Office"));
            assert_eq!(draft.intake, IntakeSource::Upload);
            assert!(draft.scanned_document.is_some());
        }
        assert_eq!(drafts[1].subject, "Letter 2");
    }

    #[test]
    fn test_commit_rejections() {
        let failed: Vec<_> = mixed_batch()
            .into_iter()
            .filter(|i| !i.is_complete())
            .collect();
        let common = CommonFields {
            delivered_by: "Bob".to_string(),
            signing_office: None,
        };

        assert!(matches!(
            commit(&failed, &common),
            Err(AppError::Batch(BatchError::NothingToCommit { total: 2 }))
        ));
        assert!(matches!(
            commit(&mixed_batch(), &CommonFields::default()),
            Err(AppError::Validation(ValidationError::MissingField {
                field: "deliveredBy"
            }))
        ));

        let mut bad_date = mixed_batch();
        edit_field(&mut bad_date, "i0", DocumentField::LetterDate, "31/02/2024");
        assert!(matches!(
            commit(&bad_date, &common),
            Err(AppError::Validation(ValidationError::InvalidLetterDate { .. }))
        ));
    }

    #[test]
    fn test_summary_counts() {
        let mut items = mixed_batch();
        items.push(pending("p", "x"));

        let summary = summary(&items);
        assert_eq!(
            summary,
            BatchSummary {
                total: 6,
                pending: 1,
                analyzing: 0,
                complete: 3,
                failed: 2,
            }
        );
    }
}
