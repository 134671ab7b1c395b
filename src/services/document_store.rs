//! 文档存储 - 业务能力层
//!
//! 唯一持有文档集合、分配 id 与接收时间、修改集合的组件。
//! 每次修改都是"读出整体 → 生成新集合 → 整体写入"，写入成功后才替换内存中的集合

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, StoreError};
use crate::infrastructure::{Clock, IdGenerator, StoreBackend, SystemClock, UuidIdGenerator};
use crate::models::{
    DispatchedDetails, Document, DocumentDraft, DocumentStatus, StatusHistoryEntry,
};
use crate::services::lifecycle;

/// 生成新 id 时的最大重试次数
const MAX_ID_ATTEMPTS: usize = 16;

/// 文档存储
///
/// 职责：
/// - 从后端恢复文档集合，内容损坏时回退为空集合并记录提示
/// - 创建文档（单个或批量），分配 id 与接收时间
/// - 替换、发送、迁移已有文档
/// - 不关心录入流程，不调用提取服务
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    documents: Vec<Document>,
    corruption_notice: Option<String>,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// 创建存储（尚未加载）
    pub fn new(backend: B, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            backend,
            clock,
            ids,
            documents: Vec::new(),
            corruption_notice: None,
        }
    }

    /// 使用系统时钟和 UUID 标识创建并立即加载
    pub fn open(backend: B) -> Self {
        let mut store = Self::new(
            backend,
            Arc::new(SystemClock),
            Arc::new(UuidIdGenerator::default()),
        );
        store.load();
        store
    }

    // ========== 读取 ==========

    /// 从后端恢复文档集合
    ///
    /// 任何解析失败、读取失败、重复 id 或违反不变量的内容都回退为空集合，
    /// 失败原因可通过 [`corruption_notice`](Self::corruption_notice) 获取
    pub fn load(&mut self) -> &[Document] {
        self.corruption_notice = None;

        match self.read_collection() {
            Ok(documents) => {
                debug!(
                    "📂 从 {} 加载了 {} 份文档",
                    self.backend.describe(),
                    documents.len()
                );
                self.documents = documents;
            }
            Err(e) => {
                warn!(
                    "⚠️ 存储 {} 无法恢复，已回退为空集合: {}",
                    self.backend.describe(),
                    e
                );
                self.documents = Vec::new();
                self.corruption_notice = Some(e.to_string());
            }
        }

        &self.documents
    }

    fn read_collection(&self) -> Result<Vec<Document>, StoreError> {
        let payload = match self.backend.read()? {
            Some(payload) if !payload.trim().is_empty() => payload,
            _ => return Ok(Vec::new()),
        };

        let documents: Vec<Document> =
            serde_json::from_str(&payload).map_err(|e| StoreError::Corrupted {
                message: e.to_string(),
            })?;

        let mut seen = HashSet::new();
        for document in &documents {
            if !seen.insert(document.id.as_str()) {
                return Err(StoreError::Corrupted {
                    message: format!("文档 id 重复: {}", document.id),
                });
            }
            document
                .check_invariants()
                .map_err(|message| StoreError::Corrupted { message })?;
        }

        Ok(documents)
    }

    /// 最近一次加载的损坏提示
    pub fn corruption_notice(&self) -> Option<&str> {
        self.corruption_notice.as_deref()
    }

    /// 全部文档（按创建顺序）
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// 存储使用的当前时间
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ========== 创建 ==========

    /// 创建单个文档
    pub fn create(&mut self, draft: DocumentDraft) -> AppResult<Document> {
        draft.validate()?;

        let now = self.clock.now();
        let mut taken = self.taken_ids();
        let document = self.build(draft, now, &mut taken)?;

        let mut next = self.documents.clone();
        next.push(document.clone());
        self.persist(next)?;

        info!("📝 已创建文档 {} ({})", document.id, document.status);
        Ok(document)
    }

    /// 批量创建文档，一次写入
    ///
    /// 所有草稿先全部校验，任何一个不合法都不会写入
    pub fn create_batch(&mut self, drafts: Vec<DocumentDraft>) -> AppResult<Vec<Document>> {
        for draft in &drafts {
            draft.validate()?;
        }
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let now = self.clock.now();
        let mut taken = self.taken_ids();
        let created = drafts
            .into_iter()
            .map(|draft| self.build(draft, now, &mut taken))
            .collect::<Result<Vec<_>, _>>()?;

        let mut next = self.documents.clone();
        next.extend(created.iter().cloned());
        self.persist(next)?;

        info!("📝 已批量创建 {} 份文档", created.len());
        Ok(created)
    }

    fn build(
        &self,
        draft: DocumentDraft,
        now: DateTime<Utc>,
        taken: &mut HashSet<String>,
    ) -> Result<Document, StoreError> {
        let id = self.fresh_id(taken)?;

        // 录入时已带发送信息的文档直接以 Dispatched 创建，历史时间取发送时间
        let seed = match &draft.dispatched_details {
            Some(details) => {
                StatusHistoryEntry::new(DocumentStatus::Dispatched, details.dispatched_date)
            }
            None => StatusHistoryEntry::new(DocumentStatus::Received, now),
        };

        Ok(Document {
            id,
            subject: draft.subject,
            sender_name: draft.sender_name,
            reference_number: draft.reference_number,
            originating_division: draft.originating_division,
            letter_date: draft.letter_date,
            received_date: now,
            status: seed.status,
            status_history: vec![seed],
            scanned_document: draft.scanned_document,
            dispatched_details: draft.dispatched_details,
            signing_office: draft.signing_office,
            delivered_by: draft.delivered_by,
        })
    }

    fn taken_ids(&self) -> HashSet<String> {
        self.documents.iter().map(|d| d.id.clone()).collect()
    }

    fn fresh_id(&self, taken: &mut HashSet<String>) -> Result<String, StoreError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.ids.next_id();
            if taken.insert(id.clone()) {
                return Ok(id);
            }
            debug!("生成的 id {} 已存在，重新生成", id);
        }
        Err(StoreError::IdCollision {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    // ========== 修改 ==========

    /// 用同 id 的文档替换已有文档
    ///
    /// 接收时间不可修改，发送信息一旦记录不可清除。
    /// 状态历史只能在原有记录之后追加合法迁移，`status` 必须等于最后一条历史
    pub fn update(&mut self, document: Document) -> AppResult<()> {
        let index = self.index_of(&document.id)?;
        let current = &self.documents[index];

        if document.status.requires_dispatch_details() && document.dispatched_details.is_none() {
            return Err(crate::error::TransitionError::MissingDispatchDetails {
                status: document.status.label().to_string(),
            }
            .into());
        }
        if current.dispatched_details.is_some() && document.dispatched_details.is_none() {
            return Err(invalid(&document, "发送信息一旦记录不能清除"));
        }
        if current.received_date != document.received_date {
            return Err(invalid(&document, "接收时间不可修改"));
        }
        check_history_extends(current, &document).map_err(|message| invalid(&document, message))?;
        document
            .check_invariants()
            .map_err(|message| invalid(&document, &message))?;

        let mut next = self.documents.clone();
        next[index] = document;
        self.persist(next)?;
        Ok(())
    }

    /// 发送文档
    pub fn dispatch(&mut self, id: &str, details: DispatchedDetails) -> AppResult<Document> {
        let index = self.index_of(id)?;
        let dispatched = lifecycle::dispatch(&self.documents[index], details)?;
        self.replace_at(index, dispatched)
    }

    /// 归档已发送的文档，时间为当前时间
    pub fn archive(&mut self, id: &str) -> AppResult<Document> {
        let index = self.index_of(id)?;
        let archived = lifecycle::archive(&self.documents[index], self.clock.now())?;
        self.replace_at(index, archived)
    }

    /// 普通状态迁移，时间为当前时间
    pub fn transition(
        &mut self,
        id: &str,
        status: DocumentStatus,
        notes: Option<String>,
    ) -> AppResult<Document> {
        let index = self.index_of(id)?;
        let now = self.clock.now();
        let moved =
            lifecycle::append_transition_with_notes(&self.documents[index], status, now, notes)?;
        self.replace_at(index, moved)
    }

    fn replace_at(&mut self, index: usize, document: Document) -> AppResult<Document> {
        let mut next = self.documents.clone();
        next[index] = document.clone();
        self.persist(next)?;

        info!("🔄 文档 {} → {}", document.id, document.status);
        Ok(document)
    }

    fn index_of(&self, id: &str) -> AppResult<usize> {
        self.documents
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| AppError::not_found(id))
    }

    /// 整体写入，成功后替换内存中的集合
    fn persist(&mut self, next: Vec<Document>) -> Result<(), StoreError> {
        let payload = serde_json::to_string_pretty(&next)?;
        self.backend.write(&payload)?;
        debug!(
            "💾 已写入 {} 份文档 → {}",
            next.len(),
            self.backend.describe()
        );
        self.documents = next;
        Ok(())
    }
}

/// 新历史必须以原历史开头，追加部分逐条是合法迁移
fn check_history_extends(current: &Document, next: &Document) -> Result<(), &'static str> {
    let stored = &current.status_history;
    if next.status_history.len() < stored.len() {
        return Err("状态历史不能删减");
    }
    if next.status_history[..stored.len()] != stored[..] {
        return Err("已有状态历史不可修改");
    }

    let appended = &next.status_history[stored.len()..];
    let mut previous = stored.last();
    for entry in appended {
        if let Some(prev) = previous {
            if !lifecycle::can_transition(prev.status, entry.status) {
                return Err("追加的状态历史不是合法迁移");
            }
            if entry.timestamp < prev.timestamp {
                return Err("追加的状态历史时间倒序");
            }
        }
        previous = Some(entry);
    }
    Ok(())
}

fn invalid(document: &Document, message: &str) -> AppError {
    StoreError::InvalidDocument {
        id: document.id.clone(),
        message: message.to_string(),
    }
    .into()
}
