//! 手工收文录入流程
//!
//! 状态：当前模式 + 已累积的草稿 + 正在编辑的草稿（以及它在批次中的位置）。
//! 每个事件返回新的状态，原状态不变；校验失败时返回错误，调用方保留原状态

use crate::error::ValidationError;
use crate::models::{DocumentDraft, DocumentField, EncodedImage, IntakeSource};
use crate::workflow::navigation::StartMode;

/// 进入复核前必须填写的字段
const REVIEW_REQUIRED: [DocumentField; 5] = [
    DocumentField::Subject,
    DocumentField::ReferenceNumber,
    DocumentField::SenderName,
    DocumentField::OriginatingDivision,
    DocumentField::DeliveredBy,
];

/// 当前模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeMode {
    /// 批次列表
    List,
    /// 手工填写
    ManualForm,
    /// 拍照录入
    ScanForm,
    /// 复核
    Review,
    /// 已取消（批次为空时返回）
    Cancelled,
}

/// 录入事件
#[derive(Debug, Clone, PartialEq)]
pub enum IntakeEvent {
    StartManual,
    StartScan,
    /// 复制最后一份草稿作为新草稿
    AddSimilar,
    Edit(usize),
    SetField(DocumentField, String),
    AttachImage(EncodedImage),
    Review,
    /// 从复核返回继续修改
    Revise,
    ConfirmReview,
    /// 拍照录入完成，附带整理好的草稿
    ScanCaptured(DocumentDraft),
    Back,
}

/// 手工收文录入状态
#[derive(Debug, Clone, PartialEq)]
pub struct ManualIntake {
    mode: IntakeMode,
    batch: Vec<DocumentDraft>,
    current: Option<DocumentDraft>,
    editing: Option<usize>,
}

impl ManualIntake {
    /// 创建录入流程，可直接进入手工填写或拍照录入
    pub fn new(start: Option<StartMode>) -> Self {
        let empty = Self {
            mode: IntakeMode::List,
            batch: Vec::new(),
            current: None,
            editing: None,
        };
        match start {
            Some(StartMode::Manual) => empty.start_manual(),
            Some(StartMode::Scan) => Self {
                mode: IntakeMode::ScanForm,
                ..empty
            },
            None => empty,
        }
    }

    pub fn mode(&self) -> IntakeMode {
        self.mode
    }

    pub fn batch(&self) -> &[DocumentDraft] {
        &self.batch
    }

    pub fn current(&self) -> Option<&DocumentDraft> {
        self.current.as_ref()
    }

    pub fn editing_index(&self) -> Option<usize> {
        self.editing
    }

    /// 处理一个事件，返回新状态
    ///
    /// 当前模式下无意义的事件返回原状态的副本
    pub fn apply(&self, event: IntakeEvent) -> Result<Self, ValidationError> {
        use IntakeEvent as E;
        use IntakeMode as M;

        let next = self.clone();
        match (self.mode, event) {
            (M::Cancelled, _) => Ok(next),

            (M::List, E::StartManual) => Ok(next.start_manual()),
            (M::List, E::StartScan) => Ok(Self {
                mode: M::ScanForm,
                ..next
            }),
            (M::List, E::AddSimilar) => {
                let last = self.batch.last().ok_or(ValidationError::EmptyBatch)?;
                Ok(Self {
                    mode: M::ManualForm,
                    current: Some(last.clone()),
                    editing: None,
                    ..next
                })
            }
            (M::List, E::Edit(index)) => {
                let draft = self.batch.get(index).ok_or(ValidationError::IndexOutOfRange {
                    index,
                    len: self.batch.len(),
                })?;
                Ok(Self {
                    mode: M::ManualForm,
                    current: Some(draft.clone()),
                    editing: Some(index),
                    ..next
                })
            }

            (M::ManualForm, E::SetField(field, value)) => {
                let mut next = next;
                if let Some(draft) = next.current.as_mut() {
                    draft.set_field(field, &value)?;
                }
                Ok(next)
            }
            (M::ManualForm, E::AttachImage(image)) => {
                let mut next = next;
                if let Some(draft) = next.current.as_mut() {
                    draft.scanned_document = Some(image);
                }
                Ok(next)
            }
            (M::ManualForm, E::Review) => {
                let draft = self.current.as_ref().ok_or(ValidationError::MissingField {
                    field: DocumentField::Subject.key(),
                })?;
                draft.require(&REVIEW_REQUIRED)?;
                Ok(Self {
                    mode: M::Review,
                    ..next
                })
            }

            (M::Review, E::Revise) => Ok(Self {
                mode: M::ManualForm,
                ..next
            }),
            (M::Review, E::ConfirmReview) => {
                let mut next = next;
                if let Some(draft) = next.current.take() {
                    match next.editing.take() {
                        Some(index) if index < next.batch.len() => next.batch[index] = draft,
                        _ => next.batch.push(draft),
                    }
                }
                next.mode = M::List;
                Ok(next)
            }

            (M::ScanForm, E::ScanCaptured(draft)) => {
                let draft = DocumentDraft {
                    intake: IntakeSource::Scan,
                    ..draft
                };
                draft.validate()?;
                let mut next = next;
                next.batch.push(draft);
                next.mode = M::List;
                Ok(next)
            }

            (_, E::Back) => Ok(if self.batch.is_empty() {
                Self {
                    mode: M::Cancelled,
                    current: None,
                    editing: None,
                    ..next
                }
            } else {
                Self {
                    mode: M::List,
                    current: None,
                    editing: None,
                    ..next
                }
            }),

            _ => Ok(next),
        }
    }

    /// 结束录入，返回全部草稿
    pub fn finish(&self) -> Result<Vec<DocumentDraft>, ValidationError> {
        if self.batch.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        for draft in &self.batch {
            draft.validate()?;
        }
        Ok(self.batch.clone())
    }

    fn start_manual(self) -> Self {
        Self {
            mode: IntakeMode::ManualForm,
            current: Some(DocumentDraft::new(IntakeSource::Manual)),
            editing: None,
            ..self
        }
    }
}
