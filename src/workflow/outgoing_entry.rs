//! 发文手工录入流程
//!
//! 步骤：填写 → 确认 → 签收并发送。
//! 可以在确认后继续添加，最后一次签收覆盖本次录入的全部发文，共用同一发送时间

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::models::{DispatchedDetails, DocumentDraft, EncodedImage, IntakeSource};

/// 当前步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutgoingStep {
    Details,
    Confirm,
    SignAndDispatch,
}

/// 发文表单字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutgoingField {
    /// 呈送对象（即收件人）
    MinutedTo,
    Subject,
    ReferenceNumber,
    SenderName,
}

impl OutgoingField {
    pub fn key(self) -> &'static str {
        match self {
            OutgoingField::MinutedTo => "minutedTo",
            OutgoingField::Subject => "subject",
            OutgoingField::ReferenceNumber => "referenceNumber",
            OutgoingField::SenderName => "senderName",
        }
    }
}

/// 一份发文的表单内容
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingForm {
    pub minuted_to: String,
    pub subject: String,
    pub reference_number: String,
    pub sender_name: String,
    /// 文档照片，同时作为收件人照片
    pub image: Option<EncodedImage>,
}

impl OutgoingForm {
    fn slot(&mut self, field: OutgoingField) -> &mut String {
        match field {
            OutgoingField::MinutedTo => &mut self.minuted_to,
            OutgoingField::Subject => &mut self.subject,
            OutgoingField::ReferenceNumber => &mut self.reference_number,
            OutgoingField::SenderName => &mut self.sender_name,
        }
    }

    fn value(&self, field: OutgoingField) -> &str {
        match field {
            OutgoingField::MinutedTo => &self.minuted_to,
            OutgoingField::Subject => &self.subject,
            OutgoingField::ReferenceNumber => &self.reference_number,
            OutgoingField::SenderName => &self.sender_name,
        }
    }

    /// 四个文本字段必须填写
    pub fn validate(&self) -> Result<(), ValidationError> {
        const REQUIRED: [OutgoingField; 4] = [
            OutgoingField::MinutedTo,
            OutgoingField::Subject,
            OutgoingField::ReferenceNumber,
            OutgoingField::SenderName,
        ];
        match REQUIRED.iter().find(|f| self.value(**f).trim().is_empty()) {
            Some(field) => Err(ValidationError::MissingField { field: field.key() }),
            None => Ok(()),
        }
    }
}

/// 录入事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingEvent {
    SetField(OutgoingField, String),
    AttachImage(EncodedImage),
    Next,
    Back,
    /// 保存当前表单并开始下一份
    AddMore,
    SetDispatchedBy(String),
    Sign(EncodedImage),
}

/// 发文录入状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEntry {
    step: OutgoingStep,
    batch: Vec<OutgoingForm>,
    current: OutgoingForm,
    dispatched_by: String,
    signature: Option<EncodedImage>,
}

impl Default for OutgoingEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl OutgoingEntry {
    pub fn new() -> Self {
        Self {
            step: OutgoingStep::Details,
            batch: Vec::new(),
            current: OutgoingForm::default(),
            dispatched_by: String::new(),
            signature: None,
        }
    }

    pub fn step(&self) -> OutgoingStep {
        self.step
    }

    /// 已保存的表单（不含当前表单）
    pub fn batch(&self) -> &[OutgoingForm] {
        &self.batch
    }

    pub fn current(&self) -> &OutgoingForm {
        &self.current
    }

    /// 处理一个事件，返回新状态
    pub fn apply(&self, event: OutgoingEvent) -> Result<Self, ValidationError> {
        use OutgoingEvent as E;
        use OutgoingStep as S;

        let mut next = self.clone();
        match (self.step, event) {
            (S::Details, E::SetField(field, value)) => *next.current.slot(field) = value,
            (S::Details, E::AttachImage(image)) => next.current.image = Some(image),
            (S::Details, E::Next) => {
                self.current.validate()?;
                next.step = S::Confirm;
            }
            (S::Confirm, E::Next) => next.step = S::SignAndDispatch,
            (S::Confirm, E::AddMore) => {
                next.batch.push(std::mem::take(&mut next.current));
                next.step = S::Details;
            }
            (S::Confirm, E::Back) => next.step = S::Details,
            (S::SignAndDispatch, E::Back) => next.step = S::Confirm,
            (S::SignAndDispatch, E::SetDispatchedBy(name)) => next.dispatched_by = name,
            (S::SignAndDispatch, E::Sign(signature)) => next.signature = Some(signature),
            _ => {}
        }
        Ok(next)
    }

    /// 签收完成，生成已发送的草稿
    ///
    /// 每份发文的照片作为收件人照片，签名与经办人共用
    pub fn finish(&self, dispatched_date: DateTime<Utc>) -> Result<Vec<DocumentDraft>, ValidationError> {
        if self.step != OutgoingStep::SignAndDispatch {
            return Err(ValidationError::IncompleteDispatch {
                field: "recipientSignature",
            });
        }
        if self.dispatched_by.trim().is_empty() {
            return Err(ValidationError::IncompleteDispatch {
                field: "dispatchedBy",
            });
        }
        let signature = self
            .signature
            .as_ref()
            .filter(|s| !s.is_empty())
            .ok_or(ValidationError::IncompleteDispatch {
                field: "recipientSignature",
            })?;

        self.batch
            .iter()
            .chain(std::iter::once(&self.current))
            .map(|form| {
                form.validate()?;
                let photo = form
                    .image
                    .clone()
                    .filter(|i| !i.is_empty())
                    .ok_or(ValidationError::IncompleteDispatch {
                        field: "recipientPhoto",
                    })?;
                let details = DispatchedDetails::new(
                    form.minuted_to.clone(),
                    self.dispatched_by.clone(),
                    dispatched_date,
                    signature.clone(),
                    photo.clone(),
                )?;

                Ok(DocumentDraft {
                    subject: form.subject.trim().to_string(),
                    reference_number: form.reference_number.trim().to_string(),
                    sender_name: form.sender_name.trim().to_string(),
                    scanned_document: Some(photo),
                    dispatched_details: Some(details),
                    ..DocumentDraft::new(IntakeSource::Manual)
                })
            })
            .collect()
    }
}
