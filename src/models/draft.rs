//! 各录入阶段使用的部分字段集合
//!
//! - [`ExtractedFields`]：提取服务返回、批次中可编辑的文本字段
//! - [`DocumentDraft`]：提交给存储层的创建请求

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::document::DispatchedDetails;
use crate::models::image::EncodedImage;

/// 发文日期的文本格式
pub const LETTER_DATE_FORMAT: &str = "%Y-%m-%d";

/// 文档来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntakeSource {
    /// 拍照扫描
    Scan,
    /// 上传文件（批量）
    Upload,
    /// 手工录入
    #[default]
    Manual,
}

impl IntakeSource {
    /// 扫描和上传必须带原件图片
    pub fn requires_scan(self) -> bool {
        matches!(self, IntakeSource::Scan | IntakeSource::Upload)
    }
}

/// 可编辑字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentField {
    Subject,
    SenderName,
    ReferenceNumber,
    OriginatingDivision,
    LetterDate,
    DeliveredBy,
    SigningOffice,
}

impl DocumentField {
    /// 字段在持久化格式中的键名
    pub fn key(self) -> &'static str {
        match self {
            DocumentField::Subject => "subject",
            DocumentField::SenderName => "senderName",
            DocumentField::ReferenceNumber => "referenceNumber",
            DocumentField::OriginatingDivision => "originatingDivision",
            DocumentField::LetterDate => "letterDate",
            DocumentField::DeliveredBy => "deliveredBy",
            DocumentField::SigningOffice => "signingOffice",
        }
    }
}

/// 提取结果字段
///
/// 五个字段均为文本，无法识别时为空字符串
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    pub letter_date: String,
    pub sender_name: String,
    pub subject: String,
    pub reference_number: String,
    pub originating_division: String,
}

impl ExtractedFields {
    /// 修改字段，非提取字段返回 false 且不做修改
    pub fn set(&mut self, field: DocumentField, value: impl Into<String>) -> bool {
        let slot = match field {
            DocumentField::Subject => &mut self.subject,
            DocumentField::SenderName => &mut self.sender_name,
            DocumentField::ReferenceNumber => &mut self.reference_number,
            DocumentField::OriginatingDivision => &mut self.originating_division,
            DocumentField::LetterDate => &mut self.letter_date,
            DocumentField::DeliveredBy | DocumentField::SigningOffice => return false,
        };
        *slot = value.into();
        true
    }
}

/// 文档创建请求
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentDraft {
    pub subject: String,
    pub sender_name: String,
    pub reference_number: String,
    pub originating_division: String,
    pub letter_date: Option<NaiveDate>,
    pub scanned_document: Option<EncodedImage>,
    pub signing_office: Option<String>,
    pub delivered_by: Option<String>,
    /// 录入时已记录的发送信息（手工录入的发文）
    pub dispatched_details: Option<DispatchedDetails>,
    pub intake: IntakeSource,
}

impl DocumentDraft {
    pub fn new(intake: IntakeSource) -> Self {
        Self {
            intake,
            ..Self::default()
        }
    }

    /// 由提取结果构造，发文日期在这里解析
    pub fn from_extracted(
        fields: &ExtractedFields,
        intake: IntakeSource,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            subject: fields.subject.trim().to_string(),
            sender_name: fields.sender_name.trim().to_string(),
            reference_number: fields.reference_number.trim().to_string(),
            originating_division: fields.originating_division.trim().to_string(),
            letter_date: parse_letter_date(&fields.letter_date)?,
            intake,
            ..Self::default()
        })
    }

    /// 按字段名修改
    pub fn set_field(&mut self, field: DocumentField, value: &str) -> Result<(), ValidationError> {
        match field {
            DocumentField::Subject => self.subject = value.to_string(),
            DocumentField::SenderName => self.sender_name = value.to_string(),
            DocumentField::ReferenceNumber => self.reference_number = value.to_string(),
            DocumentField::OriginatingDivision => self.originating_division = value.to_string(),
            DocumentField::LetterDate => self.letter_date = parse_letter_date(value)?,
            DocumentField::DeliveredBy => self.delivered_by = non_blank(value),
            DocumentField::SigningOffice => self.signing_office = non_blank(value),
        }
        Ok(())
    }

    /// 字段是否已填写
    pub fn has_field(&self, field: DocumentField) -> bool {
        match field {
            DocumentField::Subject => !self.subject.trim().is_empty(),
            DocumentField::SenderName => !self.sender_name.trim().is_empty(),
            DocumentField::ReferenceNumber => !self.reference_number.trim().is_empty(),
            DocumentField::OriginatingDivision => !self.originating_division.trim().is_empty(),
            DocumentField::LetterDate => self.letter_date.is_some(),
            DocumentField::DeliveredBy => self.delivered_by.is_some(),
            DocumentField::SigningOffice => self.signing_office.is_some(),
        }
    }

    /// 要求给定字段全部已填写，返回第一个缺失的字段
    pub fn require(&self, fields: &[DocumentField]) -> Result<(), ValidationError> {
        match fields.iter().find(|f| !self.has_field(**f)) {
            Some(field) => Err(ValidationError::MissingField { field: field.key() }),
            None => Ok(()),
        }
    }

    /// 写入存储前的校验
    pub fn validate(&self) -> Result<(), ValidationError> {
        let has_scan = self
            .scanned_document
            .as_ref()
            .is_some_and(|image| !image.is_empty());
        if self.intake.requires_scan() && !has_scan {
            return Err(ValidationError::MissingField {
                field: "scannedDocument",
            });
        }
        if let Some(details) = &self.dispatched_details {
            details.validate()?;
        }
        Ok(())
    }
}

/// 解析发文日期，空白视为未知
pub fn parse_letter_date(value: &str) -> Result<Option<NaiveDate>, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, LETTER_DATE_FORMAT)
        .map(Some)
        .map_err(|_| ValidationError::InvalidLetterDate {
            value: value.to_string(),
        })
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
