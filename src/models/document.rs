use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::image::EncodedImage;

/// 文档状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentStatus {
    /// 已接收
    #[serde(rename = "Received")]
    Received,
    /// 已送签
    #[serde(rename = "Sent for Signing")]
    SentForSigning,
    /// 签署返回
    #[serde(rename = "Returned from Signing")]
    ReturnedFromSigning,
    /// 已发送
    #[serde(rename = "Dispatched")]
    Dispatched,
    /// 已归档
    #[serde(rename = "Archived")]
    Archived,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 5] = [
        DocumentStatus::Received,
        DocumentStatus::SentForSigning,
        DocumentStatus::ReturnedFromSigning,
        DocumentStatus::Dispatched,
        DocumentStatus::Archived,
    ];

    /// 显示名称（与持久化格式一致）
    pub fn label(self) -> &'static str {
        match self {
            DocumentStatus::Received => "Received",
            DocumentStatus::SentForSigning => "Sent for Signing",
            DocumentStatus::ReturnedFromSigning => "Returned from Signing",
            DocumentStatus::Dispatched => "Dispatched",
            DocumentStatus::Archived => "Archived",
        }
    }

    /// 是否已结束流转（仪表盘中归入"已发送"列表）
    pub fn is_closed(self) -> bool {
        matches!(self, DocumentStatus::Dispatched | DocumentStatus::Archived)
    }

    /// 该状态是否要求文档带有发送信息
    pub fn requires_dispatch_details(self) -> bool {
        self.is_closed()
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// 状态历史记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: DocumentStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl StatusHistoryEntry {
    pub fn new(status: DocumentStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            status,
            timestamp,
            notes: None,
        }
    }
}

/// 发送信息
///
/// 五个字段必须同时具备，只能通过 [`DispatchedDetails::new`] 一次性构造
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchedDetails {
    pub recipient_name: String,
    pub dispatched_by: String,
    pub dispatched_date: DateTime<Utc>,
    pub recipient_signature: EncodedImage,
    pub recipient_photo: EncodedImage,
}

impl DispatchedDetails {
    /// 构造完整的发送信息，任一字段为空时返回错误
    pub fn new(
        recipient_name: impl Into<String>,
        dispatched_by: impl Into<String>,
        dispatched_date: DateTime<Utc>,
        recipient_signature: EncodedImage,
        recipient_photo: EncodedImage,
    ) -> Result<Self, ValidationError> {
        let details = Self {
            recipient_name: recipient_name.into().trim().to_string(),
            dispatched_by: dispatched_by.into().trim().to_string(),
            dispatched_date,
            recipient_signature,
            recipient_photo,
        };
        details.validate()?;
        Ok(details)
    }

    /// 检查五个字段是否齐全
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.recipient_name.trim().is_empty() {
            return Err(ValidationError::IncompleteDispatch {
                field: "recipientName",
            });
        }
        if self.dispatched_by.trim().is_empty() {
            return Err(ValidationError::IncompleteDispatch {
                field: "dispatchedBy",
            });
        }
        if self.recipient_signature.is_empty() {
            return Err(ValidationError::IncompleteDispatch {
                field: "recipientSignature",
            });
        }
        if self.recipient_photo.is_empty() {
            return Err(ValidationError::IncompleteDispatch {
                field: "recipientPhoto",
            });
        }
        Ok(())
    }
}

/// 文档（一件被跟踪的来往公文）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub subject: String,
    pub sender_name: String,
    pub reference_number: String,
    pub originating_division: String,
    pub letter_date: Option<NaiveDate>,
    pub received_date: DateTime<Utc>,
    pub status: DocumentStatus,
    pub status_history: Vec<StatusHistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanned_document: Option<EncodedImage>,
    pub dispatched_details: Option<DispatchedDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_office: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_by: Option<String>,
}

impl Document {
    /// 最后一条状态记录
    pub fn last_transition(&self) -> Option<&StatusHistoryEntry> {
        self.status_history.last()
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    /// 发送时间（未发送时为 None）
    pub fn dispatched_date(&self) -> Option<DateTime<Utc>> {
        self.dispatched_details.as_ref().map(|d| d.dispatched_date)
    }

    /// 检查实体自身的不变量
    ///
    /// 历史只能追加由存储层负责，这里只检查可在任意时刻判断的部分
    pub fn check_invariants(&self) -> Result<(), String> {
        let Some(last) = self.status_history.last() else {
            return Err(format!("文档 {} 的状态历史为空", self.id));
        };
        if last.status != self.status {
            return Err(format!(
                "文档 {} 状态为 '{}'，但最后一条历史为 '{}'",
                self.id, self.status, last.status
            ));
        }
        if self
            .status_history
            .windows(2)
            .any(|pair| pair[0].timestamp > pair[1].timestamp)
        {
            return Err(format!("文档 {} 的状态历史时间倒序", self.id));
        }
        if self.status.requires_dispatch_details() && self.dispatched_details.is_none() {
            return Err(format!(
                "文档 {} 状态为 '{}' 但缺少发送信息",
                self.id, self.status
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn image() -> EncodedImage {
        EncodedImage::from_bytes("image/png", b"png")
    }

    #[test]
    fn test_status_serializes_with_display_labels() {
        for status in DocumentStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.label()));
            let back: DocumentStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn test_closed_statuses() {
        assert!(!DocumentStatus::Received.is_closed());
        assert!(!DocumentStatus::SentForSigning.is_closed());
        assert!(!DocumentStatus::ReturnedFromSigning.is_closed());
        assert!(DocumentStatus::Dispatched.is_closed());
        assert!(DocumentStatus::Archived.is_closed());
    }

    #[test]
    fn test_status_must_match_last_history_entry() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut doc = Document {
            id: "doc_1".to_string(),
            subject: "Budget Report".to_string(),
            sender_name: "Finance Dept".to_string(),
            reference_number: String::new(),
            originating_division: String::new(),
            letter_date: None,
            received_date: at,
            status: DocumentStatus::Received,
            status_history: vec![StatusHistoryEntry::new(DocumentStatus::Received, at)],
            scanned_document: None,
            dispatched_details: None,
            signing_office: None,
            delivered_by: None,
        };
        assert!(doc.check_invariants().is_ok());

        doc.status = DocumentStatus::SentForSigning;
        let message = doc.check_invariants().unwrap_err();
        assert!(message.contains("最后一条历史"), "{message}");

        doc.status_history.clear();
        assert!(doc.check_invariants().is_err());
    }

    #[test]
    fn test_dispatched_details_require_every_field() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();

        assert!(DispatchedDetails::new("J. Doe", "Clerk", at, image(), image()).is_ok());

        let err = DispatchedDetails::new(" ", "Clerk", at, image(), image()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::IncompleteDispatch {
                field: "recipientName"
            }
        );

        let err = DispatchedDetails::new(
            "J. Doe",
            "Clerk",
            at,
            image(),
            EncodedImage::from_data_url(""),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::IncompleteDispatch {
                field: "recipientPhoto"
            }
        );
    }
}
