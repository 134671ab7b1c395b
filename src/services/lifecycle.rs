//! 文档状态机 - 业务能力层
//!
//! 纯函数，不读写存储，不取当前时间：
//! - 判断两个状态之间能否迁移
//! - 生成追加了一条历史记录的新文档（原文档不变）
//!
//! ```text
//! Received → Sent for Signing → Returned from Signing
//!     │             │                   │
//!     └─────────────┴───────────────────┴──→ Dispatched → Archived
//! ```

use chrono::{DateTime, Utc};

use crate::error::TransitionError;
use crate::models::{DispatchedDetails, Document, DocumentStatus, StatusHistoryEntry};

/// 两个状态之间是否存在合法的迁移
pub fn can_transition(from: DocumentStatus, to: DocumentStatus) -> bool {
    use DocumentStatus::*;

    matches!(
        (from, to),
        (Received, SentForSigning)
            | (SentForSigning, ReturnedFromSigning)
            | (Received | SentForSigning | ReturnedFromSigning, Dispatched)
            | (Dispatched, Archived)
    )
}

/// 追加一次普通迁移
///
/// # 参数
/// - `document`: 当前文档
/// - `new_status`: 目标状态
/// - `timestamp`: 迁移时间，不得早于最后一条历史记录
///
/// # 返回
/// 新的文档实体；进入 `Dispatched` 请使用 [`dispatch`]
pub fn append_transition(
    document: &Document,
    new_status: DocumentStatus,
    timestamp: DateTime<Utc>,
) -> Result<Document, TransitionError> {
    append_transition_with_notes(document, new_status, timestamp, None)
}

/// 追加一次带备注的迁移
pub fn append_transition_with_notes(
    document: &Document,
    new_status: DocumentStatus,
    timestamp: DateTime<Utc>,
    notes: Option<String>,
) -> Result<Document, TransitionError> {
    check_monotonic(document, timestamp)?;
    check_edge(document.status, new_status)?;

    if new_status.requires_dispatch_details() && document.dispatched_details.is_none() {
        return Err(TransitionError::MissingDispatchDetails {
            status: new_status.label().to_string(),
        });
    }

    let mut next = document.clone();
    next.status = new_status;
    next.status_history.push(StatusHistoryEntry {
        status: new_status,
        timestamp,
        notes: notes.filter(|n| !n.trim().is_empty()),
    });
    Ok(next)
}

/// 发送文档：校验发送信息、附加发送信息、追加历史，一步完成
///
/// 历史记录的时间取发送信息中的 `dispatched_date`
pub fn dispatch(
    document: &Document,
    details: DispatchedDetails,
) -> Result<Document, TransitionError> {
    details
        .validate()
        .map_err(TransitionError::IncompleteDetails)?;
    check_monotonic(document, details.dispatched_date)?;
    check_edge(document.status, DocumentStatus::Dispatched)?;

    let mut next = document.clone();
    next.status = DocumentStatus::Dispatched;
    next.status_history.push(StatusHistoryEntry::new(
        DocumentStatus::Dispatched,
        details.dispatched_date,
    ));
    next.dispatched_details = Some(details);
    Ok(next)
}

/// 归档已发送的文档
pub fn archive(document: &Document, timestamp: DateTime<Utc>) -> Result<Document, TransitionError> {
    append_transition(document, DocumentStatus::Archived, timestamp)
}

fn check_monotonic(document: &Document, timestamp: DateTime<Utc>) -> Result<(), TransitionError> {
    match document.last_transition() {
        Some(last) if timestamp < last.timestamp => Err(TransitionError::NonMonotonic {
            last: last.timestamp.to_rfc3339(),
            attempted: timestamp.to_rfc3339(),
        }),
        _ => Ok(()),
    }
}

fn check_edge(from: DocumentStatus, to: DocumentStatus) -> Result<(), TransitionError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(TransitionError::Illegal {
            from: from.label().to_string(),
            to: to.label().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EncodedImage;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn received() -> Document {
        Document {
            id: "doc_1".to_string(),
            subject: "Budget Report".to_string(),
            sender_name: "Finance Dept".to_string(),
            reference_number: String::new(),
            originating_division: String::new(),
            letter_date: None,
            received_date: t0(),
            status: DocumentStatus::Received,
            status_history: vec![StatusHistoryEntry::new(DocumentStatus::Received, t0())],
            scanned_document: None,
            dispatched_details: None,
            signing_office: None,
            delivered_by: None,
        }
    }

    fn details(at: DateTime<Utc>) -> DispatchedDetails {
        DispatchedDetails::new(
            "Jane Doe",
            "Registry Clerk",
            at,
            EncodedImage::from_bytes("image/png", b"sig"),
            EncodedImage::from_bytes("image/jpeg", b"photo"),
        )
        .unwrap()
    }

    #[test]
    fn test_legal_edges() {
        use DocumentStatus::*;

        assert!(can_transition(Received, SentForSigning));
        assert!(can_transition(SentForSigning, ReturnedFromSigning));
        assert!(can_transition(Received, Dispatched));
        assert!(can_transition(ReturnedFromSigning, Dispatched));
        assert!(can_transition(Dispatched, Archived));

        assert!(!can_transition(Received, Received));
        assert!(!can_transition(Received, ReturnedFromSigning));
        assert!(!can_transition(Received, Archived));
        assert!(!can_transition(Archived, Received));
        assert!(!can_transition(Dispatched, Received));
    }

    #[test]
    fn test_append_does_not_mutate_original() {
        let doc = received();
        let next = append_transition(&doc, DocumentStatus::SentForSigning, t0()).unwrap();

        assert_eq!(doc.status_history.len(), 1);
        assert_eq!(next.status, DocumentStatus::SentForSigning);
        assert_eq!(next.status_history.len(), 2);
    }

    #[test]
    fn test_earlier_timestamp_rejected_equal_accepted() {
        let doc = received();

        let err = append_transition(
            &doc,
            DocumentStatus::SentForSigning,
            t0() - Duration::seconds(1),
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::NonMonotonic { .. }));

        assert!(append_transition(&doc, DocumentStatus::SentForSigning, t0()).is_ok());
    }

    #[test]
    fn test_plain_transition_cannot_enter_dispatched() {
        let err = append_transition(&received(), DocumentStatus::Dispatched, t0()).unwrap_err();
        assert!(matches!(err, TransitionError::MissingDispatchDetails { .. }));
    }

    #[test]
    fn test_dispatch_attaches_details_and_stamps_dispatch_date() {
        let at = t0() + Duration::days(3);
        let doc = dispatch(&received(), details(at)).unwrap();

        assert_eq!(doc.status, DocumentStatus::Dispatched);
        assert_eq!(doc.status_history.len(), 2);
        assert_eq!(doc.status_history[1].timestamp, at);
        assert_eq!(doc.dispatched_date(), Some(at));
        assert!(doc.check_invariants().is_ok());
    }

    #[test]
    fn test_dispatch_twice_is_illegal() {
        let at = t0() + Duration::days(1);
        let doc = dispatch(&received(), details(at)).unwrap();
        let err = dispatch(&doc, details(at)).unwrap_err();
        assert!(matches!(err, TransitionError::Illegal { .. }));
    }

    #[test]
    fn test_dispatch_rejects_incomplete_details() {
        let mut incomplete = details(t0());
        incomplete.recipient_photo = EncodedImage::from_data_url("");

        let err = dispatch(&received(), incomplete).unwrap_err();
        assert!(matches!(err, TransitionError::IncompleteDetails(_)));
    }

    #[test]
    fn test_archive_only_after_dispatch() {
        assert!(archive(&received(), t0()).is_err());

        let at = t0() + Duration::days(1);
        let dispatched = dispatch(&received(), details(at)).unwrap();
        let archived = archive(&dispatched, at + Duration::days(30)).unwrap();
        assert_eq!(archived.status, DocumentStatus::Archived);
        assert!(archived.dispatched_details.is_some());
    }

    #[test]
    fn test_blank_notes_dropped() {
        let doc = append_transition_with_notes(
            &received(),
            DocumentStatus::SentForSigning,
            t0(),
            Some("  ".to_string()),
        )
        .unwrap();
        assert_eq!(doc.status_history[1].notes, None);
    }
}
