//! 发送表单
//!
//! 收集收件人、经办人、签名、照片，四项齐全时才能转换为发送信息

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::models::{DispatchedDetails, EncodedImage};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchForm {
    pub recipient_name: String,
    pub dispatched_by: String,
    pub signature: Option<EncodedImage>,
    pub photo: Option<EncodedImage>,
}

impl DispatchForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// 第一个缺失的字段
    pub fn missing_field(&self) -> Option<&'static str> {
        let blank_image = |image: &Option<EncodedImage>| image.as_ref().map_or(true, |i| i.is_empty());

        if self.recipient_name.trim().is_empty() {
            Some("recipientName")
        } else if self.dispatched_by.trim().is_empty() {
            Some("dispatchedBy")
        } else if blank_image(&self.signature) {
            Some("recipientSignature")
        } else if blank_image(&self.photo) {
            Some("recipientPhoto")
        } else {
            None
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing_field().is_none()
    }

    /// 转换为发送信息，发送时间为 `dispatched_at`
    pub fn into_details(self, dispatched_at: DateTime<Utc>) -> Result<DispatchedDetails, ValidationError> {
        if let Some(field) = self.missing_field() {
            return Err(ValidationError::IncompleteDispatch { field });
        }

        match (self.signature, self.photo) {
            (Some(signature), Some(photo)) => DispatchedDetails::new(
                self.recipient_name,
                self.dispatched_by,
                dispatched_at,
                signature,
                photo,
            ),
            (None, _) => Err(ValidationError::IncompleteDispatch {
                field: "recipientSignature",
            }),
            (_, None) => Err(ValidationError::IncompleteDispatch {
                field: "recipientPhoto",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn filled() -> DispatchForm {
        DispatchForm {
            recipient_name: "Jane Doe".to_string(),
            dispatched_by: "Registry Clerk".to_string(),
            signature: Some(EncodedImage::from_bytes("image/png", b"sig")),
            photo: Some(EncodedImage::from_bytes("image/jpeg", b"photo")),
        }
    }

    #[test]
    fn test_complete_form_converts() {
        let at = Utc.with_ymd_and_hms(2024, 5, 3, 14, 0, 0).unwrap();
        let details = filled().into_details(at).unwrap();
        assert_eq!(details.recipient_name, "Jane Doe");
        assert_eq!(details.dispatched_date, at);
    }

    #[test]
    fn test_each_missing_field_reported() {
        let mut form = filled();
        form.photo = None;
        assert_eq!(form.missing_field(), Some("recipientPhoto"));

        form.signature = Some(EncodedImage::from_data_url(""));
        assert_eq!(form.missing_field(), Some("recipientSignature"));

        form.recipient_name = "  ".to_string();
        assert_eq!(
            form.into_details(Utc::now()).unwrap_err(),
            ValidationError::IncompleteDispatch {
                field: "recipientName"
            }
        );
    }
}
