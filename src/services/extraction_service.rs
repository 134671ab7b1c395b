//! 信息提取服务 - 业务能力层
//!
//! 只负责"一张图片 → 五个字段"，不关心批次与重试
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 调用兼容 OpenAI 的视觉对话接口
//! - 支持自定义 API 端点和模型

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::future::Future;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ExtractionError;
use crate::models::draft::LETTER_DATE_FORMAT;
use crate::models::{EncodedImage, ExtractedFields};

/// 信息提取能力
///
/// 每次调用只处理一张图片，失败时返回可读的原因，内部不重试
pub trait ExtractionClient: Send + Sync + 'static {
    fn extract(
        &self,
        image: &EncodedImage,
    ) -> impl Future<Output = Result<ExtractedFields, ExtractionError>> + Send;
}

/// 返回结果中必须出现的键
const REQUIRED_KEYS: [&str; 5] = [
    "letterDate",
    "senderName",
    "subject",
    "referenceNumber",
    "originatingDivision",
];

const SYSTEM_PROMPT: &str = "你是一个公文登记助手，负责从公文图片中读取登记信息。\
只输出一个 JSON 对象，包含且仅包含以下五个键：\
letterDate（发文日期，格式 YYYY-MM-DD），senderName（发文人或发文单位），\
subject（事由/标题），referenceNumber（文号），originatingDivision（发文部门）。\
无法识别的字段填空字符串，不要输出任何其他内容。";

const USER_PROMPT: &str = "请读取这份公文的登记信息。";

/// 基于 LLM 视觉接口的提取服务
///
/// 职责：
/// - 把图片以 data URL 形式发送给模型
/// - 解析模型返回的 JSON
/// - 不出现 BatchItem，不关心并发
pub struct LlmExtractionClient {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmExtractionClient {
    /// 创建新的提取服务
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 发送一次视觉请求，返回模型的原始文本
    async fn send_to_llm(&self, image: &EncodedImage) -> Result<String, ExtractionError> {
        debug!(
            "调用 LLM API，模型: {}，图片类型: {}",
            self.model_name,
            image.media_type().unwrap_or("unknown")
        );

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_PROMPT)
            .build()
            .map_err(|e| self.request_failed(e))?;

        let content_parts = vec![
            ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: USER_PROMPT.to_string(),
                },
            ),
            ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: image.as_str().to_string(),
                        detail: Some(ImageDetail::High),
                    },
                },
            ),
        ];
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(
                content_parts,
            ))
            .build()
            .map_err(|e| self.request_failed(e))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(0.0)
            .max_tokens(512u32)
            .build()
            .map_err(|e| self.request_failed(e))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            self.request_failed(e)
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ExtractionError::EmptyResponse {
                model: self.model_name.clone(),
            })?;

        debug!("LLM API 调用成功，返回 {} 字符", content.chars().count());
        Ok(content)
    }

    fn request_failed(&self, e: impl std::fmt::Display) -> ExtractionError {
        ExtractionError::RequestFailed {
            model: self.model_name.clone(),
            message: e.to_string(),
        }
    }
}

impl ExtractionClient for LlmExtractionClient {
    async fn extract(&self, image: &EncodedImage) -> Result<ExtractedFields, ExtractionError> {
        let response = self.send_to_llm(image).await?;
        parse_field_set(&response)
    }
}

/// 返回内容中最外层的 JSON 对象
static JSON_OBJECT: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}"));

/// 解析模型返回的字段 JSON
///
/// 允许外层包裹 Markdown 代码块；五个键必须齐全，`null` 视为空字符串
pub fn parse_field_set(response: &str) -> Result<ExtractedFields, ExtractionError> {
    let re = JSON_OBJECT
        .as_ref()
        .map_err(|e| ExtractionError::MalformedResponse {
            message: e.to_string(),
        })?;
    let json_text = re
        .find(response)
        .map(|m| m.as_str())
        .ok_or_else(|| ExtractionError::MalformedResponse {
            message: "返回内容中没有 JSON 对象".to_string(),
        })?;

    let value: JsonValue =
        serde_json::from_str(json_text).map_err(|e| ExtractionError::MalformedResponse {
            message: e.to_string(),
        })?;
    let object = value
        .as_object()
        .ok_or_else(|| ExtractionError::MalformedResponse {
            message: "返回内容不是 JSON 对象".to_string(),
        })?;

    let mut texts = Vec::with_capacity(REQUIRED_KEYS.len());
    for key in REQUIRED_KEYS {
        let text = match object.get(key) {
            None => return Err(ExtractionError::MissingKey { field: key }),
            Some(JsonValue::Null) => String::new(),
            Some(JsonValue::String(s)) => s.trim().to_string(),
            Some(other) => {
                return Err(ExtractionError::MalformedResponse {
                    message: format!("字段 {} 不是字符串: {}", key, other),
                })
            }
        };
        texts.push(text);
    }

    let [letter_date, sender_name, subject, reference_number, originating_division]: [String; 5] =
        texts
            .try_into()
            .map_err(|_| ExtractionError::MalformedResponse {
                message: "字段数量不符".to_string(),
            })?;

    Ok(ExtractedFields {
        letter_date: normalize_letter_date(&letter_date),
        sender_name,
        subject,
        reference_number,
        originating_division,
    })
}

/// 常见日期写法统一为 YYYY-MM-DD，无法识别时为空字符串
pub fn normalize_letter_date(raw: &str) -> String {
    const FORMATS: [&str; 8] = [
        LETTER_DATE_FORMAT,
        "%Y/%m/%d",
        "%Y.%m.%d",
        "%d/%m/%Y",
        "%d-%m-%Y",
        "%d %B %Y",
        "%B %d, %Y",
        "%Y年%m月%d日",
    ];

    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    // 带时间的 ISO 写法只取日期部分
    let candidate = match raw.split_once('T') {
        Some((date, _)) if date.len() == 10 => date,
        _ => raw,
    };

    FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(candidate, format).ok())
        .map(|date| date.format(LETTER_DATE_FORMAT).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let fields = parse_field_set(
            r#"{"letterDate":"2024-03-01","senderName":"Finance Dept","subject":"Budget Report","referenceNumber":"FIN/24/007","originatingDivision":"Treasury"}"#,
        )
        .unwrap();

        assert_eq!(fields.letter_date, "2024-03-01");
        assert_eq!(fields.sender_name, "Finance Dept");
        assert_eq!(fields.subject, "Budget Report");
        assert_eq!(fields.reference_number, "FIN/24/007");
        assert_eq!(fields.originating_division, "Treasury");
    }

    #[test]
    fn test_parse_fenced_json_with_nulls() {
        let response = "```json\n{\n  \"letterDate\": null,\n  \"senderName\": \"Registry\",\n  \"subject\": \"Leave request\",\n  \"referenceNumber\": null,\n  \"originatingDivision\": \"\"\n}\n```";

        let fields = parse_field_set(response).unwrap();
        assert_eq!(fields.letter_date, "");
        assert_eq!(fields.reference_number, "");
        assert_eq!(fields.subject, "Leave request");
    }

    #[test]
    fn test_missing_key_is_error() {
        let err = parse_field_set(r#"{"letterDate":"","senderName":"","subject":"x","referenceNumber":""}"#)
            .unwrap_err();
        assert_eq!(
            err,
            ExtractionError::MissingKey {
                field: "originatingDivision"
            }
        );
    }

    #[test]
    fn test_non_string_value_is_error() {
        let err = parse_field_set(
            r#"{"letterDate":"","senderName":"","subject":42,"referenceNumber":"","originatingDivision":""}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedResponse { .. }));
    }

    #[test]
    fn test_json_pattern_compiled_once() {
        let first = JSON_OBJECT.as_ref().unwrap() as *const Regex;
        for subject in ["one", "two"] {
            let response = format!(
                r#"{{"letterDate":"","senderName":"","subject":"{subject}","referenceNumber":"","originatingDivision":""}}"#
            );
            assert_eq!(parse_field_set(&response).unwrap().subject, subject);
        }
        assert_eq!(JSON_OBJECT.as_ref().unwrap() as *const Regex, first);
    }

    #[test]
    fn test_no_json_is_error() {
        let err = parse_field_set("抱歉，我无法读取这张图片。").unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedResponse { .. }));
    }

    #[test]
    fn test_letter_date_normalized() {
        assert_eq!(normalize_letter_date("2024-03-01"), "2024-03-01");
        assert_eq!(normalize_letter_date("01/03/2024"), "2024-03-01");
        assert_eq!(normalize_letter_date("1 March 2024"), "2024-03-01");
        assert_eq!(normalize_letter_date("March 1, 2024"), "2024-03-01");
        assert_eq!(normalize_letter_date("2024-03-01T00:00:00Z"), "2024-03-01");
        assert_eq!(normalize_letter_date("sometime in spring"), "");
        assert_eq!(normalize_letter_date("  "), "");
    }

    /// 真实调用提取接口
    ///
    /// 运行方式：
    /// ```bash
    /// LLM_API_KEY=... cargo test test_live_extraction -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_live_extraction() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = Config::from_env().unwrap();
        let client = LlmExtractionClient::new(&config);

        let path = std::env::var("SAMPLE_LETTER").expect("需要设置 SAMPLE_LETTER 指向一张公文图片");
        let bytes = std::fs::read(&path).unwrap();
        let image = EncodedImage::from_bytes("image/jpeg", &bytes);

        let fields = client.extract(&image).await.unwrap();
        println!("\n========== 提取结果 ==========");
        println!("{:#?}", fields);
        println!("==============================\n");
    }
}
