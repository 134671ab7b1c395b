//! 仪表盘视图 - 业务能力层
//!
//! 只读：把文档集合分成"收文"与"已发送"两列，并支持关键字过滤

use crate::models::Document;

/// 仪表盘两列
#[derive(Debug, Default, PartialEq)]
pub struct DashboardView<'a> {
    /// 流转中的文档，按接收时间从新到旧
    pub incoming: Vec<&'a Document>,
    /// 已发送或已归档的文档，按发送时间从新到旧
    pub dispatched: Vec<&'a Document>,
}

impl DashboardView<'_> {
    pub fn total(&self) -> usize {
        self.incoming.len() + self.dispatched.len()
    }
}

/// 划分文档集合
///
/// # 参数
/// - `documents`: 全部文档
/// - `search`: 关键字（忽略大小写，匹配事由、发文人、文号、发文部门），空白表示不过滤
pub fn partition<'a>(documents: &'a [Document], search: Option<&str>) -> DashboardView<'a> {
    let needle = search
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let (mut dispatched, mut incoming): (Vec<&Document>, Vec<&Document>) = documents
        .iter()
        .filter(|doc| needle.as_deref().map_or(true, |n| matches_search(doc, n)))
        .partition(|doc| doc.is_closed());

    incoming.sort_by(|a, b| b.received_date.cmp(&a.received_date));
    dispatched.sort_by(|a, b| b.dispatched_date().cmp(&a.dispatched_date()));

    DashboardView {
        incoming,
        dispatched,
    }
}

fn matches_search(document: &Document, needle: &str) -> bool {
    [
        &document.subject,
        &document.sender_name,
        &document.reference_number,
        &document.originating_division,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
}
