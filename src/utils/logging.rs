/// 日志工具模块
///
/// 初始化 tracing 订阅者，并提供批量录入各阶段的日志输出
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::orchestrator::ingestion::BatchSummary;

/// 初始化日志
///
/// `RUST_LOG` 优先；未设置时默认 `info`，详细模式下为 `debug`。
/// 重复调用不会报错（测试中可能多次初始化）
pub fn init(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `store_path`: 存储文件
/// - `intake_folder`: 待录入目录
/// - `max_concurrent`: 最大并发提取数
pub fn log_startup(store_path: &str, intake_folder: &str, max_concurrent: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量公文录入");
    info!("💾 存储文件: {}", store_path);
    info!("📁 待录入目录: {}", intake_folder);
    info!("📊 最大并发提取数: {}", max_concurrent);
    info!("{}", "=".repeat(60));
}

/// 记录源文件加载信息
pub fn log_files_loaded(files: usize, items: usize) {
    info!("✓ 找到 {} 个源文件，展开为 {} 个批次项", files, items);
}

/// 记录单项进度
///
/// # 参数
/// - `done`: 已有结果的数量
/// - `total`: 派发总数
/// - `name`: 批次项名称
/// - `ok`: 是否提取成功
pub fn log_progress(done: usize, total: usize, name: &str, ok: bool) {
    let mark = if ok { "✓" } else { "✗" };
    info!("[{}/{}] {} {}", done, total, mark, truncate_text(name, 40));
}

/// 记录批次完成信息
pub fn log_batch_complete(summary: &BatchSummary) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 提取完成: 成功 {}/{}，失败 {}",
        summary.complete, summary.total, summary.failed
    );
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `summary`: 批次统计
/// - `created`: 写入存储的文档数
/// - `store_path`: 存储文件
pub fn print_final_stats(summary: &BatchSummary, created: usize, store_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 已登记: {}/{}", created, summary.total);
    info!("❌ 提取失败: {}", summary.failed);
    info!("{}", "=".repeat(60));
    info!("\n文档已保存至: {}", store_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
