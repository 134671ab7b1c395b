//! 时间与标识来源
//!
//! 存储层通过这两个 trait 获取"现在"和新 id，测试中可替换为可控实现

use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// 时钟
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动控制的时钟
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 标识生成器
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// 基于 UUID v4 的标识，同一毫秒内生成也不会冲突
#[derive(Debug, Clone)]
pub struct UuidIdGenerator {
    prefix: String,
}

impl UuidIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for UuidIdGenerator {
    fn default() -> Self {
        Self::new("doc_")
    }
}

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> String {
        format!("{}{}", self.prefix, Uuid::new_v4().simple())
    }
}

/// 顺序编号（测试用）
#[derive(Debug, Default)]
pub struct SequentialIds {
    counter: AtomicU64,
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("doc_{}", n)
    }
}
