//! 流程层（Workflow Layer）
//!
//! 与界面无关的有限状态流程：每个流程是"当前状态 + 事件 → 新状态"的纯函数，
//! 视图层只负责渲染状态和发送事件

pub mod dispatch_form;
pub mod manual_intake;
pub mod navigation;
pub mod outgoing_entry;

pub use dispatch_form::DispatchForm;
pub use manual_intake::{IntakeEvent, IntakeMode, ManualIntake};
pub use navigation::{navigate, NavEvent, StartMode, ViewState};
pub use outgoing_entry::{OutgoingEntry, OutgoingEvent, OutgoingField, OutgoingForm, OutgoingStep};
