//! 视图导航
//!
//! 当前视图 + 事件 → 新视图。不合法的事件保持原视图不变，
//! 保存或取消总是回到仪表盘

/// 手工收文的起始方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    Manual,
    Scan,
}

/// 当前视图
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Dashboard,
    /// 选择发文录入方式
    AddOutgoingMethod,
    /// 选择收文录入方式
    AddIncomingMethod,
    /// 发文手工录入
    ManualEntry,
    /// 收文手工/拍照录入
    ManualEntryIncoming { start_mode: StartMode },
    /// 批量上传
    UploadBatch,
    /// 发送某份文档
    Dispatch { doc_id: String },
}

/// 导航事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    AddOutgoing,
    AddIncoming,
    ChooseManualEntry,
    ChooseScan,
    ChooseManualIncoming,
    ChooseUpload,
    OpenDispatch { doc_id: String },
    Back,
    Saved,
    Cancelled,
}

/// 计算下一个视图
pub fn navigate(state: &ViewState, event: NavEvent) -> ViewState {
    use NavEvent as E;
    use ViewState as V;

    match (state, event) {
        (_, E::Saved | E::Cancelled) => V::Dashboard,

        (V::Dashboard, E::AddOutgoing) => V::AddOutgoingMethod,
        (V::Dashboard, E::AddIncoming) => V::AddIncomingMethod,
        (V::Dashboard, E::OpenDispatch { doc_id }) => V::Dispatch { doc_id },

        (V::AddOutgoingMethod, E::ChooseManualEntry) => V::ManualEntry,
        (V::AddIncomingMethod, E::ChooseScan) => V::ManualEntryIncoming {
            start_mode: StartMode::Scan,
        },
        (V::AddIncomingMethod, E::ChooseManualIncoming) => V::ManualEntryIncoming {
            start_mode: StartMode::Manual,
        },
        (V::AddIncomingMethod, E::ChooseUpload) => V::UploadBatch,

        (V::AddOutgoingMethod | V::AddIncomingMethod, E::Back) => V::Dashboard,
        (V::ManualEntry, E::Back) => V::AddOutgoingMethod,
        (V::ManualEntryIncoming { .. } | V::UploadBatch, E::Back) => V::AddIncomingMethod,
        (V::Dispatch { .. }, E::Back) => V::Dashboard,

        (current, _) => current.clone(),
    }
}
