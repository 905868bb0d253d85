/// 寻宝引擎的错误类型
///
/// 解码失败、身份缺失、几何不足都不是错误（分别返回无身份目击、`false`、原点），
/// 这里只收录调用方必须处理的情况。

use thiserror::Error;

use crate::game::GamePhase;

#[derive(Debug, Error)]
pub enum HuntError {
    #[error("反馈设备初始化失败: {0}")]
    FeedbackInit(String),

    #[error("确认按钮初始化失败: {0}")]
    ButtonInit(String),

    #[error("状态 {from:?} 下不允许执行 {op}")]
    InvalidState { from: GamePhase, op: &'static str },

    #[error("地图中没有任何兴趣点")]
    EmptyMap,

    #[error("地图中不存在兴趣点 {0}")]
    UnknownPoint(String),

    #[error("当前没有目标兴趣点")]
    NoGoal,

    #[error("游戏循环未能正常停止: {0}")]
    Stop(String),

    #[error("配置解析失败: {0}")]
    Config(#[from] toml::de::Error),

    #[error("配置取值无效: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "ble")]
    #[error("蓝牙错误: {0}")]
    Bluetooth(#[from] btleplug::Error),

    #[cfg(feature = "ble")]
    #[error("设备名称过滤表达式无效: {0}")]
    Pattern(#[from] regex::Error),
}

impl HuntError {
    pub(crate) fn invalid_state(from: GamePhase, op: &'static str) -> Self {
        Self::InvalidState { from, op }
    }
}

pub type Result<T> = std::result::Result<T, HuntError>;
