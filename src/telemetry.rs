/// 日志初始化
///
/// 过滤级别取自 `RUST_LOG`，未设置时使用传入的默认值（如 `huntnav=info`）。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 默认日志过滤
pub const DEFAULT_FILTER: &str = "huntnav=info";

/// 安装全局日志订阅器，重复调用时返回 `false`
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()
        .is_ok()
}
