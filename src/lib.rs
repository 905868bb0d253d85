/// 蓝牙信标寻宝引擎
///
/// - `beacon`: 广播帧解码与信标登记表
/// - `algorithms`: 测距模型、可见性平滑、位置估计
/// - `game`: 地图、参赛者与固定节拍的引导状态机
/// - `scan`: 基于 btleplug 的扫描输入（`ble` 特性）

pub mod algorithms;
pub mod beacon;
pub mod config;
pub mod error;
pub mod game;
#[cfg(feature = "ble")]
pub mod scan;
pub mod telemetry;

pub use config::{GameConfig, MapFile};
pub use error::{HuntError, Result};
pub use game::GamePhase;
