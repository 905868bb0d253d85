/// 寻宝游戏模块
///
/// - 地图、兴趣点与参赛者
/// - LED 反馈与确认按钮
/// - 单节拍引导逻辑与后台游戏循环

pub mod button;
pub mod contestant;
pub mod feedback;
pub mod map;
pub mod service;
pub mod state;

pub use button::*;
pub use contestant::*;
pub use feedback::*;
pub use map::*;
pub use service::*;
pub use state::*;
