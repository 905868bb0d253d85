/// 定位算法模块
///
/// 该模块提供寻宝引导所需的算法：
/// - 兴趣点与平面坐标
/// - RSSI 测距模型
/// - 每个兴趣点的可见性平滑与淡出
/// - 加权回归位置估计

pub mod poi;
pub mod position;
pub mod ranging;
pub mod visibility;

pub use poi::*;
pub use position::*;
pub use ranging::*;
pub use visibility::*;
