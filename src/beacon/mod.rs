/// 信标模块
///
/// 原始广播 -> 目击记录 -> 登记表

pub mod advertisement;
pub mod registry;
pub mod sighting;

pub use advertisement::*;
pub use registry::*;
pub use sighting::*;
