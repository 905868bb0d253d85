/// 信标登记表（线程安全）
///
/// 以身份键保存每个信标的最新目击。写入方可以是任意多个扫描回调，
/// 读取方是游戏循环在每个节拍边界取一次快照。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use super::{decode, Advertisement, BeaconSighting};

/// 信标登记表
#[derive(Debug, Default)]
pub struct BeaconRegistry {
    /// 身份键 -> 最新目击
    beacons: DashMap<String, BeaconSighting>,
}

impl BeaconRegistry {
    /// 创建空的登记表
    pub fn new() -> Self {
        BeaconRegistry {
            beacons: DashMap::new(),
        }
    }

    /// 登记一次目击
    ///
    /// 命名空间或实例为空白时拒收并返回 `false`；
    /// 已存在的信标按 [`BeaconSighting::merge`] 合并。
    pub fn register(&self, sighting: BeaconSighting) -> bool {
        if !sighting.has_identity() {
            return false;
        }

        match self.beacons.entry(sighting.identity_key()) {
            Entry::Occupied(mut existing) => existing.get_mut().merge(sighting),
            Entry::Vacant(slot) => {
                slot.insert(sighting);
            }
        }
        true
    }

    /// 解码并登记一次原始广播
    pub fn register_advertisement(&self, adv: &Advertisement) -> bool {
        self.register(decode(adv))
    }

    /// 清空所有信标（开始新的扫描会话时使用）
    pub fn clear(&self) {
        self.beacons.clear();
    }

    /// 获取 `cutoff` 之后（含）出现过的信标快照
    ///
    /// 不做淘汰：过期信标再次出现时会自动回到结果中。
    pub fn visible_since(&self, cutoff: DateTime<Utc>) -> Vec<BeaconSighting> {
        self.beacons
            .iter()
            .filter(|entry| entry.last_seen >= cutoff)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// 按身份键获取信标
    pub fn get(&self, key: &str) -> Option<BeaconSighting> {
        self.beacons.get(key).map(|entry| entry.value().clone())
    }

    /// 信标数量（含已过期的）
    pub fn len(&self) -> usize {
        self.beacons.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.beacons.is_empty()
    }
}

/// 广播接收任务
///
/// 持续消费扫描端推送的广播并写入登记表，通道关闭后返回被接受的目击数。
pub async fn ingest(registry: Arc<BeaconRegistry>, mut rx: UnboundedReceiver<Advertisement>) -> usize {
    let mut accepted = 0;
    while let Some(adv) = rx.recv().await {
        if registry.register_advertisement(&adv) {
            accepted += 1;
        } else {
            debug!("忽略无法识别的广播: {:012X}", adv.address);
        }
    }
    info!(accepted, "广播通道已关闭");
    accepted
}
