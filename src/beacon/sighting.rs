/// 信标目击记录

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 单个广播设备的最新状态
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeaconSighting {
    /// 蓝牙硬件地址
    pub address: u64,
    /// 命名空间（十六进制字符串，未解出时为空）
    pub namespace: String,
    /// 实例（十六进制字符串，未解出时为空）
    pub instance: String,
    /// 稳定 UUID（服务 UUID、厂商数据或 iBeacon 帧）
    pub uuid: Option<Uuid>,
    /// 1 米处的参考功率 (dBm)
    pub calibrated_power: Option<i16>,
    /// 实测信号强度 (dBm)
    pub signal_strength: f64,
    /// 最后一次收到广播的时间
    pub last_seen: DateTime<Utc>,
    /// 电池电压 (mV)
    pub battery_mv: Option<u16>,
    /// 温度 (°C)
    pub temperature_c: Option<f32>,
    /// 广播的 URL
    pub published_url: Option<String>,
}

impl BeaconSighting {
    /// 创建尚无身份和遥测的目击
    pub fn new(address: u64, signal_strength: f64, last_seen: DateTime<Utc>) -> Self {
        BeaconSighting {
            address,
            namespace: String::new(),
            instance: String::new(),
            uuid: None,
            calibrated_power: None,
            signal_strength,
            last_seen,
            battery_mv: None,
            temperature_c: None,
            published_url: None,
        }
    }

    /// 命名空间和实例都非空白时才算有身份
    pub fn has_identity(&self) -> bool {
        !self.namespace.trim().is_empty() && !self.instance.trim().is_empty()
    }

    /// 身份键: `namespace-instance`
    pub fn identity_key(&self) -> String {
        format!("{}-{}", self.namespace, self.instance)
    }

    /// 合并一次新的目击
    ///
    /// 可选字段：新值存在则覆盖，否则保留旧值；信号强度与时间总是覆盖。
    pub fn merge(&mut self, newer: BeaconSighting) {
        self.signal_strength = newer.signal_strength;
        self.last_seen = newer.last_seen;
        self.calibrated_power = newer.calibrated_power.or(self.calibrated_power);
        self.battery_mv = newer.battery_mv.or(self.battery_mv);
        self.temperature_c = newer.temperature_c.or(self.temperature_c);
        self.uuid = newer.uuid.or(self.uuid);
        if newer.published_url.is_some() {
            self.published_url = newer.published_url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_requires_both_parts() {
        let mut s = BeaconSighting::new(1, -70.0, Utc::now());
        assert!(!s.has_identity());
        s.namespace = "AABB".to_string();
        s.instance = "   ".to_string();
        assert!(!s.has_identity());
        s.instance = "0001".to_string();
        assert!(s.has_identity());
        assert_eq!(s.identity_key(), "AABB-0001");
    }

    #[test]
    fn test_merge_keeps_old_telemetry() {
        let mut old = BeaconSighting::new(1, -70.0, Utc::now());
        old.battery_mv = Some(3000);
        old.published_url = Some("https://example.com".to_string());

        let mut newer = BeaconSighting::new(1, -55.0, Utc::now());
        newer.temperature_c = Some(21.5);
        old.merge(newer);

        assert_eq!(old.signal_strength, -55.0);
        assert_eq!(old.battery_mv, Some(3000));
        assert_eq!(old.temperature_c, Some(21.5));
        assert_eq!(old.published_url.as_deref(), Some("https://example.com"));
    }
}
