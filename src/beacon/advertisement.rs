/// 广播帧解码
///
/// 支持的帧格式：
/// - Eddystone（AD 类型 0x16，服务 UUID 0xFEAA）：URL、TLM、UID 三种子帧
/// - iBeacon（Apple 厂商数据 0x004C，前缀 0x02 0x15），仅在 Eddystone 未给出命名空间时使用
///
/// 解码从不失败：无法识别的负载得到一条没有身份的目击，由登记表拒收。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BeaconSighting;

/// Apple 的蓝牙公司 ID
pub const APPLE_COMPANY_ID: u16 = 0x004C;

/// Eddystone 服务数据的 AD 类型
pub const AD_TYPE_SERVICE_DATA: u8 = 0x16;

/// 不完整 / 完整的 16 位服务 UUID 列表
const AD_TYPE_UUID16_INCOMPLETE: u8 = 0x02;
const AD_TYPE_UUID16_COMPLETE: u8 = 0x03;

/// Eddystone 服务 UUID 0xFEAA 的小端字节
const EDDYSTONE_MARKER: [u8; 2] = [0xAA, 0xFE];

const FRAME_UID: u8 = 0x00;
const FRAME_URL: u8 = 0x10;
const FRAME_TLM: u8 = 0x20;

/// UID / TLM 帧中的功率字节不可靠，固定使用实测值
pub const FIXED_CALIBRATED_POWER: i16 = -60;

/// 寻宝信标使用的 UUID 前缀
pub const HUNT_UUID_PREFIX: &str = "20160809";

const URL_SCHEMES: [&str; 4] = ["http://www.", "https://www.", "http://", "https://"];

/// 厂商数据块
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManufacturerData {
    pub company_id: u16,
    pub data: Vec<u8>,
}

/// 通用 AD 数据段
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataSection {
    pub data_type: u8,
    pub data: Vec<u8>,
}

/// 一次原始广播事件
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Advertisement {
    /// 发送方硬件地址
    pub address: u64,
    /// 到达时间
    pub timestamp: DateTime<Utc>,
    /// 实测信号强度 (dBm)
    pub signal_strength: f64,
    pub service_uuids: Vec<Uuid>,
    pub manufacturer_data: Vec<ManufacturerData>,
    pub data_sections: Vec<DataSection>,
}

impl Advertisement {
    /// 创建空负载的广播
    pub fn new(address: u64, timestamp: DateTime<Utc>, signal_strength: f64) -> Self {
        Advertisement {
            address,
            timestamp,
            signal_strength,
            service_uuids: Vec::new(),
            manufacturer_data: Vec::new(),
            data_sections: Vec::new(),
        }
    }

    /// 追加一个数据段
    pub fn with_section(mut self, data_type: u8, data: Vec<u8>) -> Self {
        self.data_sections.push(DataSection { data_type, data });
        self
    }

    /// 追加一个厂商数据块
    pub fn with_manufacturer(mut self, company_id: u16, data: Vec<u8>) -> Self {
        self.manufacturer_data.push(ManufacturerData { company_id, data });
        self
    }

    /// 追加一个服务 UUID
    pub fn with_service_uuid(mut self, uuid: Uuid) -> Self {
        self.service_uuids.push(uuid);
        self
    }
}

/// 将广播解码为目击记录
pub fn decode(adv: &Advertisement) -> BeaconSighting {
    let mut sighting = BeaconSighting::new(adv.address, adv.signal_strength, adv.timestamp);
    sighting.uuid = uuid_by_prefix(HUNT_UUID_PREFIX, adv);

    for section in &adv.data_sections {
        if section.data_type == AD_TYPE_SERVICE_DATA {
            apply_eddystone(&mut sighting, &section.data);
        }
    }

    if sighting.namespace.trim().is_empty() {
        for block in &adv.manufacturer_data {
            apply_ibeacon(&mut sighting, block);
        }
    }

    sighting
}

fn apply_eddystone(sighting: &mut BeaconSighting, data: &[u8]) {
    if data.len() < 3 || data[..2] != EDDYSTONE_MARKER {
        return;
    }

    match data[2] {
        FRAME_URL if data.len() > 4 && data[4] <= 0x03 => {
            sighting.calibrated_power = Some(data[3] as i8 as i16);
            let rest = String::from_utf8_lossy(&data[5..]);
            sighting.published_url = Some(format!("{}{}", URL_SCHEMES[data[4] as usize], rest));
        }
        FRAME_TLM if data.len() >= 16 => {
            sighting.calibrated_power = Some(FIXED_CALIBRATED_POWER);
            sighting.battery_mv = Some(u16::from_be_bytes([data[4], data[5]]));
            // 8.8 有符号定点数
            sighting.temperature_c = Some(data[6] as i8 as f32 + data[7] as f32 / 256.0);
        }
        FRAME_UID if data.len() >= 20 => {
            sighting.calibrated_power = Some(FIXED_CALIBRATED_POWER);
            sighting.namespace = hex::encode_upper(&data[4..14]);
            sighting.instance = hex::encode_upper(&data[14..20]);
        }
        _ => {}
    }
}

fn apply_ibeacon(sighting: &mut BeaconSighting, block: &ManufacturerData) {
    let data = &block.data;
    if block.company_id != APPLE_COMPANY_ID || data.len() < 18 || data[0] != 0x02 || data[1] != 0x15 {
        return;
    }

    let Ok(bytes) = <[u8; 16]>::try_from(&data[2..18]) else {
        return;
    };
    let uuid = Uuid::from_bytes(bytes);
    let text = uuid.hyphenated().to_string();

    sighting.calibrated_power = data.last().map(|b| *b as i8 as i16);
    sighting.uuid = Some(uuid);
    sighting.namespace = text[..23].to_string();
    sighting.instance = text[24..36].to_string();
}

/// 按前缀查找信标 UUID
///
/// 依次检查：服务 UUID（不区分大小写）、Apple 厂商数据（字节反转）、
/// 0x02/0x03 数据段（字节反转）。都不匹配时返回 `None`。
pub fn uuid_by_prefix(prefix: &str, adv: &Advertisement) -> Option<Uuid> {
    let matches = |text: &str| {
        text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix)
    };

    if let Some(uuid) = adv.service_uuids.iter().find(|u| matches(&u.to_string())) {
        return Some(*uuid);
    }

    let reversed = |data: &[u8]| -> Option<Uuid> {
        let mut bytes: [u8; 16] = data.try_into().ok()?;
        bytes.reverse();
        let uuid = Uuid::from_bytes(bytes);
        matches(&hex::encode_upper(bytes)).then_some(uuid)
    };

    let apple = adv
        .manufacturer_data
        .iter()
        .find(|md| md.company_id == APPLE_COMPANY_ID);
    if let Some(uuid) = apple.and_then(|md| reversed(&md.data)) {
        return Some(uuid);
    }

    adv.data_sections
        .iter()
        .find(|ds| ds.data_type == AD_TYPE_UUID16_INCOMPLETE || ds.data_type == AD_TYPE_UUID16_COMPLETE)
        .and_then(|ds| reversed(&ds.data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid_frame() -> Vec<u8> {
        let mut frame = vec![0xAA, 0xFE, FRAME_UID, 0xEE];
        frame.extend_from_slice(&[0x20, 0x16, 0x08, 0x09, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        frame.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x0A]);
        frame
    }

    #[test]
    fn test_uid_frame() {
        let adv = Advertisement::new(0x20A7165EC5D6, Utc::now(), -72.0)
            .with_section(AD_TYPE_SERVICE_DATA, uid_frame());
        let s = decode(&adv);

        assert_eq!(s.namespace, "20160809000000000000");
        assert_eq!(s.instance, "00000000000A");
        assert_eq!(s.calibrated_power, Some(FIXED_CALIBRATED_POWER));
        assert_eq!(s.identity_key(), "20160809000000000000-00000000000A");
    }

    #[test]
    fn test_url_frame() {
        let mut frame = vec![0xAA, 0xFE, FRAME_URL, 0xEB, 0x03];
        frame.extend_from_slice(b"goo.gl/abc");
        let adv = Advertisement::new(1, Utc::now(), -60.0).with_section(AD_TYPE_SERVICE_DATA, frame);
        let s = decode(&adv);

        assert_eq!(s.calibrated_power, Some(-21));
        assert_eq!(s.published_url.as_deref(), Some("https://goo.gl/abc"));
        assert!(!s.has_identity());
    }

    #[test]
    fn test_url_frame_bad_scheme_ignored() {
        let frame = vec![0xAA, 0xFE, FRAME_URL, 0xEB, 0x07, b'x'];
        let adv = Advertisement::new(1, Utc::now(), -60.0).with_section(AD_TYPE_SERVICE_DATA, frame);
        let s = decode(&adv);
        assert_eq!(s.published_url, None);
        assert_eq!(s.calibrated_power, None);
    }

    #[test]
    fn test_tlm_frame() {
        let frame = vec![
            0xAA, 0xFE, FRAME_TLM, 0x00, 0x0B, 0xB8, 0x15, 0x80, 0, 0, 0, 0, 0, 0, 0, 0,
        ];
        let adv = Advertisement::new(1, Utc::now(), -60.0).with_section(AD_TYPE_SERVICE_DATA, frame);
        let s = decode(&adv);

        assert_eq!(s.battery_mv, Some(3000));
        assert_eq!(s.temperature_c, Some(21.5));
        assert_eq!(s.calibrated_power, Some(FIXED_CALIBRATED_POWER));
    }

    #[test]
    fn test_short_payloads_yield_no_identity() {
        let adv = Advertisement::new(1, Utc::now(), -60.0)
            .with_section(AD_TYPE_SERVICE_DATA, vec![])
            .with_section(AD_TYPE_SERVICE_DATA, vec![0xAA])
            .with_section(AD_TYPE_SERVICE_DATA, vec![0xAA, 0xFE, FRAME_UID, 0x00, 0x01])
            .with_manufacturer(APPLE_COMPANY_ID, vec![0x02, 0x15, 0x01]);
        let s = decode(&adv);
        assert!(!s.has_identity());
        assert_eq!(s.uuid, None);
    }

    #[test]
    fn test_ibeacon_fallback() {
        let mut data = vec![0x02, 0x15];
        data.extend_from_slice(&[
            0x20, 0x16, 0x08, 0x09, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x15,
        ]);
        data.extend_from_slice(&[0x00, 0x01, 0x00, 0x02, 0xC5]);
        let adv = Advertisement::new(1, Utc::now(), -70.0).with_manufacturer(APPLE_COMPANY_ID, data);
        let s = decode(&adv);

        assert_eq!(s.namespace, "20160809-0000-0000-0000");
        assert_eq!(s.instance, "000000000015");
        assert_eq!(s.calibrated_power, Some(-59));
        assert_eq!(
            s.uuid.map(|u| u.to_string()),
            Some("20160809-0000-0000-0000-000000000015".to_string())
        );
    }

    #[test]
    fn test_ibeacon_ignored_when_eddystone_present() {
        let mut data = vec![0x02, 0x15];
        data.extend_from_slice(&[0x11; 16]);
        data.push(0xC5);
        let adv = Advertisement::new(1, Utc::now(), -70.0)
            .with_section(AD_TYPE_SERVICE_DATA, uid_frame())
            .with_manufacturer(APPLE_COMPANY_ID, data);
        let s = decode(&adv);
        assert_eq!(s.namespace, "20160809000000000000");
        assert_eq!(s.calibrated_power, Some(FIXED_CALIBRATED_POWER));
    }

    #[test]
    fn test_uuid_from_service_list() {
        let wanted = Uuid::parse_str("20160809-aaaa-bbbb-cccc-000000000001").unwrap();
        let other = Uuid::parse_str("0000feaa-0000-1000-8000-00805f9b34fb").unwrap();
        let adv = Advertisement::new(1, Utc::now(), -70.0)
            .with_service_uuid(other)
            .with_service_uuid(wanted);
        assert_eq!(uuid_by_prefix(HUNT_UUID_PREFIX, &adv), Some(wanted));
    }

    #[test]
    fn test_uuid_from_reversed_section() {
        let mut bytes = [0u8; 16];
        bytes[..4].copy_from_slice(&[0x20, 0x16, 0x08, 0x09]);
        bytes[15] = 0x07;
        let mut reversed = bytes;
        reversed.reverse();
        let adv = Advertisement::new(1, Utc::now(), -70.0)
            .with_section(AD_TYPE_UUID16_COMPLETE, reversed.to_vec());

        assert_eq!(uuid_by_prefix(HUNT_UUID_PREFIX, &adv), Some(Uuid::from_bytes(bytes)));
        assert_eq!(uuid_by_prefix("ffffffff", &adv), None);
    }
}
