/// 基于 btleplug 的蓝牙扫描输入
///
/// 订阅适配器事件，每收到一次携带广播内容的事件就读取该外设的属性，
/// 以事件到达时间转换为 `Advertisement` 送入通道，由 `beacon::ingest` 解码登记。
/// 不再广播的信标不会产生事件，其最后出现时间保持不变。

use btleplug::api::{
    Central, CentralEvent, Manager as _, Peripheral as _, PeripheralProperties, ScanFilter,
};
use btleplug::platform::{Adapter, Manager};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use regex::Regex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::beacon::{Advertisement, AD_TYPE_SERVICE_DATA};
use crate::error::{HuntError, Result};

/// 蓝牙基础 UUID 的低 96 位
const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;

/// 16 位服务 UUID，非基础 UUID 派生的返回 `None`
pub fn short_uuid(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    if value & ((1u128 << 96) - 1) != BLUETOOTH_BASE_UUID || value >> 112 != 0 {
        return None;
    }
    Some((value >> 96) as u16)
}

/// 把外设属性转换为广播帧，没有 RSSI 的外设返回 `None`
///
/// 16 位 UUID 的服务数据还原为 0x16 数据段（UUID 小端在前）。
pub fn advertisement_from_properties(
    props: &PeripheralProperties,
    at: DateTime<Utc>,
) -> Option<Advertisement> {
    let rssi = props.rssi?;
    let address = props
        .address
        .into_inner()
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));

    let mut adv = Advertisement::new(address, at, f64::from(rssi));

    let mut companies: Vec<_> = props.manufacturer_data.iter().collect();
    companies.sort_by_key(|(id, _)| **id);
    for (company_id, data) in companies {
        adv = adv.with_manufacturer(*company_id, data.clone());
    }

    for (uuid, data) in &props.service_data {
        if let Some(short) = short_uuid(uuid) {
            let mut section = short.to_le_bytes().to_vec();
            section.extend_from_slice(data);
            adv = adv.with_section(AD_TYPE_SERVICE_DATA, section);
        }
    }

    for uuid in &props.services {
        adv = adv.with_service_uuid(*uuid);
    }

    Some(adv)
}

/// 获取第一个蓝牙适配器
pub async fn first_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters
        .into_iter()
        .next()
        .ok_or_else(|| HuntError::Bluetooth(btleplug::Error::DeviceNotFound))
}

/// 持续扫描并把广播帧送入通道，直到接收端关闭或事件流结束
///
/// 参数：
/// - adapter: 蓝牙适配器
/// - tx: 广播帧通道
/// - filter: 可选的设备名称过滤，没有名称的外设在过滤时被跳过
///
/// 返回发送的广播帧数量
pub async fn scan_advertisements(
    adapter: &Adapter,
    tx: UnboundedSender<Advertisement>,
    filter: Option<Regex>,
) -> Result<usize> {
    let events = adapter.events().await?;
    adapter.start_scan(ScanFilter::default()).await?;
    info!("蓝牙扫描已启动");

    let central = adapter.clone();
    let arrivals = events.filter_map(move |event| {
        let adapter = central.clone();
        async move {
            let id = match event {
                CentralEvent::DeviceDiscovered(id)
                | CentralEvent::DeviceUpdated(id)
                | CentralEvent::ManufacturerDataAdvertisement { id, .. }
                | CentralEvent::ServiceDataAdvertisement { id, .. }
                | CentralEvent::ServicesAdvertisement { id, .. } => id,
                _ => return None,
            };
            let at = Utc::now();
            let peripheral = match adapter.peripheral(&id).await {
                Ok(peripheral) => peripheral,
                Err(e) => {
                    debug!("外设 {:?} 已不可用: {}", id, e);
                    return None;
                }
            };
            match peripheral.properties().await {
                Ok(props) => props.map(|props| (props, at)),
                Err(e) => {
                    warn!("读取外设属性失败: {}", e);
                    None
                }
            }
        }
    });

    let sent = forward_advertisements(Box::pin(arrivals), &tx, filter.as_ref()).await;

    adapter.stop_scan().await?;
    info!("蓝牙扫描结束，共发送 {} 条广播帧", sent);
    Ok(sent)
}

/// 把 (外设属性, 到达时间) 流转换为广播帧送入通道
///
/// 每个元素只发送一次，时间戳取元素自带的到达时间。
/// 流结束或接收端关闭时返回已发送的数量。
pub async fn forward_advertisements<S>(
    mut arrivals: S,
    tx: &UnboundedSender<Advertisement>,
    filter: Option<&Regex>,
) -> usize
where
    S: Stream<Item = (PeripheralProperties, DateTime<Utc>)> + Unpin,
{
    let mut sent = 0usize;
    loop {
        let next = tokio::select! {
            next = arrivals.next() => next,
            _ = tx.closed() => None,
        };
        let Some((props, at)) = next else { break };

        if let Some(pattern) = filter {
            match &props.local_name {
                Some(name) if pattern.is_match(name) => {}
                _ => continue,
            }
        }

        if let Some(adv) = advertisement_from_properties(&props, at) {
            if tx.send(adv).is_err() {
                break;
            }
            sent += 1;
            if sent % 100 == 0 {
                debug!("已发送 {} 条广播帧", sent);
            }
        }
    }
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use btleplug::api::BDAddr;
    use std::collections::HashMap;

    fn eddystone_uuid() -> Uuid {
        Uuid::from_u128(0x0000_FEAA_0000_1000_8000_0080_5F9B_34FB)
    }

    #[test]
    fn test_short_uuid() {
        assert_eq!(short_uuid(&eddystone_uuid()), Some(0xFEAA));
        assert_eq!(short_uuid(&Uuid::from_u128(0x2016_0809_0000_0000_0000_0000_0000_0001)), None);
    }

    #[test]
    fn test_properties_to_advertisement() {
        let mut frame = vec![0x00, 0xEE];
        frame.extend_from_slice(&[0x11; 10]);
        frame.extend_from_slice(&[0x22; 6]);

        let props = PeripheralProperties {
            address: BDAddr::from([0x00, 0x00, 0x00, 0x00, 0x01, 0x02]),
            rssi: Some(-70),
            service_data: HashMap::from([(eddystone_uuid(), frame)]),
            ..PeripheralProperties::default()
        };

        let adv = advertisement_from_properties(&props, Utc::now()).unwrap();
        assert_eq!(adv.address, 0x0102);
        assert_eq!(adv.signal_strength, -70.0);
        assert_eq!(adv.data_sections.len(), 1);
        assert_eq!(adv.data_sections[0].data[..2], [0xAA, 0xFE]);

        let sighting = crate::beacon::decode(&adv);
        assert_eq!(sighting.namespace, "11".repeat(10));
        assert_eq!(sighting.instance, "22".repeat(6));
    }

    #[test]
    fn test_missing_rssi() {
        let props = PeripheralProperties::default();
        assert!(advertisement_from_properties(&props, Utc::now()).is_none());
    }

    fn named(name: &str, last_octet: u8, rssi: i16) -> PeripheralProperties {
        PeripheralProperties {
            address: BDAddr::from([0, 0, 0, 0, 0, last_octet]),
            rssi: Some(rssi),
            local_name: Some(name.to_string()),
            ..PeripheralProperties::default()
        }
    }

    #[tokio::test]
    async fn test_forward_keeps_arrival_time() {
        let t0 = Utc::now() - chrono::Duration::seconds(120);
        let t1 = t0 + chrono::Duration::seconds(1);
        let t2 = t0 + chrono::Duration::seconds(2);
        let arrivals = futures::stream::iter(vec![
            (named("HUNT-1", 1, -70), t0),
            (named("phone", 2, -50), t1),
            (named("HUNT-1", 1, -65), t2),
        ]);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let pattern = Regex::new("^HUNT").unwrap();
        let sent = forward_advertisements(arrivals, &tx, Some(&pattern)).await;
        assert_eq!(sent, 2);

        // 时间戳是到达时间，而不是转发时间
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.timestamp, t0);
        assert_eq!(second.timestamp, t2);
        assert_eq!(second.signal_strength, -65.0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_forward_stops_when_receiver_closed() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let arrivals = futures::stream::pending::<(PeripheralProperties, DateTime<Utc>)>();
        let sent = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            forward_advertisements(arrivals, &tx, None),
        )
        .await
        .unwrap();
        assert_eq!(sent, 0);
    }
}
