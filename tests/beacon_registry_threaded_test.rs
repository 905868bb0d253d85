/// 多任务并发写入 / 读取信标登记表

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use huntnav::beacon::{ingest, Advertisement, BeaconRegistry, BeaconSighting, AD_TYPE_SERVICE_DATA};
use tokio::sync::mpsc;
use tokio::task;
use tokio::time::sleep;

fn sighting(ns: &str, inst: &str, rssi: f64) -> BeaconSighting {
    let mut s = BeaconSighting::new(0xC5D6, rssi, Utc::now());
    s.namespace = ns.to_string();
    s.instance = inst.to_string();
    s
}

fn uid_advertisement(address: u64, namespace_byte: u8, instance_byte: u8, rssi: f64) -> Advertisement {
    let mut data = vec![0xAA, 0xFE, 0x00, 0xEE];
    data.extend_from_slice(&[namespace_byte; 10]);
    data.extend_from_slice(&[instance_byte; 6]);
    Advertisement::new(address, Utc::now(), rssi).with_section(AD_TYPE_SERVICE_DATA, data)
}

/// 多个写入任务与读取任务同时访问登记表
#[tokio::test]
async fn test_registry_concurrent_producers() {
    println!("\n========== 登记表并发测试 ==========\n");

    let registry = Arc::new(BeaconRegistry::new());
    let mut writers = Vec::new();

    for producer in 0..4 {
        let registry = Arc::clone(&registry);
        writers.push(task::spawn(async move {
            let mut accepted = 0;
            for round in 0..50 {
                for beacon in 0..5 {
                    let ns = format!("NS{}", producer);
                    let inst = format!("{:04}", beacon);
                    if registry.register(sighting(&ns, &inst, -40.0 - round as f64)) {
                        accepted += 1;
                    }
                }
                task::yield_now().await;
            }
            accepted
        }));
    }

    let reader_registry = Arc::clone(&registry);
    let reader = task::spawn(async move {
        let mut reads = 0;
        for _ in 0..20 {
            let snapshot = reader_registry.visible_since(Utc::now() - chrono::Duration::seconds(30));
            assert!(snapshot.len() <= 20);
            reads += 1;
            sleep(Duration::from_millis(1)).await;
        }
        reads
    });

    let mut total = 0;
    for writer in writers {
        total += writer.await.unwrap();
    }
    let reads = reader.await.unwrap();
    println!("✓ 写入 {} 次，读取 {} 次", total, reads);

    assert_eq!(total, 4 * 50 * 5);
    assert_eq!(registry.len(), 20);

    // 每个任务内按顺序写入，最后一次写入的信号强度生效
    let last = registry.get("NS2-0003").unwrap();
    assert_eq!(last.signal_strength, -89.0);
}

/// 多个扫描端通过通道推送广播，由单个接收任务登记
#[tokio::test]
async fn test_registry_ingest_channel() {
    let registry = Arc::new(BeaconRegistry::new());
    let (tx, rx) = mpsc::unbounded_channel();
    let ingest_handle = task::spawn(ingest(Arc::clone(&registry), rx));

    let mut scanners = Vec::new();
    for scanner in 0..3u8 {
        let tx = tx.clone();
        scanners.push(task::spawn(async move {
            for i in 0..10u8 {
                let adv = uid_advertisement(u64::from(scanner), 0x10 + scanner, i % 2, -70.0);
                tx.send(adv).unwrap();
                // 无法识别的广播
                tx.send(Advertisement::new(99, Utc::now(), -50.0)).unwrap();
            }
        }));
    }
    drop(tx);

    for scanner in scanners {
        scanner.await.unwrap();
    }
    let accepted = ingest_handle.await.unwrap();

    assert_eq!(accepted, 30);
    assert_eq!(registry.len(), 6);
    assert!(registry.get(&format!("{}-{}", "10".repeat(10), "01".repeat(6))).is_some());
}

/// 登记表只隐藏过期信标，不删除
#[tokio::test]
async fn test_registry_visibility_window() {
    let registry = BeaconRegistry::new();
    let mut old = sighting("AAAA", "0001", -70.0);
    old.last_seen = Utc::now() - chrono::Duration::seconds(60);
    registry.register(old);
    registry.register(sighting("BBBB", "0002", -65.0));

    let cutoff = Utc::now() - chrono::Duration::seconds(30);
    let visible = registry.visible_since(cutoff);
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].identity_key(), "BBBB-0002");
    assert_eq!(registry.len(), 2);

    registry.clear();
    assert!(registry.is_empty());
}
