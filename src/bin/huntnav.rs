/// 寻宝引导命令行程序
///
/// 扫描附近的信标，按地图文件引导参赛者逐个寻找兴趣点。
/// 标准输入控制：回车 = 按下确认按钮，`p` = 暂停，`r` = 继续，`q` = 退出。
/// 每个事件以一行 JSON 输出到标准输出。

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use huntnav::beacon::{ingest, BeaconRegistry};
use huntnav::game::{GameEvent, GameService, SimulatedButton, SimulatedLed};
use huntnav::scan::{first_adapter, scan_advertisements};
use huntnav::telemetry::{init_tracing, DEFAULT_FILTER};
use huntnav::{GameConfig, MapFile, Result};

// ==================== 命令行参数 ====================

#[derive(Parser, Debug)]
#[command(name = "huntnav", about = "蓝牙信标寻宝引导")]
struct Args {
    /// 地图文件（TOML）
    #[arg(short, long)]
    map: PathBuf,
    /// 游戏参数文件（TOML），缺省使用默认参数
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// 设备名称过滤正则表达式
    #[arg(long)]
    name_filter: Option<String>,
    /// 目标选择的随机种子
    #[arg(long)]
    seed: Option<u64>,
}

// ==================== 主流程 ====================

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(DEFAULT_FILTER);
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    let map = MapFile::load(&args.map)?.into_map()?;
    let filter = args.name_filter.as_deref().map(Regex::new).transpose()?;
    info!("地图载入完成，{} 个兴趣点", map.points().len());

    let registry = Arc::new(BeaconRegistry::new());
    let (adv_tx, adv_rx) = mpsc::unbounded_channel();
    let ingest_task = tokio::spawn(ingest(Arc::clone(&registry), adv_rx));

    let adapter = first_adapter().await?;
    let scan_task = tokio::spawn(async move {
        if let Err(e) = scan_advertisements(&adapter, adv_tx, filter).await {
            warn!("扫描任务退出: {}", e);
        }
    });

    let button = SimulatedButton::new();
    let (service, mut events) =
        GameService::new(config, Arc::clone(&registry), SimulatedLed::new(), button.clone());
    let mut service = match args.seed {
        Some(seed) => service.with_seed(seed),
        None => service,
    };
    service.start(map).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                print_event(&event);
                if matches!(event, GameEvent::Completed { .. }) {
                    break;
                }
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("读取标准输入失败: {}", e);
                        break;
                    }
                };
                // 控制命令失败不结束程序，循环之后总会执行停止
                match line.as_deref().map(str::trim) {
                    Some("") => button.press(),
                    Some("p") => {
                        if let Err(e) = service.pause().await {
                            warn!("无法暂停: {}", e);
                        }
                    }
                    Some("r") => {
                        if let Err(e) = service.resume().await {
                            warn!("无法继续: {}", e);
                        }
                    }
                    Some("q") | None => break,
                    Some(other) => warn!("未知命令: {}", other),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    service.stop().await?;
    scan_task.abort();
    match ingest_task.await {
        Ok(accepted) => info!("共登记 {} 条信标目击", accepted),
        Err(e) => warn!("广播接收任务异常: {}", e),
    }
    Ok(())
}

fn print_event(event: &GameEvent) {
    match serde_json::to_string(event) {
        Ok(json) => println!("{}", json),
        Err(e) => warn!("事件序列化失败: {}", e),
    }
}
