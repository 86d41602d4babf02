use drc_event_listener::{config::EventListenerConfig, EventListenerService};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境配置文件
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("⚠️ 未加载.env文件: {}", e);
    }

    // 初始化日志系统
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("🎯 启动DRC Event-Listener服务");

    // 加载配置
    let config = match EventListenerConfig::from_env() {
        Ok(config) => {
            info!("✅ 配置加载成功");
            config
        }
        Err(e) => {
            error!("❌ 配置加载失败: {}", e);
            std::process::exit(1);
        }
    };

    // 创建并启动服务
    let service = EventListenerService::new(config);
    if let Err(e) = service.start().await {
        error!("❌ Event-Listener服务运行失败: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
