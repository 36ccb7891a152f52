//! 医生工作台命令行入口
//! 基于本地会话文件解析当前用户的医生 ID

use doctor_portal::{
    client::ApiClient,
    config::AppConfig,
    events::{SessionEvent, SessionEvents},
    services::{DoctorApi, DoctorResolver},
    storage::{FileSessionStore, SessionStore},
    telemetry,
};
use std::sync::Arc;

enum Command {
    Resolve,
    Cached,
    Logout,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    let command = match args.get(1).map(String::as_str) {
        Some("--version") => {
            println!("doctor-portal {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some("--help") | None => {
            print_help();
            return Ok(());
        }
        Some("resolve") => Command::Resolve,
        Some("cached") => Command::Cached,
        Some("logout") => Command::Logout,
        Some(other) => {
            eprintln!("未知参数: {}", other);
            print_help();
            std::process::exit(1);
        }
    };

    // 加载 .env 文件（开发环境）
    if let Ok(env) = std::env::var("PORTAL_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config);

    // 3. 会话存储与客户端
    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::open(&config.session.store_path)?);
    let events = SessionEvents::default();
    let mut session_events = events.subscribe();
    let client = ApiClient::new(&config, store.clone(), events)?;
    let resolver = DoctorResolver::new(
        Arc::new(DoctorApi::new(client.clone())),
        store,
        config.resolver.clone(),
    );

    match command {
        Command::Resolve => match resolver.resolve().await {
            Some(doctor_id) => println!("{}", doctor_id),
            None => println!("not found"),
        },
        Command::Cached => match resolver.cached_doctor_id() {
            Some(doctor_id) => println!("{}", doctor_id),
            None => println!("not cached"),
        },
        Command::Logout => {
            client.logout()?;
            println!("logged out");
        }
    }

    // 会话失效由宿主处理跳转，命令行只提示重新登录
    while let Ok(event) = session_events.try_recv() {
        if let SessionEvent::Expired { reason, redirect_to } = event {
            tracing::warn!(reason = %reason, "Session expired");
            eprintln!("会话已失效，请重新登录 ({})", redirect_to);
        }
    }

    Ok(())
}

/// 打印帮助信息
fn print_help() {
    println!("doctor-portal {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: doctor-portal <命令>");
    println!();
    println!("命令:");
    println!("  resolve       解析当前登录用户的医生 ID");
    println!("  cached        读取缓存的医生 ID（不访问网络）");
    println!("  logout        清除本地会话与医生身份缓存");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 PORTAL_ 前缀的环境变量完成，例如 PORTAL_API__BASE_URL");
}
