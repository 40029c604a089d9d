//! # Trackside CLI
//!
//! 轨道车计时控制器的命令行工具。
//!
//! ## 模拟模式（推荐用于联调主机软件）
//!
//! ```bash
//! # 模式拨码 11：抢跑检测开，罚时 3 秒
//! trackside-cli simulate --mode 11
//!
//! trackside> RC0
//! trackside> PW001
//! trackside> SL061
//! trackside> pulse 1
//! << [SF01$4821]
//! trackside> quit
//! ```
//!
//! ## 协议工具
//!
//! ```bash
//! # 解码一段主机下行字节流
//! trackside-cli decode "noise[PW011][SL061][RC2]"
//!
//! # 列出 16 个模式拨码的含义
//! trackside-cli modes
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{DecodeCommand, SimulateCommand};

/// Trackside CLI - 赛道控制器命令行工具
#[derive(Parser, Debug)]
#[command(name = "trackside-cli")]
#[command(about = "Command-line interface for Trackside race controllers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 在 Mock 板卡上跑一个交互式控制器会话
    Simulate {
        #[command(flatten)]
        args: SimulateCommand,
    },

    /// 解码主机下行字节流
    Decode {
        #[command(flatten)]
        args: DecodeCommand,
    },

    /// 列出模式拨码的含义
    Modes,
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("trackside_cli=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { args } => args.execute(),

        Commands::Decode { args } => args.execute(),

        Commands::Modes => {
            commands::modes::run();
            Ok(())
        },
    }
}
