//! 解码命令
//!
//! 把一段主机下行字节流喂进帧扫描器，逐个令牌给出解码结果。
//! 联调主机软件时用来确认它发出的字节到了控制器这边会被怎么理解。

use anyhow::Result;
use clap::Args;
use trackside_sdk::protocol::{HostCommand, Token, TokenScanner};

/// 解码命令参数
#[derive(Args, Debug)]
pub struct DecodeCommand {
    /// 一段或多段原始字节流（不带方括号时自动补上）
    #[arg(required = true)]
    pub stream: Vec<String>,

    /// 以 JSON 逐行输出解码结果
    #[arg(long)]
    pub json: bool,
}

impl DecodeCommand {
    /// 执行解码
    pub fn execute(&self) -> Result<()> {
        let mut scanner = TokenScanner::new();
        for chunk in &self.stream {
            let framed = if chunk.contains('[') {
                chunk.clone()
            } else {
                format!("[{chunk}]")
            };
            for byte in framed.bytes() {
                if let Some(token) = scanner.push(byte) {
                    self.print_token(&token)?;
                }
            }
        }
        Ok(())
    }

    fn print_token(&self, token: &Token) -> Result<()> {
        match HostCommand::parse(token.as_bytes()) {
            Some(command) => {
                if self.json {
                    println!("{}", serde_json::to_string(&command)?);
                } else {
                    println!("[{token}] -> {command:?}");
                }
            },
            None => {
                if self.json {
                    println!("{}", serde_json::json!({ "ignored": token.to_string() }));
                } else {
                    println!("[{token}] -> ignored");
                }
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_command_creation() {
        let cmd = DecodeCommand {
            stream: vec!["[PW011]".to_string()],
            json: false,
        };

        assert_eq!(cmd.stream.len(), 1);
        assert!(!cmd.json);
    }

    #[test]
    fn test_decode_mixed_stream_succeeds() {
        let cmd = DecodeCommand {
            stream: vec!["noise[PW011][XX]".to_string(), "RC0".to_string()],
            json: true,
        };

        assert!(cmd.execute().is_ok());
    }
}
