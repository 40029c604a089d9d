//! 方括号帧提取
//!
//! 主机链路是一条连续的字节流，命令令牌被 `[` 和 `]` 包裹，括号之外
//! 可能混有任意噪声（上电垃圾、行结束符、人工调试输入）。本模块提供
//! 增量式扫描器，把字节流切成一个个完整令牌。

/// 单个令牌的最大长度（字节，不含括号）
///
/// 协议词汇表中最长的入站令牌是 5 字节（`SL061` 等），出站发车报告
/// 也不超过 12 字节。16 字节留出余量，同时保证扫描器无堆分配。
pub const MAX_TOKEN_LEN: usize = 16;

/// 一条完整的入站令牌（已去除括号）
///
/// # 设计特性
///
/// - **Copy trait**：零成本复制，可直接穿过通道或塞进队列
/// - **固定缓冲**：无堆分配，无生命周期，自包含
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    bytes: [u8; MAX_TOKEN_LEN],
    len: u8,
}

impl Token {
    fn from_slice(slice: &[u8]) -> Self {
        let mut bytes = [0u8; MAX_TOKEN_LEN];
        let len = slice.len().min(MAX_TOKEN_LEN);
        bytes[..len].copy_from_slice(&slice[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }

    /// 令牌内容（只含有效字节）
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// 有效长度
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// 是否为空令牌（`[]`）
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in self.as_bytes() {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02X}")?;
            }
        }
        Ok(())
    }
}

/// 增量式令牌扫描器
///
/// 每次喂入一个字节，凑齐一条完整令牌时返回它。括号外的字节直接
/// 丢弃；令牌内部再次出现 `[` 时从头重新收集（前半截视为噪声）；
/// 超过 [`MAX_TOKEN_LEN`] 的令牌整条静默丢弃。
///
/// # 示例
///
/// ```rust
/// use trackside_protocol::TokenScanner;
///
/// let mut scanner = TokenScanner::new();
/// let mut tokens = Vec::new();
/// for &b in b"garbage[PW011]more" {
///     if let Some(token) = scanner.push(b) {
///         tokens.push(token);
///     }
/// }
/// assert_eq!(tokens.len(), 1);
/// assert_eq!(tokens[0].as_bytes(), b"PW011");
/// ```
#[derive(Debug, Default)]
pub struct TokenScanner {
    buf: [u8; MAX_TOKEN_LEN],
    len: u8,
    open: bool,
    overflow: bool,
}

impl TokenScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 喂入一个字节，若恰好凑齐一条令牌则返回
    pub fn push(&mut self, byte: u8) -> Option<Token> {
        match byte {
            b'[' => {
                // 无论当前处于什么状态，新的开括号都重启收集
                self.open = true;
                self.len = 0;
                self.overflow = false;
                None
            },
            b']' if self.open => {
                self.open = false;
                if self.overflow {
                    // 超长令牌整条丢弃
                    None
                } else {
                    Some(Token::from_slice(&self.buf[..self.len as usize]))
                }
            },
            _ if self.open => {
                if self.len as usize >= MAX_TOKEN_LEN {
                    self.overflow = true;
                } else {
                    self.buf[self.len as usize] = byte;
                    self.len += 1;
                }
                None
            },
            // 括号之外：噪声，直接丢弃
            _ => None,
        }
    }

    /// 丢弃收集到一半的令牌，回到初始状态
    pub fn reset(&mut self) {
        self.open = false;
        self.len = 0;
        self.overflow = false;
    }
}
