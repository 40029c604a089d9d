//! 会话层错误类型定义

use thiserror::Error;
use trackside_hal::LinkError;

/// 会话层错误类型
#[derive(Error, Debug)]
pub enum SessionError {
    /// 主机链路错误
    #[error("Host link error: {0}")]
    Link(#[from] LinkError),

    /// 启动服务线程失败
    #[error("Failed to spawn service thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// 服务线程已退出，脉冲与查询无处投递
    #[error("Service thread stopped")]
    ServiceStopped,
}

#[cfg(test)]
mod tests {
    use super::SessionError;
    use trackside_hal::LinkError;

    /// 测试 SessionError 的 Display 实现
    #[test]
    fn test_error_display() {
        let err = SessionError::ServiceStopped;
        assert_eq!(err.to_string(), "Service thread stopped");

        let err = SessionError::from(LinkError::Closed);
        assert!(err.to_string().starts_with("Host link error"));

        let spawn_err = std::io::Error::new(std::io::ErrorKind::Other, "no threads");
        let err = SessionError::from(spawn_err);
        assert!(err.to_string().starts_with("Failed to spawn service thread"));
    }
}
