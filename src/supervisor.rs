use std::env;
use std::path::PathBuf;
use std::process::Stdio;

use log::{info, warn};
use tokio::process::Command;

use crate::error::{Result, RELOAD_EXIT_CODE};
use crate::utils::Logger;

pub const BOT_BINARY: &str = "yuebot";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Restart,
    Exit(i32),
}

/// 退出码为 2 时重启，其余情况结束监督；被信号杀死视为 1
pub fn decide(code: Option<i32>) -> Decision {
    match code {
        Some(RELOAD_EXIT_CODE) => Decision::Restart,
        Some(code) => Decision::Exit(code),
        None => Decision::Exit(1),
    }
}

/// 与监督进程同目录的机器人可执行文件
pub fn default_bot_binary() -> PathBuf {
    let name = format!("{BOT_BINARY}{}", env::consts::EXE_SUFFIX);
    env::current_exe()
        .map(|exe| exe.with_file_name(&name))
        .unwrap_or_else(|_| PathBuf::from(name))
}

pub struct Supervisor {
    program: PathBuf,
    args: Vec<String>,
}

impl Supervisor {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }

    /// 反复拉起子进程直到它以非重载退出码结束，返回该退出码
    pub async fn run(&self) -> Result<i32> {
        let mut restarts = 0u32;

        loop {
            Logger::log_operation_start("Supervisor", &format!("launching {}", self.program.display()));

            let mut command = Command::new(&self.program);
            command
                .args(&self.args)
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());

            let status = command.status().await?;

            match decide(status.code()) {
                Decision::Restart => {
                    restarts += 1;
                    info!("🔄 Reload requested, restarting bot (restart #{restarts})");
                }
                Decision::Exit(code) => {
                    if code != 0 {
                        warn!("Bot exited with code {code}, supervision ends");
                    }
                    return Ok(code);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide() {
        assert_eq!(decide(Some(2)), Decision::Restart);
        assert_eq!(decide(Some(0)), Decision::Exit(0));
        assert_eq!(decide(Some(1)), Decision::Exit(1));
        assert_eq!(decide(None), Decision::Exit(1));
    }

    #[test]
    fn test_default_bot_binary_name() {
        let path = default_bot_binary();
        let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file_name.starts_with(BOT_BINARY));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_restarts_until_non_reload_code() {
        let dir = tempfile::tempdir().unwrap();
        let counter = dir.path().join("runs");
        let script = format!(
            "n=$(cat {c} 2>/dev/null || echo 0); n=$((n+1)); echo $n > {c}; \
             if [ $n -lt 3 ]; then exit 2; fi; exit 5",
            c = counter.display()
        );

        let supervisor = Supervisor::new(PathBuf::from("sh"), vec!["-c".to_string(), script]);
        let code = supervisor.run().await.unwrap();

        assert_eq!(code, 5);
        assert_eq!(std::fs::read_to_string(&counter).unwrap().trim(), "3");
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let supervisor = Supervisor::new(PathBuf::from("/definitely/not/a/bot"), vec![]);
        assert!(supervisor.run().await.is_err());
    }
}
