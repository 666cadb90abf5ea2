use std::env;
use std::path::PathBuf;

use dotenv::dotenv;
use yuebot::supervisor::{default_bot_binary, Supervisor};
use yuebot::utils::Logger;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    // 第一个参数是机器人程序，其余参数原样转交
    let mut args = env::args().skip(1);
    let program = args
        .next()
        .map(PathBuf::from)
        .or_else(|| env::var("YUE_BOT_BIN").ok().map(PathBuf::from))
        .unwrap_or_else(default_bot_binary);

    let supervisor = Supervisor::new(program, args.collect());
    let code = match supervisor.run().await {
        Ok(code) => code,
        Err(e) => {
            Logger::log_operation_failure("Supervisor", &e.to_string());
            1
        }
    };

    std::process::exit(code);
}
