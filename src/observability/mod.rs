//! 可观测性：tracing 日志初始化
//!
//! 默认级别 info，RUST_LOG 可覆盖；日志写到 stderr，stdout 只留给对话内容。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
