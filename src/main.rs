//! Mentor - 考试学习助手
//!
//! 入口：加载 .env 与配置、初始化日志、创建 Workflow。
//! 带参数时把参数拼成一条问题回答一次；否则进入交互式对话，quit / exit / bye / goodbye 退出。

use anyhow::Context;
use mentor::config::{load_config, AppConfig};
use mentor::{create_workflow, observability, Workflow};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const EXIT_WORDS: [&str; 4] = ["quit", "exit", "bye", "goodbye"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let conversation_id = std::env::var("MENTOR_CONVERSATION_ID")
        .ok()
        .filter(|id| !id.trim().is_empty());
    let mut workflow = create_workflow(&cfg, conversation_id).context("Failed to create workflow")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        let reply = workflow.chat(&args.join(" ")).await;
        println!("Mentor: {}", reply);
        return Ok(());
    }

    run_console(&mut workflow, &cfg).await
}

async fn run_console(workflow: &mut Workflow, cfg: &AppConfig) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    let banner = format!(
        "{}\n{}\nType 'quit', 'exit', 'bye' or 'goodbye' to leave.\n\n",
        cfg.app.name,
        "=".repeat(cfg.app.name.chars().count().max(20))
    );
    stdout.write_all(banner.as_bytes()).await?;

    let greeting = workflow.greeting().await;
    stdout.write_all(format!("Mentor: {}\n\n", greeting).as_bytes()).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"You: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&input.to_lowercase().as_str()) {
            break;
        }

        let reply = workflow.chat(input).await;
        stdout.write_all(format!("\nMentor: {}\n\n", reply).as_bytes()).await?;
    }

    stdout.write_all(format!("\n{}\n", cfg.app.farewell).as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}
