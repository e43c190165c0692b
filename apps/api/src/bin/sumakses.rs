use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use sumakses_api::chat::ChatClient;
use sumakses_api::resume::{HttpAnalysisApi, ResumeAnalysisWorkflow, ResumeFile};

#[derive(Parser)]
#[command(name = "sumakses")]
#[command(about = "Resume analysis and career coaching from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a resume and wait for its tech-career compatibility report
    Analyze {
        path: PathBuf,

        #[arg(long, env = "RESUME_API_URL", default_value = "http://localhost:8080")]
        api_url: String,

        /// Defaults to the upload URL
        #[arg(long, env = "STATUS_API_URL")]
        status_url: Option<String>,
    },
    /// Chat with the SUMAKSES career coach
    Chat {
        #[arg(long, env = "CHAT_API_URL", default_value = "http://localhost:8080")]
        api_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Analyze {
            path,
            api_url,
            status_url,
        } => {
            let status_url = status_url.unwrap_or_else(|| api_url.clone());
            analyze(path, &api_url, &status_url).await
        }
        Command::Chat { api_url } => chat(&api_url).await,
    }
}

async fn analyze(path: PathBuf, api_url: &str, status_url: &str) -> Result<()> {
    let file = ResumeFile::from_path(&path)
        .await
        .with_context(|| format!("Could not read {}", path.display()))?;
    let api = HttpAnalysisApi::new(api_url, status_url)?;
    let workflow = ResumeAnalysisWorkflow::new(api);
    workflow.select_file(file)?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let mut updates = workflow.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let job = updates.borrow_and_update().clone();
            if job.status.is_running() {
                println!("[{:>3}%] {}", job.progress, job.status_message);
            }
        }
    });

    let outcome = workflow.run(&cancel).await;
    drop(workflow);
    printer.await.ok();

    let result = outcome?;
    println!();
    println!("Compatibility score: {:.0}/100", result.compatibility_score);
    println!("{}", result.compatibility_explanation);
    if !result.top_technical_skills_found.is_empty() {
        println!(
            "Technical skills found: {}",
            result.top_technical_skills_found.join(", ")
        );
    }
    if !result.suggested_keywords.is_empty() {
        println!("Suggested keywords: {}", result.suggested_keywords.join(", "));
    }
    Ok(())
}

async fn chat(api_url: &str) -> Result<()> {
    let mut client = ChatClient::new(api_url)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("SUMAKSES AI career coach. Type 'exit' to quit.");
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message.eq_ignore_ascii_case("exit") {
            break;
        }

        match client.send(message).await {
            Ok(reply) => println!("{reply}\n"),
            Err(e) => eprintln!("{e}\n"),
        }
    }

    let turns = client.history().len();
    if turns > 0 {
        println!("{turns} messages exchanged. Good luck!");
    }
    Ok(())
}
