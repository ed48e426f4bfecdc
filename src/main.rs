use std::error::Error;
use std::time::Duration;

use channel_history::config::{self, AppConfig, DATABASE_ENV_VAR};
use channel_history::storage::{self, CatchUp, OrderedStore, SqliteOrderedSet};
use channel_history::{CallContext, FROM_BEGINNING, Message, load_decoded_history, save_message};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "channel_history",
    version,
    about = "Post to and read back channel message history"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Abort each store call after this many milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Post a message to a channel
    Send {
        #[arg(long)]
        channel: String,
        text: String,
    },
    /// Print messages stamped at or after a timestamp
    History {
        #[arg(long)]
        channel: String,
        /// Nanosecond timestamp to read from (0 reads everything)
        #[arg(long, default_value_t = FROM_BEGINNING, allow_negative_numbers = true)]
        since: i64,
        /// Keep polling for new messages until Ctrl-C
        #[arg(long)]
        follow: bool,
    },
    /// Set the display name and user id used by `send`
    Identity {
        #[arg(long)]
        name: String,
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    // Khởi tạo Logger, mức log lấy từ RUST_LOG
    env_logger::init();

    let cli = Cli::parse();
    let mut app_config = config::load_config(&cli.config);
    app_config.apply_database_override(std::env::var(DATABASE_ENV_VAR).ok());
    let timeout = cli.timeout_ms.map(Duration::from_millis);

    if let Command::Identity { name, id } = cli.command {
        app_config.user_name = name;
        app_config.user_id = id;
        config::save_config(&cli.config, &app_config)?;
        log::info!("Saved identity to {}", cli.config);
        return Ok(());
    }

    storage::ensure_parent_dir(&app_config.database_path)?;
    let store = SqliteOrderedSet::with_path(&app_config.database_path)?;

    // Ctrl-C hủy mọi lệnh đang chờ store
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted, stopping");
            signal_token.cancel();
        }
    });
    let root = CallContext::with_token(shutdown);

    let result = match cli.command {
        Command::Send { channel, text } => {
            let message = Message::new(text, &app_config.user_name, &app_config.user_id, channel);
            save_message(&call_context(&root, timeout), &store, &message).await
        }
        Command::History {
            channel,
            since,
            follow: false,
        } => print_history(&call_context(&root, timeout), &store, &channel, since).await,
        Command::History {
            channel,
            since,
            follow: true,
        } => follow_channel(&root, timeout, &store, &app_config, channel, since).await,
        Command::Identity { .. } => Ok(()),
    };

    if let Err(err) = &result {
        log::error!("Command failed: {err}");
    }
    Ok(result?)
}

fn call_context(root: &CallContext, timeout: Option<Duration>) -> CallContext {
    let ctx = root.child();
    match timeout {
        Some(timeout) => ctx.with_timeout(timeout),
        None => ctx,
    }
}

fn print_message(message: &Message) {
    println!(
        "[{}] {}: {}",
        message.sent_at().format("%Y-%m-%d %H:%M:%S%.9f"),
        message.user_name,
        message.text
    );
}

async fn print_history(
    ctx: &CallContext,
    store: &dyn OrderedStore,
    channel: &str,
    since: i64,
) -> channel_history::Result<()> {
    let page = load_decoded_history(ctx, store, channel, since).await?;
    for message in &page.messages {
        print_message(message);
    }
    if page.skipped > 0 {
        log::warn!("{} records in {channel} could not be decoded", page.skipped);
    }
    if let (true, Some(last)) = (page.is_full_page(), page.last_timestamp()) {
        log::info!("More history available; continue with --since {last}");
    }
    Ok(())
}

async fn follow_channel(
    root: &CallContext,
    timeout: Option<Duration>,
    store: &dyn OrderedStore,
    app_config: &AppConfig,
    channel: String,
    since: i64,
) -> channel_history::Result<()> {
    let mut cursor = CatchUp::resume(channel, since);
    log::info!(
        "Following {} from {}",
        cursor.channel_id(),
        cursor.watermark()
    );

    loop {
        let page = match cursor.poll(&call_context(root, timeout), store).await {
            Ok(page) => page,
            Err(err) if err.is_cancellation() && root.is_cancelled() => return Ok(()),
            Err(err) => return Err(err),
        };
        for message in &page.messages {
            print_message(message);
        }
        // Còn trang đầy thì đọc tiếp ngay, không chờ
        if page.more_pending && !page.messages.is_empty() {
            continue;
        }

        tokio::select! {
            _ = root.token().cancelled() => return Ok(()),
            _ = tokio::time::sleep(app_config.poll_interval()) => {}
        }
    }
}
