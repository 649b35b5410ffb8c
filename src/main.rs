use anyhow::Context;
use clap::Parser;
use promo_checkout::config::cli::load_order_request;
use promo_checkout::utils::error::{CheckoutError, ErrorSeverity};
use promo_checkout::utils::{logger, validation::Validate};
use promo_checkout::{AppConfig, CheckoutService, CliConfig, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);

    tracing::info!("🚀 Starting promo-checkout CLI");
    tracing::info!("📁 Loading configuration from: {}", cli.config.display());

    let config = match AppConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config.display(), e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let service = match config.build_service() {
        Ok(service) => service,
        Err(e) => exit_with(&e),
    };
    tracing::info!("✅ Configuration loaded and validated successfully");

    let output = match run(&service, cli.command).await {
        Ok(output) => output,
        Err(e) => exit_with(&e),
    };

    let rendered = serde_json::to_string_pretty(&output).context("rendering command output")?;
    println!("{}", rendered);
    Ok(())
}

async fn run(service: &CheckoutService, command: Command) -> promo_checkout::Result<serde_json::Value> {
    match command {
        Command::Validate => {
            let catalog = service.dispatcher().reservations().catalog();
            Ok(serde_json::json!({
                "ok": true,
                "codes": catalog.definitions().map(|d| d.code.clone()).collect::<Vec<_>>(),
            }))
        }
        Command::Seed => {
            let report = service.seed().await?;
            tracing::info!("🌱 Seeded {} promo counters", report.seeded.len());
            Ok(serde_json::to_value(report)?)
        }
        Command::Balance { code } => {
            let left = service.balance(&code).await?;
            Ok(serde_json::json!({"code": code, "left": left}))
        }
        Command::Apply { code } => {
            let quote = service.apply_promo(Some(&code)).await?;
            Ok(serde_json::to_value(quote)?)
        }
        Command::Checkout { order_file, promo } => {
            let request = load_order_request(&order_file, promo.as_deref())?;
            let confirmation = service.checkout(request).await?;
            tracing::info!("✅ Order {} dispatched", confirmation.order_id);
            Ok(serde_json::to_value(confirmation)?)
        }
    }
}

fn exit_with(e: &CheckoutError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 4,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
