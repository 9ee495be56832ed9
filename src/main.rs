use clap::Parser;
use ppp_pricing::utils::error::{ErrorSeverity, PppError};
use ppp_pricing::utils::{logger, validation::Validate};
use ppp_pricing::{app, CliConfig};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting ppp-import");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    match run(&cli).await {
        Ok(()) => {}
        Err(e) => {
            tracing::error!(
                "❌ PPP import failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            // 匯入失敗一律非零結束
            let exit_code = match e.severity() {
                ErrorSeverity::Low | ErrorSeverity::High => 1,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::Critical => 3,
            };
            std::process::exit(exit_code);
        }
    }
}

async fn run(cli: &CliConfig) -> Result<(), PppError> {
    let config = cli.resolve()?;
    config.validate()?;
    tracing::info!("✅ Configuration loaded and validated");

    let store = app::open_store(&config)?;
    let importer = app::importer(&config, store);

    let report = if cli.dry_run {
        importer.dry_run(&config.import.csv_path).await?
    } else {
        importer.run(&config.import.csv_path).await?
    };

    if report.dry_run {
        println!(
            "🔍 Dry run: {} records would be imported from {} ({} rows read, {} malformed cells)",
            report.records_processed,
            report.csv_path,
            report.stats.rows_read,
            report.stats.malformed_cells
        );
    } else {
        println!(
            "✅ Success! Processed and saved {} records.",
            report.records_processed
        );
        println!("📁 Dataset now holds {} countries", report.dataset_size);
    }

    Ok(())
}
