use anyhow::Context;
use clap::Parser;
use ppp_pricing::config::toml_config::DEFAULT_PLAN;
use ppp_pricing::utils::{logger, validation::Validate};
use ppp_pricing::{app, AppConfig, RequestContext};

#[derive(Parser)]
#[command(name = "ppp-quote")]
#[command(about = "Show the PPP-adjusted price a visitor would be charged")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "ppp.toml")]
    config: String,

    /// Plan to quote
    #[arg(short, long, default_value = DEFAULT_PLAN)]
    plan: String,

    /// Client IP address
    #[arg(long)]
    ip: Option<String>,

    /// Country code from a trusted upstream header (skips geo-IP)
    #[arg(long)]
    country: Option<String>,

    /// Print the quote as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let config = AppConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config file '{}'", args.config))?;
    config.validate().context("invalid configuration")?;

    let store = app::open_store(&config)?;
    let service = app::pricing_service(&config, store)?;

    let ctx = RequestContext {
        client_ip: args.ip.clone(),
        trusted_country: args.country.clone(),
    };
    let quote = service.quote(&args.plan, &ctx).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&quote)?);
    } else {
        println!(
            "{} ({}): {} USD -> {} USD{}",
            quote.adjustment.country_name,
            quote.adjustment.country_code_iso2,
            quote.base_price,
            quote.adjustment.adjusted_price,
            if quote.adjustment.ppp_disabled {
                " [PPP disabled: proxy/VPN]"
            } else {
                ""
            }
        );
    }

    Ok(())
}
