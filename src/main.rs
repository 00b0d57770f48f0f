use clap::Parser;
use mercari_recommender::app::recommend_tool::{
    recommend_for, run_recommendation_tool, serialize_products,
};
use mercari_recommender::utils::error::{ErrorSeverity, RecommendError};
use mercari_recommender::utils::{logger, validation::Validate};
use mercari_recommender::{CliConfig, MercariClient, TomlConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliConfig::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting mercari-recommender CLI");
    if args.verbose {
        tracing::debug!("CLI config: {:?}", args);
    }

    if let Err(e) = args.validate() {
        exit_with(&e);
    }

    // 載入 TOML 配置，未指定時使用預設值
    let config = match &args.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            TomlConfig::from_file(path).unwrap_or_else(|e| exit_with(&e))
        }
        None => TomlConfig::default(),
    };
    if let Err(e) = config.validate() {
        exit_with(&e);
    }

    let client = MercariClient::new(config.client_config()).unwrap_or_else(|e| exit_with(&e));

    let outcome = match &args.tool_args {
        Some(arguments) => {
            run_recommendation_tool(&client, config.recommender_config(), arguments, &args.context)
                .await
        }
        None => recommend_for(
            &client,
            config.recommender_config(),
            &args.candidates(),
            &args.context_text(),
        )
        .await
        .and_then(serialize_products),
    };

    match outcome {
        Ok(value) => {
            let count = value.as_array().map_or(0, Vec::len);
            tracing::info!("✅ Found {} recommended items", count);
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Err(e) => exit_with(&e),
    }

    Ok(())
}

fn exit_with(e: &RecommendError) -> ! {
    tracing::error!(
        "❌ Recommendation failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
