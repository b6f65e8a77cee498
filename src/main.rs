use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::{env, fs};

use chrono::Duration;
use log::{error, info};
use serde::Deserialize;
use thiserror::Error;

use portfolio_risk::markets::{AlphaVantageClient, CachedProvider, CsvReturnStore, ProviderError, ReturnSeriesProvider};
use portfolio_risk::{AnalysisRequest, RiskAnalyzer, RiskConfig, RiskError, RiskMetrics};

const USAGE: &str = "usage: portfolio-risk <request.toml>";

#[derive(Error, Debug)]
enum CliError {
    #[error("{0}")]
    Usage(&'static str),

    #[error("Could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid request file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Risk(#[from] RiskError),

    #[error("Could not render result: {0}")]
    Render(#[from] serde_json::Error),
}

/// Where return series are read from
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum SourceConfig {
    Csv {
        dir: PathBuf,
    },
    AlphaVantage {
        api_key: String,
        #[serde(default)]
        cache_ttl_hours: Option<i64>,
    },
}

/// Layout of the request file: the analysis request at the top level plus `[source]` and `[risk]` tables
#[derive(Debug, Deserialize)]
struct RequestFile {
    #[serde(flatten)]
    request: AnalysisRequest,
    source: SourceConfig,
    #[serde(default)]
    risk: RiskConfig,
}

impl RequestFile {
    fn load(path: &Path) -> Result<Self, CliError> {
        let raw = fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&raw)?)
    }
}

async fn analyze<P: ReturnSeriesProvider>(
    provider: P,
    request: &AnalysisRequest,
    config: RiskConfig,
) -> Result<RiskMetrics, CliError> {
    let analyzer = RiskAnalyzer::new(provider).with_config(config);
    Ok(analyzer.analyze(request).await?)
}

async fn run() -> Result<String, CliError> {
    let path = env::args().nth(1).map(PathBuf::from).ok_or(CliError::Usage(USAGE))?;
    let RequestFile { request, source, risk } = RequestFile::load(&path)?;

    let metrics = match source {
        SourceConfig::Csv { dir } => {
            info!("Reading return series from {}", dir.display());
            analyze(CsvReturnStore::new(dir), &request, risk).await?
        }
        SourceConfig::AlphaVantage { api_key, cache_ttl_hours } => {
            let client = AlphaVantageClient::new(api_key)?.with_min_data_points(risk.min_common_dates);
            let mut provider = CachedProvider::new(client);
            if let Some(hours) = cache_ttl_hours {
                provider = provider.with_ttl(Duration::hours(hours));
            }
            analyze(provider, &request, risk).await?
        }
    };

    for warning in metrics.warnings.iter() {
        info!("Substituted value: {}", warning);
    }

    Ok(serde_json::to_string_pretty(&metrics)?)
}

#[tokio::main]
async fn main() -> ExitCode {
    colog::init();

    match run().await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
