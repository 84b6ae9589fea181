use clap::Args;
use loan_portal::config::{AppConfig, PredictorConfig};
use loan_portal::error::AppError;
use loan_portal::portal::{
    ApplicantFeatures, DecisionSnapshot, HttpRiskPredictor, LoanStatus, PredictionOutcome,
    RiskPredictor,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct PredictArgs {
    /// JSON file holding the applicant feature set
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Override the configured prediction service base URL
    #[arg(long)]
    pub(crate) predictor_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictionReport<'a> {
    #[serde(flatten)]
    decision: &'a DecisionSnapshot,
    initial_status: LoanStatus,
    recommendation: String,
    feature_importance: &'a BTreeMap<String, f64>,
}

pub(crate) async fn run_predict(args: PredictArgs) -> Result<(), AppError> {
    let raw = tokio::fs::read_to_string(&args.input).await?;
    let features: ApplicantFeatures = serde_json::from_str(&raw)?;

    let mut predictor_config: PredictorConfig = AppConfig::load()?.predictor;
    if let Some(url) = args.predictor_url {
        predictor_config.base_url = url;
    }

    let predictor = HttpRiskPredictor::new(&predictor_config)?;
    let outcome = predictor.predict(&features).await?;
    println!("{}", render_prediction(&outcome)?);
    Ok(())
}

pub(crate) fn render_prediction(outcome: &PredictionOutcome) -> Result<String, AppError> {
    let decision = DecisionSnapshot::from_prediction(outcome);
    let report = PredictionReport {
        decision: &decision,
        initial_status: decision.initial_status(),
        recommendation: outcome.analysis.recommendation(),
        feature_importance: &outcome.prediction.feature_importance,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}
