use std::time::Duration;

use tracing::{debug, warn};

use crate::config::PredictorConfig;

use super::{ApplicantFeatures, PredictionEnvelope, PredictionOutcome, PredictorError, RiskPredictor};

const MAX_ERROR_BODY: usize = 512;

/// Forwards feature sets to `POST {base_url}/api/predict`.
#[derive(Debug, Clone)]
pub struct HttpRiskPredictor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRiskPredictor {
    pub fn new(config: &PredictorConfig) -> Result<Self, PredictorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|err| PredictorError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: predict_endpoint(&config.base_url),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl RiskPredictor for HttpRiskPredictor {
    async fn predict(
        &self,
        features: &ApplicantFeatures,
    ) -> Result<PredictionOutcome, PredictorError> {
        debug!(endpoint = %self.endpoint, "forwarding applicant features");

        let response = self
            .client
            .post(&self.endpoint)
            .json(features)
            .send()
            .await
            .map_err(|err| PredictorError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = clip(response.text().await.unwrap_or_default());
            warn!(status = status.as_u16(), "prediction service returned an error");
            return Err(PredictorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope = response
            .json::<PredictionEnvelope>()
            .await
            .map_err(|err| PredictorError::Decode(err.to_string()))?;
        envelope.into_outcome()
    }
}

fn clip(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

fn predict_endpoint(base_url: &str) -> String {
    format!("{}/api/predict", base_url.trim().trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        assert_eq!(
            predict_endpoint("http://localhost:8000/"),
            "http://localhost:8000/api/predict"
        );
        assert_eq!(
            predict_endpoint("http://ml.internal"),
            "http://ml.internal/api/predict"
        );
    }
}
