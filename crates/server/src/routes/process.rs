use actix_web::{http::StatusCode, post, web, HttpResponse};
use condense_common::CondenseError;
use condense_llm::{validate_ratio, ProcessingMode};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::state::AppState;
use crate::types::{ErrorResponse, ProcessForm};

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        error: message.into(),
    })
}

fn condense_error_response(e: &CondenseError) -> HttpResponse {
    let status =
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error_response(status, e.to_string())
}

fn parse_ratio(raw: Option<&str>) -> Option<f64> {
    let ratio = raw?.trim().parse::<f64>().ok()?;
    validate_ratio(ratio).ok().map(|_| ratio)
}

/// POST /process - condense a document or transcript
#[post("/process")]
pub async fn process(form: web::Form<ProcessForm>, state: web::Data<AppState>) -> HttpResponse {
    let form = form.into_inner();
    let text = form.text.unwrap_or_default();

    info!(
        "Received request: text length {}, ratio {:?}, mode {:?}",
        text.len(),
        form.ratio,
        form.mode
    );

    if text.trim().is_empty() {
        warn!("Validation failed: text is missing");
        return error_response(StatusCode::BAD_REQUEST, "Text field is missing");
    }

    let Some(ratio) = parse_ratio(form.ratio.as_deref()) else {
        warn!("Validation failed: invalid ratio {:?}", form.ratio);
        return error_response(StatusCode::BAD_REQUEST, "Invalid ratio value");
    };

    let mode = match form.mode.as_deref().unwrap_or("").parse::<ProcessingMode>() {
        Ok(mode) => mode,
        Err(_) => {
            warn!("Validation failed: invalid mode {:?}", form.mode);
            return error_response(StatusCode::BAD_REQUEST, "Invalid mode value");
        }
    };

    // Dropped with this future when the client goes away, stopping the workers
    let cancel = CancellationToken::new();
    let _cancel_on_disconnect = cancel.clone().drop_guard();

    match state
        .condenser
        .condense_with_deadline(&text, ratio, mode, &cancel, state.config.request_timeout)
        .await
    {
        Ok(report) => {
            info!(
                "{} processed: {} -> {} words ({:.1}% reduction) in {} ms",
                report.mode,
                report.input_words,
                report.output_words,
                report.reduction_percent(),
                report.elapsed_ms
            );
            HttpResponse::Ok()
                .content_type("text/plain; charset=utf-8")
                .body(report.text)
        }
        Err(e) => {
            error!("{} processing failed: {}", mode, e);
            condense_error_response(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test as actix_test, App};
    use async_trait::async_trait;
    use condense_common::{AppConfig, Result};
    use condense_llm::{Condenser, CondenserOptions, GenerateRequest, LlmClient};
    use std::time::Duration;

    /// Echoes a fixed reply for every prompt
    struct Echo(&'static str);

    #[async_trait]
    impl LlmClient for Echo {
        async fn generate(&self, _request: GenerateRequest, cancel: &CancellationToken) -> Result<String> {
            if cancel.is_cancelled() {
                return Err(CondenseError::cancelled("cancelled"));
            }
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl LlmClient for Failing {
        async fn generate(&self, _request: GenerateRequest, _cancel: &CancellationToken) -> Result<String> {
            Err(CondenseError::llm("API returned 500"))
        }
    }

    struct Stalling;

    #[async_trait]
    impl LlmClient for Stalling {
        async fn generate(&self, _request: GenerateRequest, cancel: &CancellationToken) -> Result<String> {
            tokio::select! {
                _ = cancel.cancelled() => Err(CondenseError::cancelled("deadline")),
                _ = tokio::time::sleep(Duration::from_secs(30)) => Ok("too late".to_string()),
            }
        }
    }

    fn state_with(client: impl LlmClient + 'static, request_timeout: Duration) -> web::Data<AppState> {
        let config = AppConfig {
            request_timeout,
            ..AppConfig::default()
        };
        let options = CondenserOptions {
            chunk_size: 50,
            chunk_overlap: 5,
            max_concurrent: 2,
            ..CondenserOptions::default()
        };
        let condenser = Condenser::new(std::sync::Arc::new(client), options).unwrap();
        web::Data::new(AppState::with_condenser(config, condenser))
    }

    async fn post_form(state: web::Data<AppState>, form: &[(&str, &str)]) -> (StatusCode, String) {
        let app = actix_test::init_service(App::new().app_data(state).configure(crate::configure)).await;
        let req = actix_test::TestRequest::post()
            .uri("/process")
            .set_form(form)
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        let status = resp.status();
        let body = actix_test::read_body(resp).await;
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[actix_web::test]
    async fn test_validation_messages() {
        let timeout = Duration::from_secs(5);

        let (status, body) =
            post_form(state_with(Echo("x"), timeout), &[("ratio", "0.5")]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Text field is missing"));

        for ratio in ["abc", "0", "1.5", "-1"] {
            let (status, body) = post_form(
                state_with(Echo("x"), timeout),
                &[("text", "Hello."), ("ratio", ratio)],
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "ratio {}", ratio);
            assert!(body.contains("Invalid ratio value"));
        }

        let (status, body) = post_form(
            state_with(Echo("x"), timeout),
            &[("text", "Hello."), ("ratio", "0.5"), ("mode", "poem")],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Invalid mode value"));
    }

    #[actix_web::test]
    async fn test_document_defaults_when_mode_empty() {
        let (status, body) = post_form(
            state_with(Echo("Short version."), Duration::from_secs(5)),
            &[("text", "A long sentence here. Another one."), ("ratio", "0.3"), ("mode", "")],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Short version.");
    }

    #[actix_web::test]
    async fn test_transcript_mode() {
        let (status, body) = post_form(
            state_with(Echo("Alex: hi there"), Duration::from_secs(5)),
            &[("text", "Host: hi there everyone"), ("ratio", "1"), ("mode", "Transcript")],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "**Alex**: hi there");
    }

    #[actix_web::test]
    async fn test_all_segments_failing_is_server_error() {
        let (status, body) = post_form(
            state_with(Failing, Duration::from_secs(5)),
            &[("text", "Some text."), ("ratio", "0.5")],
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("\"error\""));
    }

    #[actix_web::test]
    async fn test_deadline_maps_to_gateway_timeout() {
        let (status, _) = post_form(
            state_with(Stalling, Duration::from_millis(50)),
            &[("text", "Some text."), ("ratio", "0.5")],
        )
        .await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_parse_ratio() {
        assert_eq!(parse_ratio(Some(" 0.25 ")), Some(0.25));
        assert_eq!(parse_ratio(Some("1")), Some(1.0));
        assert_eq!(parse_ratio(Some("NaN")), None);
        assert_eq!(parse_ratio(None), None);
    }
}
