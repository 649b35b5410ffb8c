use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use promo_checkout::utils::logger;
use promo_checkout::{ApiResponse, CheckoutError, CheckoutService, LambdaConfig};
use std::sync::Arc;

type Service = Arc<Result<CheckoutService, CheckoutError>>;

async fn function_handler(service: Service, event: LambdaEvent<serde_json::Value>) -> Result<ApiResponse, Error> {
    let request_id = event.context.request_id.clone();
    tracing::info!(request_id = %request_id, "Handling checkout API event");

    let response = match service.as_ref() {
        Ok(service) => service.handle_event(event.payload).await,
        Err(e) => {
            // 冷啟動時配置錯誤: 每個請求都回報 misconfigured
            tracing::error!("❌ Service unavailable, configuration failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            ApiResponse::from_error(e)
        }
    };

    tracing::info!(request_id = %request_id, status = response.status, "Event handled");
    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();

    let service: Service = Arc::new(LambdaConfig::from_env().and_then(|config| config.build_service()));
    if service.is_ok() {
        tracing::info!("✅ Checkout service initialised");
    }

    run(service_fn(move |event| function_handler(service.clone(), event))).await
}
