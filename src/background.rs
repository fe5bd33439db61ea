use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use tokio::time::sleep;
use tracing::{error, info, info_span, Instrument};
use crate::state::AppState;
use crate::error::AppError;

/// Runs one maturity pass and returns how many commissions became payable.
pub async fn run_maturity_sweep(state: &AppState) -> Result<u64, AppError> {
    state.accrual().mature_commissions(Utc::now()).await
}

pub async fn start_background_worker(state: Arc<AppState>) {
    let interval = Duration::from_secs(state.config.maturity_sweep_secs.max(1));
    info!(interval_secs = interval.as_secs(), "Starting commission maturity worker...");

    loop {
        let span = info_span!("maturity_sweep", sweep_id = %uuid::Uuid::new_v4());
        async {
            match run_maturity_sweep(&state).await {
                Ok(0) => {}
                Ok(matured) => info!(matured, "Maturity sweep completed"),
                Err(e) => error!("Maturity sweep failed: {:?}", e),
            }
        }
            .instrument(span)
            .await;

        sleep(interval).await;
    }
}
