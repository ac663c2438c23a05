//! Decryption relayer
//!
//! Background task that plays the external service's role for
//! [`LocalFheService`]: it drains queued decryption requests, decrypts them and
//! delivers the signed result to the ledger's callback boundary. Delivery
//! failures are logged and dropped; the ledger is unchanged by a rejected
//! callback.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::callback::CallbackOutcome;
use crate::crypto::{DecryptionRequest, LocalFheService};
use crate::ledger::Ledger;

/// Run until the request queue closes
pub async fn run(
    mut requests: mpsc::UnboundedReceiver<DecryptionRequest>,
    service: Arc<LocalFheService>,
    ledger: Arc<Ledger>,
) {
    info!("Decryption relayer started");

    while let Some(request) = requests.recv().await {
        debug!(
            "Relaying request {} ({} handles, {} callback)",
            request.request_id,
            request.handles.len(),
            request.callback
        );

        let response = match service.fulfil(&request) {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to decrypt request {}: {}", request.request_id, e);
                continue;
            }
        };

        match ledger
            .on_decrypted(response.request_id, &response.cleartexts, &response.proof)
            .await
        {
            Ok(CallbackOutcome::ArticleAnalyzed { article_id, .. }) => {
                debug!("Request {} analyzed article {}", request.request_id, article_id);
            }
            Ok(CallbackOutcome::CountDecrypted { category, count }) => {
                debug!("Request {} decrypted '{}' = {}", request.request_id, category, count);
            }
            Err(e) => {
                warn!("Callback for request {} rejected: {}", request.request_id, e);
            }
        }
    }

    info!("Decryption relayer stopped");
}
