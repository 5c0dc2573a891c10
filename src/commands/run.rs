use tracing::info;

use crate::context::AppContext;
use crate::error::AppResult;
use crate::lock::InstanceLock;
use crate::triage::StartOutcome;

/// Runs the responder until Ctrl-C or until it halts on its own.
pub async fn run(ctx: &AppContext) -> AppResult<()> {
    let _lock = InstanceLock::acquire(&ctx.paths.lock_file(&ctx.profile))?;
    let responder = ctx.responder()?;

    if responder.start().await == StartOutcome::AlreadyRunning {
        return Ok(());
    }
    info!(profile = %ctx.profile, "press Ctrl-C to stop");

    tokio::select! {
        result = responder.wait() => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("interrupt received; finishing current cycle");
            responder.stop().await
        }
    }
}
