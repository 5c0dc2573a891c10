use crate::context::AppContext;
use crate::error::AppResult;
use crate::lock::InstanceLock;

pub async fn run(ctx: &AppContext) -> AppResult<()> {
    let _lock = InstanceLock::acquire(&ctx.paths.lock_file(&ctx.profile))?;
    let report = ctx.responder()?.run_once().await?;
    ctx.output.emit_report(&report)
}
