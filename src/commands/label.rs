use serde::Serialize;

use crate::cli::LabelCommand;
use crate::context::AppContext;
use crate::error::AppResult;

#[derive(Debug, Serialize)]
struct EnsuredLabel<'a> {
    name: &'a str,
    id: String,
}

pub async fn run(ctx: &AppContext, command: LabelCommand) -> AppResult<()> {
    match command {
        LabelCommand::Ensure => {
            let responder = ctx.responder()?;
            let name = responder.config().label_name.as_str();
            let id = responder.ensure_label().await?;

            let text = format!("label `{name}` ready (id: {id})");
            ctx.output.emit(&text, &EnsuredLabel { name, id: id.clone() })
        }
    }
}
