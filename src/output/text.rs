use crate::error::AppResult;
use crate::triage::CycleReport;

pub fn print_line(line: &str) -> AppResult<()> {
    println!("{line}");
    Ok(())
}

pub fn print_report(report: &CycleReport) -> AppResult<()> {
    println!("{}", report.summary());
    if report.remarked > 0 {
        println!("labeled {} previously replied message(s)", report.remarked);
    }
    for id in &report.still_in_inbox {
        println!("  {id}: labeled, still in inbox");
    }
    for failure in &report.failures {
        let sent = if failure.reply_sent { " (reply sent)" } else { "" };
        println!(
            "  {}: {:?} failed{sent}: {}",
            failure.message_id, failure.stage, failure.reason
        );
    }
    Ok(())
}
