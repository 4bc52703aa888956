// Timestamped status lines for user-facing output
use chrono::Local;
use colored::Colorize;

pub const BANNER: &str = r#"
    ██████╗ ██████╗  ██████╗██████╗ ██╗   ██╗██████╗ ████████╗██████╗ ██╗  ██╗
    ██╔══██╗╚════██╗██╔════╝██╔══██╗╚██╗ ██╔╝██╔══██╗╚══██╔══╝╚════██╗╚██╗██╔╝
    ██║  ██║ █████╔╝██║     ██████╔╝ ╚████╔╝ ██████╔╝   ██║    █████╔╝ ╚███╔╝
    ██║  ██║ ╚═══██╗██║     ██╔══██╗  ╚██╔╝  ██╔═══╝    ██║    ╚═══██╗ ██╔██╗
    ██████╔╝██████╔╝╚██████╗██║  ██║   ██║   ██║        ██║   ██████╔╝██╔╝ ██╗
    ╚═════╝ ╚═════╝  ╚═════╝╚═╝  ╚═╝   ╚═╝   ╚═╝        ╚═╝   ╚═════╝ ╚═╝  ╚═╝
"#;

/// Print a status line prefixed with a local timestamp.
pub fn status(message: &str) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    println!("{} {}", format!("[{}]", timestamp).dimmed(), message);
}

/// Like [`status`], but only when verbose output is enabled.
pub fn status_detail(verbose: bool, message: &str) {
    if verbose {
        status(message);
    }
}
