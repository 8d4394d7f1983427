use super::Parser;

#[derive(Parser, Debug)]
#[command(about = "Join-gate verification bot")]
pub struct Cli {
    /// Path to a settings file overriding the build-profile default.
    #[arg(long)]
    pub settings: Option<String>,
}
