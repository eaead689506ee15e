use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "singlingo", version, about = "Sing along with lyrics that fade as you learn them")]
pub struct Config {
    /// Song to open on startup.
    #[arg(long)]
    pub song: Option<String>,

    /// Print the catalog and exit.
    #[arg(long, default_value_t = false)]
    pub list: bool,

    /// Directory for settings and the exposure database.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Record exposure under this viewer instead of the configured one.
    #[arg(long)]
    pub viewer: Option<String>,

    /// JSON catalog replacing the bundled songs.
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Base directory for relative audio paths.
    #[arg(long)]
    pub assets_dir: Option<PathBuf>,

    /// Keep exposure counts in memory only.
    #[arg(long, default_value_t = false)]
    pub offline: bool,
}

impl Config {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("singlingo")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let config = Config::parse_from([
            "singlingo",
            "--song",
            "kalinka",
            "--viewer",
            "learner-7",
            "--data-dir",
            "/tmp/sl",
            "--offline",
        ]);
        assert_eq!(config.song.as_deref(), Some("kalinka"));
        assert_eq!(config.viewer.as_deref(), Some("learner-7"));
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/sl"));
        assert!(config.offline);
        assert!(!config.list);
    }
}
