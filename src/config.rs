use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, read from flags or the matching environment variables.
#[derive(Debug, Clone, Parser)]
#[command(name = "lesion-server", about = "Skin-lesion classification service")]
pub struct Config {
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Number of HTTP workers; actix picks one per core when unset.
    #[arg(long, env = "WORKERS")]
    pub workers: Option<usize>,

    /// ONNX classifier to load at startup. Without it the placeholder model serves.
    #[arg(long, env = "MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Refuse to fall back to the placeholder when the model fails to load.
    #[arg(long, env = "STRICT_MODEL")]
    pub strict_model: bool,

    /// CORS origins. Any origin is allowed when none are given.
    #[arg(long = "allowed-origin", env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    #[arg(long, env = "MAX_IMAGE_DIMENSION", default_value_t = 8192)]
    pub max_image_dimension: u32,

    #[arg(long, env = "INFERENCE_TIMEOUT_SECS", default_value_t = 30)]
    pub inference_timeout_secs: u64,

    /// Cells per side of the occlusion grid used for heatmaps.
    #[arg(long, env = "OCCLUSION_GRID", default_value_t = 8,
          value_parser = clap::value_parser!(u32).range(1..=224))]
    pub occlusion_grid: u32,
}

impl Config {
    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
            model_path: None,
            strict_model: false,
            allowed_origins: Vec::new(),
            max_upload_bytes: 10 * 1024 * 1024,
            max_image_dimension: 8192,
            inference_timeout_secs: 30,
            occlusion_grid: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_parser_defaults() {
        let parsed = Config::try_parse_from(["lesion-server"]).unwrap();
        let defaults = Config::default();

        assert_eq!(parsed.port, defaults.port);
        assert_eq!(parsed.max_upload_bytes, defaults.max_upload_bytes);
        assert_eq!(parsed.occlusion_grid, defaults.occlusion_grid);
        assert!(parsed.model_path.is_none());
        assert!(!parsed.strict_model);
    }

    #[test]
    fn origins_split_on_commas() {
        let parsed = Config::try_parse_from([
            "lesion-server",
            "--allowed-origin",
            "http://localhost:3000,https://derm.example",
        ])
        .unwrap();

        assert_eq!(
            parsed.allowed_origins,
            vec!["http://localhost:3000", "https://derm.example"]
        );
    }

    #[test]
    fn occlusion_grid_is_bounded() {
        assert!(Config::try_parse_from(["lesion-server", "--occlusion-grid", "0"]).is_err());
    }
}
