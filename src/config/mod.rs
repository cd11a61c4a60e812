use serde::Deserialize;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub api: ApiSettings,
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone)]
pub struct ApiSettings {
    /// Base URL of the ClinicLab booking/identity API, without a trailing
    /// slash (e.g. `http://localhost:8080/api`).
    pub base_url: String,
}

#[derive(Deserialize, Clone)]
pub struct ObservabilitySettings {
    /// OTLP collector endpoint; spans are exported only when set.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("config");

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
