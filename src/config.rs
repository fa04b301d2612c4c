use crate::assistant::{AssistantSettings, Provider};
use crate::session::{RelaySettings, RunPolicy};
use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Require a bearer token on /analysis
    #[arg(long, env = "JWT_REQUIRED")]
    pub jwt_required: Option<bool>,

    /// HS256 secret used to verify bearer tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Assistant API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Service-account key file for the document store
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    pub credentials: Option<String>,

    /// Talk to a Firestore emulator instead of production
    #[arg(long, env = "FIRESTORE_EMULATOR_HOST")]
    pub firestore_emulator_host: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub assistant: AssistantConfig,
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Allowed CORS origins; `*` allows any.
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

#[derive(Deserialize, Clone)]
pub struct SecurityConfig {
    pub jwt_required: bool,
    pub jwt_secret: String,
    pub verify_thread_owner: bool,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_required", &self.jwt_required)
            .field("jwt_secret", &"<redacted>")
            .field("verify_thread_owner", &self.verify_thread_owner)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunPolicyKind {
    FireAndForget,
    AwaitCompletion,
}

#[derive(Deserialize, Clone)]
pub struct AssistantConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Azure `OpenAI` only.
    pub api_version: Option<String>,
    pub run_policy: RunPolicyKind,
    pub poll_interval_ms: u64,
    pub run_timeout_secs: u64,
    pub page_size: u32,
}

impl std::fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_version", &self.api_version)
            .field("run_policy", &self.run_policy)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("run_timeout_secs", &self.run_timeout_secs)
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreProvider {
    Firestore,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceConfig {
    pub provider: StoreProvider,
    pub credentials_path: String,
    /// Overrides the project of the credential file; required for the emulator.
    pub project_id: Option<String>,
    pub emulator_host: Option<String>,
    pub users_collection: String,
    pub thread_field: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("server.port", 8000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.cors_origins", vec!["*"])?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("security.jwt_required", true)?
            .set_default("security.jwt_secret", "")?
            .set_default("security.verify_thread_owner", true)?
            .set_default("assistant.base_url", "https://api.openai.com")?
            .set_default("assistant.run_policy", "fire_and_forget")?
            .set_default("assistant.poll_interval_ms", 500)?
            .set_default("assistant.run_timeout_secs", 25)?
            .set_default("assistant.page_size", 100)?
            .set_default("persistence.provider", "firestore")?
            .set_default("persistence.credentials_path", "serviceAccountKey.json")?
            .set_default("persistence.users_collection", "users")?
            .set_default("persistence.thread_field", "thread_id")?;

        // 2. Config file: explicit path, else ./config.yaml when present
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::new("config.yaml", FileFormat::Yaml).required(false)),
        };

        // 3. Environment variables prefixed with RELAY_, e.g. RELAY_SERVER__PORT=9000
        builder = builder.add_source(
            Environment::with_prefix("RELAY")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .try_parsing(true),
        );

        // 4. CLI flags (and their env fallbacks) win over everything
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(required) = cli.jwt_required {
            builder = builder.set_override("security.jwt_required", required)?;
        }
        if let Some(secret) = cli.jwt_secret {
            builder = builder.set_override("security.jwt_secret", secret)?;
        }
        if let Some(key) = cli.openai_api_key {
            builder = builder.set_override("assistant.api_key", key)?;
        }
        if let Some(path) = cli.credentials {
            builder = builder.set_override("persistence.credentials_path", path)?;
        }
        if let Some(host) = cli.firestore_emulator_host {
            builder = builder.set_override("persistence.emulator_host", host)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }

    /// Cross-field checks that serde cannot express.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.security.jwt_required && self.security.jwt_secret.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "security.jwt_secret must be set when security.jwt_required is true".to_string(),
            ));
        }
        if !(1..=100).contains(&self.assistant.page_size) {
            return Err(config::ConfigError::Message(
                "assistant.page_size must be between 1 and 100".to_string(),
            ));
        }
        if self.assistant.run_policy == RunPolicyKind::AwaitCompletion
            && self.assistant.poll_interval_ms == 0
        {
            return Err(config::ConfigError::Message(
                "assistant.poll_interval_ms must be positive".to_string(),
            ));
        }
        // The request timeout would otherwise cut the run wait short with a 408.
        if self.assistant.run_policy == RunPolicyKind::AwaitCompletion
            && self.assistant.run_timeout_secs >= self.server.request_timeout_secs
        {
            return Err(config::ConfigError::Message(
                "assistant.run_timeout_secs must be less than server.request_timeout_secs"
                    .to_string(),
            ));
        }
        if self.persistence.emulator_host.is_some() && self.persistence.project_id.is_none() {
            return Err(config::ConfigError::Message(
                "persistence.project_id is required with the Firestore emulator".to_string(),
            ));
        }
        Ok(())
    }

    pub fn assistant_settings(&self) -> AssistantSettings {
        let assistant = &self.assistant;
        AssistantSettings {
            base_url: assistant.base_url.clone(),
            api_key: assistant
                .api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
            provider: Provider::detect_from_url(
                &assistant.base_url,
                assistant.api_version.as_deref(),
            ),
            page_size: assistant.page_size,
        }
    }

    pub fn relay_settings(&self) -> RelaySettings {
        let run_policy = match self.assistant.run_policy {
            RunPolicyKind::FireAndForget => RunPolicy::FireAndForget,
            RunPolicyKind::AwaitCompletion => RunPolicy::AwaitCompletion {
                poll_interval: Duration::from_millis(self.assistant.poll_interval_ms),
                timeout: Duration::from_secs(self.assistant.run_timeout_secs),
            },
        };
        RelaySettings {
            users_collection: self.persistence.users_collection.clone(),
            thread_field: self.persistence.thread_field.clone(),
            verify_thread_owner: self.security.verify_thread_owner,
            run_policy,
        }
    }
}
