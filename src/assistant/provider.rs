//! Provider-specific URL and authentication handling.
//!
//! `OpenAI` and Azure `OpenAI` both expose the Assistants thread API, but with
//! different path prefixes, versioning and auth headers.

/// Supported assistant API providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// Azure `OpenAI` Service
    AzureOpenAI {
        /// API version (e.g., "2024-05-01-preview")
        api_version: String,
    },
    /// Generic OpenAI-compatible provider
    Generic,
}

/// Default Azure API version with Assistants v2 support.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-05-01-preview";

impl Provider {
    /// Detect provider from base URL.
    ///
    /// # Example
    ///
    /// ```rust
    /// use analysis_relay::assistant::Provider;
    ///
    /// let provider = Provider::detect_from_url("https://api.openai.com", None);
    /// assert_eq!(provider, Provider::OpenAI);
    /// ```
    #[must_use]
    pub fn detect_from_url(base_url: &str, api_version: Option<&str>) -> Self {
        let lower = base_url.to_lowercase();

        if lower.contains("openai.azure.com") || lower.contains("azure.com") {
            Self::AzureOpenAI {
                api_version: api_version
                    .unwrap_or(DEFAULT_AZURE_API_VERSION)
                    .to_string(),
            }
        } else if lower.contains("openai.com") {
            Self::OpenAI
        } else {
            Self::Generic
        }
    }

    /// Build the URL for an Assistants API resource path (e.g. `/threads`).
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL (trailing slash tolerated)
    /// * `path` - Resource path starting with `/`
    #[must_use]
    pub fn build_url(&self, base_url: &str, path: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match self {
            Self::AzureOpenAI { api_version } => {
                format!("{base}/openai{path}?api-version={api_version}")
            }
            Self::OpenAI | Self::Generic => format!("{base}/v1{path}"),
        }
    }

    /// Whether the key travels in an `api-key` header instead of bearer auth.
    #[must_use]
    pub fn uses_api_key_header(&self) -> bool {
        matches!(self, Self::AzureOpenAI { .. })
    }
}
