use std::collections::HashMap;
use std::env;

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const QDRANT_API_KEY: &str = "QDRANT_API_KEY";
pub const QDRANT_URL: &str = "QDRANT_URL";

/// Privileged configuration source consulted before anything the user types.
pub trait SecretSource: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
}

/// Process environment, populated from `.env` by `dotenvy` at startup.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecrets;

impl SecretSource for EnvSecrets {
    fn get(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

#[derive(Debug, Default, Clone)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl SecretSource for StaticSecrets {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// Resolves credentials from the secret source first, then from interactive
/// input, then from profile defaults. Blank values count as absent.
pub struct CredentialResolver {
    secrets: Box<dyn SecretSource>,
    interactive: HashMap<String, String>,
    defaults: StaticSecrets,
}

impl CredentialResolver {
    pub fn new(secrets: impl SecretSource + 'static) -> Self {
        Self {
            secrets: Box::new(secrets),
            interactive: HashMap::new(),
            defaults: StaticSecrets::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: StaticSecrets) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn set_interactive(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            self.interactive.remove(name);
        } else {
            self.interactive.insert(name.to_string(), value);
        }
    }

    pub fn resolve(&self, name: &str) -> Option<String> {
        non_blank(self.secrets.get(name))
            .or_else(|| non_blank(self.interactive.get(name).cloned()))
            .or_else(|| non_blank(self.defaults.get(name)))
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            openai_api_key: self.resolve(OPENAI_API_KEY),
            qdrant_api_key: self.resolve(QDRANT_API_KEY),
            qdrant_url: self.resolve(QDRANT_URL),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Clone, Default)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub qdrant_api_key: Option<String>,
    pub qdrant_url: Option<String>,
}

impl Credentials {
    pub fn complete(&self) -> Option<CompleteCredentials> {
        Some(CompleteCredentials {
            openai_api_key: self.openai_api_key.clone()?,
            qdrant_api_key: self.qdrant_api_key.clone()?,
            qdrant_url: self.qdrant_url.clone()?,
        })
    }

    pub fn missing(&self) -> Vec<&'static str> {
        [
            (OPENAI_API_KEY, self.openai_api_key.is_none()),
            (QDRANT_API_KEY, self.qdrant_api_key.is_none()),
            (QDRANT_URL, self.qdrant_url.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect()
    }
}

// Keys never reach logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "***"))
            .field("qdrant_api_key", &self.qdrant_api_key.as_ref().map(|_| "***"))
            .field("qdrant_url", &self.qdrant_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct CompleteCredentials {
    pub openai_api_key: String,
    pub qdrant_api_key: String,
    pub qdrant_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    #[default]
    Cloud,
    /// Ollama's OpenAI-compatible endpoint plus a local Qdrant node.
    Local,
}

impl Profile {
    pub fn default_secrets(self) -> StaticSecrets {
        match self {
            Profile::Cloud => StaticSecrets::default(),
            Profile::Local => StaticSecrets::new([
                (OPENAI_API_KEY, "ollama"),
                (QDRANT_API_KEY, "local"),
                (QDRANT_URL, "http://localhost:6333"),
            ]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub collection: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub vector_dim: usize,
    pub llm_base_url: Option<String>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub search_limit: usize,
    pub http_timeout_ms: u64,
    pub web_search_enabled: bool,
}

impl Settings {
    const COLLECTION_VARS: [&'static str; 2] = ["LEGAL_COLLECTION", "QDRANT_COLLECTION"];
    const CHAT_MODEL_VARS: [&'static str; 2] = ["LEGAL_CHAT_MODEL", "OPENAI_MODEL"];
    const EMBEDDING_MODEL_VARS: [&'static str; 2] =
        ["LEGAL_EMBEDDING_MODEL", "OPENAI_EMBEDDING_MODEL"];
    const VECTOR_DIM_VARS: [&'static str; 1] = ["LEGAL_VECTOR_DIM"];
    const BASE_URL_VARS: [&'static str; 2] = ["LEGAL_LLM_BASE_URL", "OPENAI_BASE_URL"];
    const CHUNK_SIZE_VARS: [&'static str; 1] = ["LEGAL_CHUNK_SIZE"];
    const CHUNK_OVERLAP_VARS: [&'static str; 1] = ["LEGAL_CHUNK_OVERLAP"];
    const SEARCH_LIMIT_VARS: [&'static str; 1] = ["LEGAL_SEARCH_LIMIT"];
    const TIMEOUT_VARS: [&'static str; 1] = ["QDRANT_HTTP_TIMEOUT_MS"];
    const WEB_SEARCH_VARS: [&'static str; 1] = ["LEGAL_WEB_SEARCH"];

    pub fn defaults(profile: Profile) -> Self {
        match profile {
            Profile::Cloud => Self {
                collection: "legal_documents".to_string(),
                chat_model: "gpt-5".to_string(),
                embedding_model: "text-embedding-3-small".to_string(),
                vector_dim: 1536,
                llm_base_url: None,
                chunk_size: 1000,
                chunk_overlap: 200,
                search_limit: 5,
                http_timeout_ms: 10_000,
                web_search_enabled: true,
            },
            Profile::Local => Self {
                collection: "legal_knowledge".to_string(),
                chat_model: "llama3.1:8b".to_string(),
                embedding_model: "openhermes".to_string(),
                vector_dim: 4096,
                llm_base_url: Some("http://localhost:11434/v1".to_string()),
                ..Self::defaults(Profile::Cloud)
            },
        }
    }

    pub fn from_env(profile: Profile) -> Self {
        Self::from_lookup(profile, |key| env::var(key).ok())
    }

    pub fn from_lookup(profile: Profile, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |candidates: &[&'static str]| candidates.iter().find_map(|key| lookup(key));
        let defaults = Self::defaults(profile);

        let chunk_size = read(&Self::CHUNK_SIZE_VARS)
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.chunk_size);
        let chunk_overlap = read(&Self::CHUNK_OVERLAP_VARS)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.chunk_overlap)
            .min(chunk_size.saturating_sub(1));

        Self {
            collection: read(&Self::COLLECTION_VARS).unwrap_or(defaults.collection),
            chat_model: read(&Self::CHAT_MODEL_VARS).unwrap_or(defaults.chat_model),
            embedding_model: read(&Self::EMBEDDING_MODEL_VARS)
                .unwrap_or(defaults.embedding_model),
            vector_dim: read(&Self::VECTOR_DIM_VARS)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.vector_dim),
            llm_base_url: read(&Self::BASE_URL_VARS).or(defaults.llm_base_url),
            chunk_size,
            chunk_overlap,
            search_limit: read(&Self::SEARCH_LIMIT_VARS)
                .and_then(|v| v.parse::<usize>().ok())
                .map(|v| v.clamp(1, 50))
                .unwrap_or(defaults.search_limit),
            http_timeout_ms: read(&Self::TIMEOUT_VARS)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_timeout_ms),
            web_search_enabled: read(&Self::WEB_SEARCH_VARS)
                .map(|v| !(v == "0" || v.eq_ignore_ascii_case("false")))
                .unwrap_or(defaults.web_search_enabled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_source_wins_over_interactive_input() {
        let mut resolver =
            CredentialResolver::new(StaticSecrets::new([(OPENAI_API_KEY, "sk-secret")]));
        resolver.set_interactive(OPENAI_API_KEY, "sk-typed");
        resolver.set_interactive(QDRANT_URL, "http://typed:6333");

        assert_eq!(resolver.resolve(OPENAI_API_KEY).as_deref(), Some("sk-secret"));
        assert_eq!(resolver.resolve(QDRANT_URL).as_deref(), Some("http://typed:6333"));
        assert_eq!(resolver.resolve(QDRANT_API_KEY), None);
    }

    #[test]
    fn blank_values_count_as_absent() {
        let mut resolver = CredentialResolver::new(StaticSecrets::new([(QDRANT_API_KEY, "  ")]));
        resolver.set_interactive(QDRANT_API_KEY, "");
        assert_eq!(resolver.resolve(QDRANT_API_KEY), None);
        assert_eq!(resolver.credentials().missing().len(), 3);
    }

    #[test]
    fn profile_defaults_sit_below_user_values() {
        let mut resolver = CredentialResolver::new(StaticSecrets::default())
            .with_defaults(Profile::Local.default_secrets());
        resolver.set_interactive(QDRANT_URL, "http://qdrant.internal:6333");

        let creds = resolver.credentials().complete().expect("complete");
        assert_eq!(creds.qdrant_url, "http://qdrant.internal:6333");
        assert_eq!(creds.openai_api_key, "ollama");
    }

    #[test]
    fn credentials_debug_masks_keys() {
        let creds = Credentials {
            openai_api_key: Some("sk-live-123".into()),
            qdrant_api_key: Some("qd-456".into()),
            qdrant_url: Some("http://localhost:6333".into()),
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("sk-live-123"));
        assert!(!rendered.contains("qd-456"));
        assert!(rendered.contains("localhost:6333"));
    }

    #[test]
    fn settings_read_overrides_and_clamp_overlap() {
        let settings = Settings::from_lookup(Profile::Cloud, |key| match key {
            "LEGAL_CHUNK_SIZE" => Some("100".into()),
            "LEGAL_CHUNK_OVERLAP" => Some("500".into()),
            "LEGAL_WEB_SEARCH" => Some("false".into()),
            "OPENAI_MODEL" => Some("gpt-4o".into()),
            _ => None,
        });
        assert_eq!(settings.chunk_size, 100);
        assert_eq!(settings.chunk_overlap, 99);
        assert!(!settings.web_search_enabled);
        assert_eq!(settings.chat_model, "gpt-4o");
        assert_eq!(settings.collection, "legal_documents");
    }

    #[test]
    fn local_profile_points_at_ollama() {
        let settings = Settings::from_lookup(Profile::Local, |_| None);
        assert_eq!(settings.collection, "legal_knowledge");
        assert_eq!(
            settings.llm_base_url.as_deref(),
            Some("http://localhost:11434/v1")
        );
    }
}
