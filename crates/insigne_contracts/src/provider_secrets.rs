#![forbid(unsafe_code)]

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderSecretId {
    OpenAiApiKey,
    ResendApiKey,
    StorageServiceKey,
    AdminKey,
}

impl ProviderSecretId {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAiApiKey => "openai_api_key",
            Self::ResendApiKey => "resend_api_key",
            Self::StorageServiceKey => "storage_service_key",
            Self::AdminKey => "admin_key",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[
            Self::OpenAiApiKey,
            Self::ResendApiKey,
            Self::StorageServiceKey,
            Self::AdminKey,
        ]
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai_api_key" => Some(Self::OpenAiApiKey),
            "resend_api_key" => Some(Self::ResendApiKey),
            "storage_service_key" => Some(Self::StorageServiceKey),
            "admin_key" => Some(Self::AdminKey),
            _ => None,
        }
    }

    pub fn allowed_key_names() -> Vec<&'static str> {
        Self::all().iter().map(|id| id.as_str()).collect()
    }
}
