pub mod concurrency;
pub mod crm;
pub mod error;
pub mod http_client;
pub mod llm;
pub mod meeting_platform;
pub mod oauth;
pub mod object_store;
pub mod retry;

pub use concurrency::TenantConcurrencyLimiter;
pub use crm::{CrmClient, HttpCrmClient};
pub use error::ClientError;
pub use http_client::ExternalHttpClient;
pub use llm::{GenerationConfig, HttpLlmClient, LlmClient};
pub use meeting_platform::{
    extension_for_content_type, DeployBotRequest, DeployBotResponse, HttpMeetingPlatformClient,
    MediaAsset, MeetingPlatformClient,
};
pub use oauth::{ensure_fresh_token, TokenPair, TokenRefresher, TokenStore};
pub use object_store::{recording_object_path, HttpObjectStoreClient, ObjectStoreClient};
pub use retry::RetryPolicy;
