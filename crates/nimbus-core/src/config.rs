use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::fs;
use tokio::sync::RwLock;

/// Environment-sourced configuration (spec §6 Configuration). Missing
/// `cron_secret` disables all scheduled entry points fail-closed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub base_url: Option<String>,
    pub service_role_key: Option<String>,
    #[serde(default)]
    pub webhook_secrets: std::collections::HashMap<String, String>,
    pub llm_api_key: Option<String>,
    pub object_store_bucket: Option<String>,
    pub object_store_region: Option<String>,
    pub object_store_credentials: Option<String>,
    pub meeting_platform_base_url: Option<String>,
    pub meeting_platform_api_key: Option<String>,
    pub slack_bot_token: Option<String>,
    pub mailer_base_url: Option<String>,
    pub mailer_api_key: Option<String>,
    #[serde(default)]
    pub allowed_cors_origins: Vec<String>,
    pub cron_secret: Option<String>,
    /// How long a signed media download URL stays valid before the upload
    /// worker must re-derive it (spec §9 Open Question resolution).
    pub media_url_expiry_hours: u32,
}

impl AppConfig {
    pub fn cron_enabled(&self) -> bool {
        self.cron_secret.as_deref().is_some_and(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
struct ConfigLayers {
    global: Value,
    project: Value,
    managed: Value,
    env: Value,
    runtime: Value,
    cli: Value,
}

/// Layered configuration store: global < project < managed < env < runtime
/// < cli, each overlay deep-merged onto the previous in that priority order.
/// Persisted layers are scrubbed of runtime-env-sourced secrets before
/// touching disk.
#[derive(Clone)]
pub struct ConfigStore {
    project_path: PathBuf,
    global_path: PathBuf,
    managed_path: PathBuf,
    layers: Arc<RwLock<ConfigLayers>>,
}

impl ConfigStore {
    pub async fn new(path: impl AsRef<Path>, cli_overrides: Option<Value>) -> anyhow::Result<Self> {
        let project_path = path.as_ref().to_path_buf();
        if let Some(parent) = project_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let managed_path = project_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("managed_config.json");
        let global_path = resolve_global_config_path().await?;

        let mut global = read_json_file(&global_path).await.unwrap_or_else(|_| empty_object());
        let mut project = read_json_file(&project_path).await.unwrap_or_else(|_| empty_object());
        let mut managed = read_json_file(&managed_path).await.unwrap_or_else(|_| empty_object());

        scrub_persisted_secrets(&mut global, &global_path).await?;
        scrub_persisted_secrets(&mut project, &project_path).await?;
        scrub_persisted_secrets(&mut managed, &managed_path).await?;

        let layers = ConfigLayers {
            global,
            project,
            managed,
            env: env_layer(),
            runtime: empty_object(),
            cli: cli_overrides.unwrap_or_else(empty_object),
        };

        let store = Self {
            project_path,
            global_path,
            managed_path,
            layers: Arc::new(RwLock::new(layers)),
        };
        store.save_project().await?;
        Ok(store)
    }

    pub async fn get(&self) -> AppConfig {
        let merged = self.get_effective_value().await;
        serde_json::from_value(merged).unwrap_or_default()
    }

    pub async fn get_effective_value(&self) -> Value {
        let layers = self.layers.read().await.clone();
        let mut merged = empty_object();
        deep_merge(&mut merged, &layers.global);
        deep_merge(&mut merged, &layers.project);
        deep_merge(&mut merged, &layers.managed);
        deep_merge(&mut merged, &layers.env);
        deep_merge(&mut merged, &layers.runtime);
        deep_merge(&mut merged, &layers.cli);
        merged
    }

    pub async fn patch_runtime(&self, patch: Value) -> anyhow::Result<Value> {
        {
            let mut layers = self.layers.write().await;
            deep_merge(&mut layers.runtime, &patch);
        }
        Ok(self.get_effective_value().await)
    }

    pub async fn patch_project(&self, patch: Value) -> anyhow::Result<Value> {
        {
            let mut layers = self.layers.write().await;
            deep_merge(&mut layers.project, &patch);
        }
        self.save_project().await?;
        Ok(self.get_effective_value().await)
    }

    async fn save_project(&self) -> anyhow::Result<()> {
        let snapshot = self.layers.read().await.project.clone();
        write_json_file(&self.project_path, &snapshot).await
    }

    #[allow(dead_code)]
    async fn save_managed(&self) -> anyhow::Result<()> {
        let snapshot = self.layers.read().await.managed.clone();
        write_json_file(&self.managed_path, &snapshot).await
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

async fn write_json_file(path: &Path, value: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut to_write = value.clone();
    strip_persisted_secrets(&mut to_write);
    let raw = serde_json::to_string_pretty(&to_write)?;
    fs::write(path, raw).await?;
    Ok(())
}

/// Secrets sourced from the environment are never persisted back to a
/// config file on disk — only the key names they'd otherwise occupy.
fn strip_persisted_secrets(value: &mut Value) {
    let Value::Object(root) = value else { return };
    for key in [
        "service_role_key",
        "llm_api_key",
        "object_store_credentials",
        "meeting_platform_api_key",
        "slack_bot_token",
        "mailer_api_key",
        "cron_secret",
    ] {
        if root.contains_key(key) && std::env::var(env_key_for(key)).is_ok_and(|v| !v.trim().is_empty()) {
            root.remove(key);
        }
    }
    if let Some(secrets) = root.get_mut("webhook_secrets").and_then(|v| v.as_object_mut()) {
        secrets.retain(|source, _| {
            std::env::var(format!("NIMBUS_WEBHOOK_SECRET_{}", source.to_ascii_uppercase()))
                .is_err()
        });
    }
}

fn env_key_for(field: &str) -> &'static str {
    match field {
        "service_role_key" => "NIMBUS_SERVICE_ROLE_KEY",
        "llm_api_key" => "NIMBUS_LLM_API_KEY",
        "object_store_credentials" => "NIMBUS_OBJECT_STORE_CREDENTIALS",
        "meeting_platform_api_key" => "NIMBUS_MEETING_PLATFORM_API_KEY",
        "slack_bot_token" => "NIMBUS_SLACK_BOT_TOKEN",
        "mailer_api_key" => "NIMBUS_MAILER_API_KEY",
        "cron_secret" => "CRON_SECRET",
        _ => "",
    }
}

async fn scrub_persisted_secrets(value: &mut Value, path: &Path) -> anyhow::Result<()> {
    let before = value.clone();
    strip_persisted_secrets(value);
    if *value != before {
        write_json_file(path, value).await?;
    }
    Ok(())
}

async fn read_json_file(path: &Path) -> anyhow::Result<Value> {
    if !path.exists() {
        return Ok(empty_object());
    }
    let raw = fs::read_to_string(path).await?;
    Ok(serde_json::from_str::<Value>(&raw).unwrap_or_else(|_| empty_object()))
}

async fn resolve_global_config_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("NIMBUS_GLOBAL_CONFIG") {
        let path = PathBuf::from(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        return Ok(path);
    }
    if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join("nimbus").join("config.json");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        return Ok(path);
    }
    Ok(PathBuf::from(".nimbus/global_config.json"))
}

fn env_layer() -> Value {
    let mut root = empty_object();

    set_if_present(&mut root, "base_url", "NIMBUS_BASE_URL");
    set_if_present(&mut root, "service_role_key", "NIMBUS_SERVICE_ROLE_KEY");
    set_if_present(&mut root, "llm_api_key", "NIMBUS_LLM_API_KEY");
    set_if_present(&mut root, "object_store_bucket", "NIMBUS_OBJECT_STORE_BUCKET");
    set_if_present(&mut root, "object_store_region", "NIMBUS_OBJECT_STORE_REGION");
    set_if_present(
        &mut root,
        "object_store_credentials",
        "NIMBUS_OBJECT_STORE_CREDENTIALS",
    );
    set_if_present(&mut root, "meeting_platform_base_url", "NIMBUS_MEETING_PLATFORM_BASE_URL");
    set_if_present(&mut root, "meeting_platform_api_key", "NIMBUS_MEETING_PLATFORM_API_KEY");
    set_if_present(&mut root, "slack_bot_token", "NIMBUS_SLACK_BOT_TOKEN");
    set_if_present(&mut root, "mailer_base_url", "NIMBUS_MAILER_BASE_URL");
    set_if_present(&mut root, "mailer_api_key", "NIMBUS_MAILER_API_KEY");
    set_if_present(&mut root, "cron_secret", "CRON_SECRET");

    if let Ok(origins) = std::env::var("NIMBUS_ALLOWED_CORS_ORIGINS") {
        deep_merge(&mut root, &json!({ "allowed_cors_origins": parse_csv(&origins) }));
    }

    let mut webhook_secrets = Map::new();
    for source in ["meetingbaas", "fathom", "stripe", "sentry_bridge"] {
        let env_key = format!("NIMBUS_WEBHOOK_SECRET_{}", source.to_ascii_uppercase());
        if let Ok(secret) = std::env::var(&env_key) {
            if !secret.trim().is_empty() {
                webhook_secrets.insert(source.to_string(), Value::String(secret));
            }
        }
    }
    if !webhook_secrets.is_empty() {
        deep_merge(&mut root, &json!({ "webhook_secrets": webhook_secrets }));
    }

    let media_url_expiry_hours = std::env::var("NIMBUS_MEDIA_URL_EXPIRY_HOURS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(4);
    deep_merge(&mut root, &json!({ "media_url_expiry_hours": media_url_expiry_hours }));

    root
}

fn set_if_present(root: &mut Value, field: &str, env_key: &str) {
    if let Ok(value) = std::env::var(env_key) {
        if !value.trim().is_empty() {
            deep_merge(root, &json!({ field: value }));
        }
    }
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn deep_merge(base: &mut Value, overlay: &Value) {
    if overlay.is_null() {
        return;
    }
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if value.is_null() {
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_file(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        path.push(format!("nimbus-core-config-{name}-{ts}.json"));
        path
    }

    // CRON_SECRET is process-global; serialize the tests that mutate it so
    // they don't race across threads.
    static CRON_SECRET_ENV: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[tokio::test]
    async fn cron_disabled_when_secret_unset() {
        let _guard = CRON_SECRET_ENV.lock().unwrap();
        let path = unique_temp_file("cron-unset");
        std::env::remove_var("CRON_SECRET");
        let store = ConfigStore::new(&path, None).await.expect("store");
        let config = store.get().await;
        assert!(!config.cron_enabled());
        let _ = fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn cron_enabled_when_secret_set() {
        let _guard = CRON_SECRET_ENV.lock().unwrap();
        let path = unique_temp_file("cron-set");
        std::env::set_var("CRON_SECRET", "a-real-secret");
        let store = ConfigStore::new(&path, None).await.expect("store");
        let config = store.get().await;
        assert!(config.cron_enabled());
        std::env::remove_var("CRON_SECRET");
        let _ = fs::remove_file(&path).await;
    }

    #[test]
    fn strip_persisted_secrets_removes_env_sourced_cron_secret() {
        let _guard = CRON_SECRET_ENV.lock().unwrap();
        std::env::set_var("CRON_SECRET", "runtime-secret");
        let mut value = json!({ "cron_secret": "runtime-secret" });
        strip_persisted_secrets(&mut value);
        assert!(value.get("cron_secret").is_none());
        std::env::remove_var("CRON_SECRET");
    }
}
