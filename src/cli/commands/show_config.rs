//! Show-config CLI command.

use clap::Args;
use serde::Serialize;

use crate::cli::{GlobalArgs, OutputSink, Result};
use crate::config::{ConfigOrigin, SyncRequest, read_config, resolve_request};

/// Arguments for the show-config command.
#[derive(Args, Debug, Default)]
pub struct ShowConfigArgs {
    #[command(flatten)]
    pub output: OutputSink,
}

#[derive(Serialize)]
struct ShowConfigOutput {
    /// Config file path, or "environment".
    origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
    /// None when no known platform is configured.
    request: Option<SyncRequest>,
}

impl ShowConfigArgs {
    /// Print the resolved request as JSON. The secret key is redacted by
    /// `SyncRequest`'s serializer.
    pub async fn run(self, global: &GlobalArgs) -> Result<()> {
        let loaded = read_config(&global.to_config_source())?;
        let request = resolve_request(&loaded.config)?;

        let output = ShowConfigOutput {
            origin: match &loaded.origin {
                ConfigOrigin::File(path) => path.display().to_string(),
                ConfigOrigin::Environment => "environment".to_string(),
            },
            warning: loaded.warning,
            request,
        };
        self.output.write_json(&output).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;
    use std::path::PathBuf;

    #[test]
    fn test_output_redacts_secret() {
        let output = ShowConfigOutput {
            origin: "environment".to_string(),
            warning: None,
            request: Some(SyncRequest {
                backend: BackendKind::AliOss,
                endpoint: Some("https://oss-cn-beijing.aliyuncs.com".to_string()),
                region: None,
                access_key: Some("ak".to_string()),
                secret_key: Some("top-secret".to_string()),
                bucket: Some("wj-devops".to_string()),
                source: "drivers/".to_string(),
                destination: PathBuf::from("/mnt/user/datasets"),
            }),
        };

        let json = serde_json::to_string(&output).unwrap();
        assert!(!json.contains("top-secret"));
        assert!(!json.contains("warning"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["request"]["backend"], "ali-oss");
        assert_eq!(value["request"]["bucket"], "wj-devops");
    }
}
