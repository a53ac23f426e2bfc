use std::path::Path;

use serde::Serialize;

/// Name the extension passes to `runtime.connectNative`.
pub const HOST_NAME: &str = "com.reelwatch.host";

/// Native messaging host manifest, installed where the browser looks for `HOST_NAME`.
#[derive(Debug, Serialize)]
pub struct HostManifest {
    pub name: &'static str,
    pub description: &'static str,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub allowed_origins: Vec<String>,
}

impl HostManifest {
    pub fn new(extension_id: &str, binary: &Path) -> Self {
        Self {
            name: HOST_NAME,
            description: "Reports movies and shows watched in the browser",
            path: binary.display().to_string(),
            kind: "stdio",
            allowed_origins: vec![format!("chrome-extension://{extension_id}/")],
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_manifest_json() {
        let manifest = HostManifest::new("abcdefghijklmnop", Path::new("/usr/bin/reelwatch-host"));
        assert_eq!(
            serde_json::to_value(&manifest).unwrap(),
            json!({
                "name": "com.reelwatch.host",
                "description": "Reports movies and shows watched in the browser",
                "path": "/usr/bin/reelwatch-host",
                "type": "stdio",
                "allowed_origins": ["chrome-extension://abcdefghijklmnop/"]
            })
        );
    }
}
