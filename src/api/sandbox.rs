use reqwest::{
    Method,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Result, api::ApiClient};

/// One entry of a sandbox directory listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub is_dir: bool,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
}

#[derive(Deserialize)]
struct FilesResponse {
    #[serde(default)]
    files: Vec<FileInfo>,
}

impl ApiClient {
    pub async fn list_files(
        &self,
        sandbox_id: &str,
        path: &str,
    ) -> Result<Vec<FileInfo>> {
        let request = self.request(Method::GET, &format!("/sandboxes/{}/files", sandbox_id)).await?.query(&[("path", path)]);
        let response: FilesResponse = self.send_json(request).await?;
        Ok(response.files)
    }

    /// Raw file bytes; text files are decoded by the caller.
    pub async fn get_file_content(
        &self,
        sandbox_id: &str,
        path: &str,
    ) -> Result<Vec<u8>> {
        let request = self.request(Method::GET, &format!("/sandboxes/{}/files/content", sandbox_id)).await?.query(&[("path", path)]);
        let response = self.send(request).await?;
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn upload_file(
        &self,
        sandbox_id: &str,
        path: &str,
        content: Vec<u8>,
    ) -> Result<()> {
        let file_name = path.rsplit('/').next().unwrap_or(path).to_string();
        let form = Form::new().text("path", path.to_string()).part("file", Part::bytes(content).file_name(file_name));
        let request = self.request(Method::POST, &format!("/sandboxes/{}/files", sandbox_id)).await?.multipart(form);
        self.send(request).await?;
        debug!(sandbox_id, path, "file uploaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_response() {
        let response: FilesResponse = serde_json::from_str(
            r#"{"files": [{"name": "src", "path": "/workspace/src", "is_dir": true}, {"name": "a.txt", "path": "/workspace/a.txt", "size": 12}]}"#,
        )
        .unwrap();
        assert!(response.files[0].is_dir);
        assert_eq!(response.files[1].size, 12);
        assert_eq!(response.files[1].mod_time, None);
    }
}
