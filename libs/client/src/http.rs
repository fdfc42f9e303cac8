//! HTTP client for the daemon's Unix socket API.
//!
//! One route per image-service operation. Namespaces are opened with
//! `POST /v1/image-services`; every subsequent operation lives under
//! the `/v1/image-services/{id}` prefix the daemon hands back.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use hyper::{body::Buf, Body, Client, Method, Request};
use hyperlocal::{UnixClientExt, UnixConnector, Uri};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use imaged_api::MappedImage;

use crate::rpc::{ImageServiceEndpoint, RpcError, ServiceEndpoint};

/// Shared request plumbing for one daemon socket.
#[derive(Clone, Debug)]
struct HttpApi {
    socket_path: String,
    client: Client<UnixConnector>,
}

impl HttpApi {
    fn new<P: AsRef<Path>>(socket_path: P) -> Self {
        let socket_path = socket_path.as_ref().to_string_lossy().to_string();
        let client = Client::unix();
        Self {
            socket_path,
            client,
        }
    }

    /// Perform a request with an optional JSON body, returning the
    /// aggregated response body.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<impl Buf, RpcError> {
        let uri = Uri::new(&self.socket_path, path);

        debug!(method = %method, path = path, "Request to imaged API");

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body(body.map(Body::from).unwrap_or_else(Body::empty))?;

        let response = self.client.request(request).await?;
        let status = response.status();
        let body = hyper::body::aggregate(response.into_body()).await?;

        if status.is_success() {
            Ok(body)
        } else {
            let message = String::from_utf8_lossy(body.chunk()).to_string();
            error!(status = %status, message = %message, "imaged API error");
            Err(RpcError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    /// PUT with a JSON body, discarding the response body.
    async fn put<T: Serialize>(&self, path: &str, body: &T) -> Result<(), RpcError> {
        let body = serde_json::to_vec(body)?;
        self.request(Method::PUT, path, Some(body)).await?;
        Ok(())
    }

    /// PUT with a JSON body, decoding a JSON response.
    async fn put_json<T: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R, RpcError> {
        let body = serde_json::to_vec(body)?;
        let response = self.request(Method::PUT, path, Some(body)).await?;
        Ok(serde_json::from_reader(response.reader())?)
    }

    /// POST with a JSON body, decoding a JSON response.
    async fn post_json<T: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R, RpcError> {
        let body = serde_json::to_vec(body)?;
        let response = self.request(Method::POST, path, Some(body)).await?;
        Ok(serde_json::from_reader(response.reader())?)
    }

    /// GET, decoding a JSON response.
    async fn get<R: serde::de::DeserializeOwned>(&self, path: &str) -> Result<R, RpcError> {
        let response = self.request(Method::GET, path, None).await?;
        Ok(serde_json::from_reader(response.reader())?)
    }

    /// DELETE, discarding the response body.
    async fn delete(&self, path: &str) -> Result<(), RpcError> {
        self.request(Method::DELETE, path, None).await?;
        Ok(())
    }
}

#[derive(Serialize)]
struct OpenImageServiceRequest<'a> {
    dir: &'a str,
}

#[derive(Deserialize)]
struct OpenImageServiceResponse {
    id: String,
}

#[derive(Serialize)]
struct CreateImageRequest {
    size: u64,
    flags: u32,
}

#[derive(Serialize)]
struct MapImageRequest {
    timeout_ms: i32,
}

#[derive(Deserialize)]
struct MapImageResponse {
    path: String,
}

#[derive(Serialize)]
struct ZeroFillRequest {
    bytes: u64,
}

#[derive(Deserialize)]
struct ExistsResponse {
    exists: bool,
}

#[derive(Deserialize)]
struct MappedResponse {
    mapped: bool,
}

#[derive(Deserialize)]
struct DeviceResponse {
    path: String,
}

#[derive(Deserialize)]
struct ListImagesResponse {
    images: Vec<String>,
}

/// Top-level daemon endpoint over its API socket.
pub struct HttpServiceEndpoint {
    api: HttpApi,
}

impl HttpServiceEndpoint {
    /// Create an endpoint for the given socket path.
    pub fn new<P: AsRef<Path>>(socket_path: P) -> Self {
        Self {
            api: HttpApi::new(socket_path),
        }
    }

    /// Check if the socket exists.
    pub fn socket_exists(&self) -> bool {
        Path::new(&self.api.socket_path).exists()
    }
}

#[async_trait]
impl ServiceEndpoint for HttpServiceEndpoint {
    async fn open_image_service(
        &self,
        dir: &str,
    ) -> Result<Arc<dyn ImageServiceEndpoint>, RpcError> {
        if !self.socket_exists() {
            return Err(RpcError::SocketNotFound(self.api.socket_path.clone()));
        }

        let response: OpenImageServiceResponse = self
            .api
            .post_json("/v1/image-services", &OpenImageServiceRequest { dir })
            .await?;

        debug!(dir = %dir, id = %response.id, "Opened image service");

        Ok(Arc::new(HttpImageService {
            api: self.api.clone(),
            prefix: format!("/v1/image-services/{}", response.id),
        }))
    }
}

/// Per-namespace image service endpoint.
#[derive(Debug)]
pub struct HttpImageService {
    api: HttpApi,
    /// Route prefix for this namespace, `/v1/image-services/{id}`.
    prefix: String,
}

impl HttpImageService {
    fn image_path(&self, name: &str, suffix: &str) -> String {
        format!("{}/images/{}{}", self.prefix, name, suffix)
    }
}

#[async_trait]
impl ImageServiceEndpoint for HttpImageService {
    async fn create_backing_image(
        &self,
        name: &str,
        size: u64,
        flags: u32,
    ) -> Result<(), RpcError> {
        self.api
            .put(&self.image_path(name, ""), &CreateImageRequest { size, flags })
            .await
    }

    async fn delete_backing_image(&self, name: &str) -> Result<(), RpcError> {
        self.api.delete(&self.image_path(name, "")).await
    }

    async fn map_image_device(
        &self,
        name: &str,
        timeout_ms: i32,
    ) -> Result<MappedImage, RpcError> {
        let response: MapImageResponse = self
            .api
            .put_json(&self.image_path(name, "/map"), &MapImageRequest { timeout_ms })
            .await?;
        Ok(MappedImage {
            path: response.path,
        })
    }

    async fn unmap_image_device(&self, name: &str) -> Result<(), RpcError> {
        self.api
            .put(&self.image_path(name, "/unmap"), &serde_json::json!({}))
            .await
    }

    async fn backing_image_exists(&self, name: &str) -> Result<bool, RpcError> {
        let response: ExistsResponse = self.api.get(&self.image_path(name, "/exists")).await?;
        Ok(response.exists)
    }

    async fn is_image_mapped(&self, name: &str) -> Result<bool, RpcError> {
        let response: MappedResponse = self.api.get(&self.image_path(name, "/mapped")).await?;
        Ok(response.mapped)
    }

    async fn zero_fill_new_image(&self, name: &str, bytes: u64) -> Result<(), RpcError> {
        self.api
            .put(&self.image_path(name, "/zero-fill"), &ZeroFillRequest { bytes })
            .await
    }

    async fn remove_all_images(&self) -> Result<(), RpcError> {
        self.api.delete(&format!("{}/images", self.prefix)).await
    }

    async fn remove_disabled_images(&self) -> Result<(), RpcError> {
        self.api
            .delete(&format!("{}/disabled-images", self.prefix))
            .await
    }

    async fn get_mapped_image_device(&self, name: &str) -> Result<String, RpcError> {
        let response: DeviceResponse = self.api.get(&self.image_path(name, "/device")).await?;
        Ok(response.path)
    }

    async fn get_all_backing_images(&self) -> Result<Vec<String>, RpcError> {
        let response: ListImagesResponse =
            self.api.get(&format!("{}/images", self.prefix)).await?;
        Ok(response.images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_paths_are_namespaced() {
        let service = HttpImageService {
            api: HttpApi::new("/run/imaged/imaged.sock"),
            prefix: "/v1/image-services/is_01".to_string(),
        };
        assert_eq!(
            service.image_path("system_b", "/map"),
            "/v1/image-services/is_01/images/system_b/map"
        );
        assert_eq!(
            service.image_path("system_b", ""),
            "/v1/image-services/is_01/images/system_b"
        );
    }

    #[tokio::test]
    async fn open_fails_fast_without_socket() {
        let endpoint = HttpServiceEndpoint::new("/nonexistent/imaged.sock");
        let err = endpoint.open_image_service("/data/images").await.unwrap_err();
        assert!(matches!(err, RpcError::SocketNotFound(_)));
    }
}
