//! Integration tests for provider selection and the Azure Blob store

use std::collections::HashMap;
use std::env;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::put;
use axum::Router;
use impactarea_core::models::CloudStorageProvider;
use impactarea_core::ImpactError;
use impactarea_store::azure::AzureBlobStore;
use impactarea_store::{check_credentials, open_store, resolve_bucket, ObjectStore, StoreSettings};
use serial_test::serial;
use tempfile::TempDir;

const AWS_VARS: &[&str] = &["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY", "AWS_BUCKET_NAME"];
const AZURE_VARS: &[&str] = &[
    "AZURE_ACCOUNT_NAME",
    "AZURE_SAS_CREDENTIAL",
    "AZURE_BLOB_CONTAINER_NAME",
];

fn clear_env() {
    for key in AWS_VARS.iter().chain(AZURE_VARS) {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_aws_credentials_required() {
    clear_env();
    let err = check_credentials(CloudStorageProvider::AwsS3).unwrap_err();
    assert!(matches!(err, ImpactError::MissingCredentials { ref provider } if provider == "AWS S3"));

    env::set_var("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE");
    assert!(check_credentials(CloudStorageProvider::AwsS3).is_err());

    env::set_var("AWS_SECRET_ACCESS_KEY", "secret");
    assert!(check_credentials(CloudStorageProvider::AwsS3).is_ok());
    clear_env();
}

#[test]
#[serial]
fn test_azure_credentials_required() {
    clear_env();
    env::set_var("AZURE_ACCOUNT_NAME", "acct");
    env::set_var("AZURE_SAS_CREDENTIAL", "sv=1&sig=x");
    let err = check_credentials(CloudStorageProvider::AzureBlobStorage).unwrap_err();
    assert_eq!(err.to_string(), "Missing Azure Blob Storage credentials");

    env::set_var("AZURE_BLOB_CONTAINER_NAME", "impacts");
    assert!(check_credentials(CloudStorageProvider::AzureBlobStorage).is_ok());
    assert!(check_credentials(CloudStorageProvider::Local).is_ok());
    clear_env();
}

#[test]
#[serial]
fn test_bucket_falls_back_to_env() {
    clear_env();
    assert!(matches!(resolve_bucket(None), Err(ImpactError::ConfigMissing { .. })));

    env::set_var("AWS_BUCKET_NAME", "default-bucket");
    assert_eq!(resolve_bucket(None).unwrap(), "default-bucket");
    assert_eq!(resolve_bucket(Some("")).unwrap(), "default-bucket");
    assert_eq!(resolve_bucket(Some("explicit")).unwrap(), "explicit");
    clear_env();
}

#[tokio::test]
#[serial]
async fn test_open_local_store() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let settings = StoreSettings {
        aws_region: None,
        output_dir: dir.path().to_path_buf(),
    };
    let store = open_store(CloudStorageProvider::Local, None, &settings).await.unwrap();
    assert_eq!(store.provider(), CloudStorageProvider::Local);

    store.put_object("a.zarr/.zgroup", b"{}".to_vec()).await.unwrap();
    assert!(dir.path().join("a.zarr/.zgroup").is_file());

    let err = open_store(CloudStorageProvider::AwsS3, Some("b"), &settings).await.err().unwrap();
    assert!(matches!(err, ImpactError::MissingCredentials { .. }));
}

#[derive(Clone, Default)]
struct Blobs {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

fn signed(query: &Option<String>) -> bool {
    query.as_deref().is_some_and(|q| q.contains("sig=secret"))
}

async fn put_blob(
    State(blobs): State<Blobs>,
    Path((container, key)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if !signed(&query) {
        return StatusCode::FORBIDDEN;
    }
    if headers.get("x-ms-blob-type").and_then(|v| v.to_str().ok()) != Some("BlockBlob") {
        return StatusCode::BAD_REQUEST;
    }
    blobs
        .objects
        .lock()
        .unwrap()
        .insert(format!("{}/{}", container, key), body.to_vec());
    StatusCode::CREATED
}

async fn get_blob(
    State(blobs): State<Blobs>,
    Path((container, key)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> Result<Vec<u8>, StatusCode> {
    if !signed(&query) {
        return Err(StatusCode::FORBIDDEN);
    }
    blobs
        .objects
        .lock()
        .unwrap()
        .get(&format!("{}/{}", container, key))
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)
}

async fn spawn_blob_service() -> (String, Blobs) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let blobs = Blobs::default();
    let app = Router::new()
        .route("/{container}/{*key}", put(put_blob).get(get_blob))
        .with_state(blobs.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (endpoint, blobs)
}

#[tokio::test]
async fn test_azure_put_and_get() {
    let (endpoint, blobs) = spawn_blob_service().await;
    let store = AzureBlobStore::with_endpoint(endpoint.clone(), "impacts", "?sv=2021&sig=secret");

    store.put_object("e1.zarr/difference/0.0", vec![1, 2, 3]).await.unwrap();
    assert_eq!(
        blobs.objects.lock().unwrap().get("impacts/e1.zarr/difference/0.0"),
        Some(&vec![1, 2, 3])
    );
    assert_eq!(store.get_object("e1.zarr/difference/0.0").await.unwrap(), vec![1, 2, 3]);
    assert_eq!(store.uri_for("e1.zarr"), format!("{}/impacts/e1.zarr", endpoint));
}

#[tokio::test]
async fn test_azure_rejected_upload_is_storage_error() {
    let (endpoint, _) = spawn_blob_service().await;
    let store = AzureBlobStore::with_endpoint(endpoint, "impacts", "sv=2021&sig=wrong");

    let err = store.put_object("k", vec![0]).await.unwrap_err();
    assert!(err.to_string().starts_with("Error while uploading folder to Azure Blob Storage"));
    assert!(store.get_object("k").await.is_err());
}
