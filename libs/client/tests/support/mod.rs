//! Shared fakes for the acquisition and proxy test suites.
//!
//! Each fake implements one of the injected seams with controllable
//! behavior and call recording, so tests can distinguish "the daemon
//! is not up yet" from "the daemon said no" from "the transport broke".

// Not every test crate uses every fake.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use imaged_api::MappedImage;
use imaged_client::directory::ServiceDirectory;
use imaged_client::rpc::{ImageServiceEndpoint, RpcError, ServiceEndpoint};
use imaged_client::supervisor::{ProcessSupervisor, RunState, SupervisorError};

fn injected_failure() -> RpcError {
    RpcError::Api {
        status: 500,
        message: "injected transport failure".to_string(),
    }
}

/// Supervisor fake with a scripted run state.
pub struct FakeSupervisor {
    state: Mutex<RunState>,
    /// Whether a start signal actually transitions the service to
    /// running, or the process dies again immediately.
    start_sticks: bool,
    start_calls: AtomicUsize,
    run_state_calls: AtomicUsize,
}

impl FakeSupervisor {
    pub fn running() -> Self {
        Self {
            state: Mutex::new(RunState::Running),
            start_sticks: true,
            start_calls: AtomicUsize::new(0),
            run_state_calls: AtomicUsize::new(0),
        }
    }

    pub fn stopped() -> Self {
        Self {
            state: Mutex::new(RunState::Stopped),
            start_sticks: true,
            start_calls: AtomicUsize::new(0),
            run_state_calls: AtomicUsize::new(0),
        }
    }

    /// Accepts start signals but always reads stopped again, like a
    /// daemon that crashes right after starting.
    pub fn flapping() -> Self {
        Self {
            state: Mutex::new(RunState::Stopped),
            start_sticks: false,
            start_calls: AtomicUsize::new(0),
            run_state_calls: AtomicUsize::new(0),
        }
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn run_state_calls(&self) -> usize {
        self.run_state_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessSupervisor for FakeSupervisor {
    async fn run_state(&self, _service: &str) -> Result<RunState, SupervisorError> {
        self.run_state_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.state.lock().await)
    }

    async fn start(&self, _service: &str) -> Result<(), SupervisorError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.start_sticks {
            *self.state.lock().await = RunState::Running;
        }
        Ok(())
    }

    async fn await_state(
        &self,
        _service: &str,
        target: RunState,
        timeout: Duration,
    ) -> Result<bool, SupervisorError> {
        if *self.state.lock().await == target {
            return Ok(true);
        }
        // A state change is never coming; burn one poll period rather
        // than the whole budget so retry behavior stays observable.
        tokio::time::sleep(Duration::from_millis(10).min(timeout)).await;
        Ok(*self.state.lock().await == target)
    }
}

/// Directory fake that can stay absent for the first N lookups.
pub struct FakeDirectory {
    endpoint: Option<Arc<FakeService>>,
    absent_for: usize,
    resolve_calls: AtomicUsize,
}

impl FakeDirectory {
    pub fn resolving(endpoint: Arc<FakeService>) -> Self {
        Self {
            endpoint: Some(endpoint),
            absent_for: 0,
            resolve_calls: AtomicUsize::new(0),
        }
    }

    /// Absent for the first `n` lookups, registered afterwards.
    pub fn registered_after(n: usize, endpoint: Arc<FakeService>) -> Self {
        Self {
            endpoint: Some(endpoint),
            absent_for: n,
            resolve_calls: AtomicUsize::new(0),
        }
    }

    pub fn never() -> Self {
        Self {
            endpoint: None,
            absent_for: 0,
            resolve_calls: AtomicUsize::new(0),
        }
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceDirectory for FakeDirectory {
    async fn resolve(
        &self,
        _name: &str,
    ) -> Result<Option<Arc<dyn ServiceEndpoint>>, RpcError> {
        let seen = self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if seen < self.absent_for {
            return Ok(None);
        }
        Ok(self
            .endpoint
            .clone()
            .map(|e| e as Arc<dyn ServiceEndpoint>))
    }
}

/// Top-level endpoint fake.
pub struct FakeService {
    pub image_service: Arc<FakeImageService>,
    deny_open: bool,
    open_calls: AtomicUsize,
}

impl FakeService {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self {
            image_service: Arc::new(FakeImageService::healthy()),
            deny_open: false,
            open_calls: AtomicUsize::new(0),
        })
    }

    pub fn with_image_service(image_service: Arc<FakeImageService>) -> Arc<Self> {
        Arc::new(Self {
            image_service,
            deny_open: false,
            open_calls: AtomicUsize::new(0),
        })
    }

    /// Live daemon that refuses to open the namespace.
    pub fn denying() -> Arc<Self> {
        Arc::new(Self {
            image_service: Arc::new(FakeImageService::healthy()),
            deny_open: true,
            open_calls: AtomicUsize::new(0),
        })
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceEndpoint for FakeService {
    async fn open_image_service(
        &self,
        _dir: &str,
    ) -> Result<Arc<dyn ImageServiceEndpoint>, RpcError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if self.deny_open {
            return Err(RpcError::Api {
                status: 403,
                message: "namespace denied".to_string(),
            });
        }
        Ok(self.image_service.clone())
    }
}

/// Image service fake recording every RPC it receives.
#[derive(Debug)]
pub struct FakeImageService {
    fail_all: bool,
    /// Method names in call order.
    calls: Mutex<Vec<String>>,
    /// Last timeout the map operation saw on the wire.
    last_map_timeout: Mutex<Option<i32>>,
    pub device_path: String,
    pub images: Vec<String>,
}

impl FakeImageService {
    pub fn healthy() -> Self {
        Self {
            fail_all: false,
            calls: Mutex::new(Vec::new()),
            last_map_timeout: Mutex::new(None),
            device_path: "/dev/block/loop7".to_string(),
            images: vec!["system_a".to_string(), "system_b".to_string()],
        }
    }

    /// Every RPC fails at the transport level.
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::healthy()
        }
    }

    pub fn with_device_path(path: &str) -> Self {
        Self {
            device_path: path.to_string(),
            ..Self::healthy()
        }
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    pub async fn last_map_timeout(&self) -> Option<i32> {
        *self.last_map_timeout.lock().await
    }

    async fn record(&self, method: &str) -> Result<(), RpcError> {
        self.calls.lock().await.push(method.to_string());
        if self.fail_all {
            Err(injected_failure())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ImageServiceEndpoint for FakeImageService {
    async fn create_backing_image(
        &self,
        _name: &str,
        _size: u64,
        _flags: u32,
    ) -> Result<(), RpcError> {
        self.record("create_backing_image").await
    }

    async fn delete_backing_image(&self, _name: &str) -> Result<(), RpcError> {
        self.record("delete_backing_image").await
    }

    async fn map_image_device(
        &self,
        _name: &str,
        timeout_ms: i32,
    ) -> Result<MappedImage, RpcError> {
        *self.last_map_timeout.lock().await = Some(timeout_ms);
        self.record("map_image_device").await?;
        Ok(MappedImage {
            path: self.device_path.clone(),
        })
    }

    async fn unmap_image_device(&self, _name: &str) -> Result<(), RpcError> {
        self.record("unmap_image_device").await
    }

    async fn backing_image_exists(&self, _name: &str) -> Result<bool, RpcError> {
        self.record("backing_image_exists").await?;
        Ok(true)
    }

    async fn is_image_mapped(&self, _name: &str) -> Result<bool, RpcError> {
        self.record("is_image_mapped").await?;
        Ok(false)
    }

    async fn zero_fill_new_image(&self, _name: &str, _bytes: u64) -> Result<(), RpcError> {
        self.record("zero_fill_new_image").await
    }

    async fn remove_all_images(&self) -> Result<(), RpcError> {
        self.record("remove_all_images").await
    }

    async fn remove_disabled_images(&self) -> Result<(), RpcError> {
        self.record("remove_disabled_images").await
    }

    async fn get_mapped_image_device(&self, _name: &str) -> Result<String, RpcError> {
        self.record("get_mapped_image_device").await?;
        Ok(self.device_path.clone())
    }

    async fn get_all_backing_images(&self) -> Result<Vec<String>, RpcError> {
        self.record("get_all_backing_images").await?;
        Ok(self.images.clone())
    }
}
