//! Service lifecycle: the [`Service`] contract and the [`ServiceRegistry`]
//! that brings named services online at startup and releases them at shutdown.
//!
//! ## Startup
//!
//! ```ignore
//! let mut registry = ServiceRegistry::new();
//! registry.register("currency", currency.clone());
//! registry.register("hearts", hearts.clone());
//! let report = registry.startup(&[
//!     ("currency", Criticality::Essential),
//!     ("hearts", Criticality::Optional),
//! ])?;
//! ```

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::{CoreError, Result, ServiceError};

/// Lifecycle flags a service reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub initialized: bool,
    pub initializing: bool,
    /// Message of the last initialization failure, if any.
    pub error: Option<String>,
}

/// Anything the registry can start and stop.
pub trait Service: Send + Sync {
    fn initialize(&self) -> Result<()>;

    /// Release resources. Errors are logged by the registry, never propagated.
    fn cleanup(&self) -> Result<()>;

    fn is_initialized(&self) -> bool;

    fn is_initializing(&self) -> bool;

    fn status(&self) -> ServiceStatus {
        ServiceStatus {
            initialized: self.is_initialized(),
            initializing: self.is_initializing(),
            error: None,
        }
    }
}

/// Shared bookkeeping for [`Service`] implementors.
#[derive(Debug, Default)]
pub struct StatusCell {
    inner: Mutex<ServiceStatus>,
}

impl StatusCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ServiceStatus {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Mark initialization as started. Returns false if one is already
    /// running or the service is already up.
    pub fn begin(&self) -> bool {
        let mut status = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if status.initializing || status.initialized {
            return false;
        }
        status.initializing = true;
        status.error = None;
        true
    }

    pub fn succeed(&self) {
        let mut status = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        status.initializing = false;
        status.initialized = true;
        status.error = None;
    }

    pub fn fail(&self, err: &CoreError) {
        let mut status = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        status.initializing = false;
        status.initialized = false;
        status.error = Some(err.to_string());
    }

    pub fn reset(&self) {
        let mut status = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        status.initialized = false;
        status.initializing = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.snapshot().initialized
    }

    pub fn is_initializing(&self) -> bool {
        self.snapshot().initializing
    }
}

/// How startup reacts when a service fails to initialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    /// Failure aborts startup.
    Essential,
    /// Failure is logged and the feature runs degraded.
    Optional,
}

#[derive(Debug, Clone, Serialize)]
pub struct DegradedService {
    pub name: String,
    pub error: String,
}

/// Outcome of [`ServiceRegistry::startup`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct StartupReport {
    pub initialized: Vec<String>,
    pub degraded: Vec<DegradedService>,
}

impl StartupReport {
    pub fn is_fully_up(&self) -> bool {
        self.degraded.is_empty()
    }
}

/// Registry of named services.
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<dyn Service>>,
    /// Registration order.
    order: Vec<String>,
    initialized: HashSet<String>,
    /// Successful initialization order, replayed backwards at cleanup.
    init_order: Vec<String>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service. A name that is already taken keeps its existing
    /// instance, which is returned.
    pub fn register<S>(&mut self, name: &str, service: Arc<S>) -> Arc<dyn Service>
    where
        S: Service + 'static,
    {
        if let Some(existing) = self.services.get(name) {
            debug!(
                component = "ServiceRegistry",
                service = name,
                "Service already registered, returning existing instance"
            );
            return existing.clone();
        }

        let service: Arc<dyn Service> = service;
        self.services.insert(name.to_string(), service.clone());
        self.order.push(name.to_string());
        info!(component = "ServiceRegistry", service = name, "Service registered");
        service
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Service>> {
        self.services.get(name).cloned().ok_or_else(|| {
            error!(component = "ServiceRegistry", service = name, "Service not registered");
            ServiceError::NotRegistered(name.to_string()).into()
        })
    }

    /// Initialize one service.
    ///
    /// No-op when already initialized or mid-initialization. Fails when the
    /// name is unknown, when the service's `initialize` fails, or when it
    /// returns without reporting itself initialized.
    pub fn initialize_service(&mut self, name: &str) -> Result<()> {
        let service = self.services.get(name).cloned().ok_or_else(|| {
            error!(
                component = "ServiceRegistry",
                service = name,
                "Cannot initialize service: not registered"
            );
            CoreError::from(ServiceError::NotRegistered(name.to_string()))
        })?;

        if self.initialized.contains(name) {
            debug!(component = "ServiceRegistry", service = name, "Service already initialized");
            return Ok(());
        }

        if service.is_initializing() {
            debug!(
                component = "ServiceRegistry",
                service = name,
                "Service is already initializing"
            );
            return Ok(());
        }

        if let Err(source) = service.initialize() {
            error!(
                component = "ServiceRegistry",
                service = name,
                error = %source,
                "Failed to initialize service"
            );
            return Err(ServiceError::InitializeFailed {
                name: name.to_string(),
                source: Box::new(source),
            }
            .into());
        }

        if !service.is_initialized() {
            error!(
                component = "ServiceRegistry",
                service = name,
                "Service initialize() returned but service is not marked initialized"
            );
            return Err(ServiceError::NotMarkedInitialized(name.to_string()).into());
        }

        self.initialized.insert(name.to_string());
        self.init_order.push(name.to_string());
        info!(component = "ServiceRegistry", service = name, "Service initialized");
        Ok(())
    }

    /// Initialize every service in registration order, stopping at the first failure.
    pub fn initialize_all(&mut self) -> Result<()> {
        let names = self.order.clone();
        info!(
            component = "ServiceRegistry",
            services = %names.join(", "),
            "Initializing all services"
        );

        for name in &names {
            self.initialize_service(name)?;
        }

        info!(
            component = "ServiceRegistry",
            initialized = self.initialized.len(),
            "All services initialized"
        );
        Ok(())
    }

    /// Bring services up in `plan` order, classifying failures by criticality.
    pub fn startup(&mut self, plan: &[(&str, Criticality)]) -> Result<StartupReport> {
        let mut report = StartupReport::default();

        for (name, criticality) in plan {
            match self.initialize_service(name) {
                Ok(()) => report.initialized.push(name.to_string()),
                Err(e) if *criticality == Criticality::Optional => {
                    warn!(
                        component = "ServiceRegistry",
                        service = *name,
                        error = %e,
                        "Non-essential service failed to initialize, continuing degraded"
                    );
                    report.degraded.push(DegradedService {
                        name: name.to_string(),
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    error!(
                        component = "ServiceRegistry",
                        service = *name,
                        error = %e,
                        "Essential service failed to initialize, aborting startup"
                    );
                    return Err(e);
                }
            }
        }

        Ok(report)
    }

    /// Clean up one service. Never fails.
    pub fn cleanup_service(&mut self, name: &str) {
        let Some(service) = self.services.get(name).cloned() else {
            debug!(
                component = "ServiceRegistry",
                service = name,
                "Cannot clean up service: not registered"
            );
            return;
        };

        if !self.initialized.contains(name) {
            debug!(
                component = "ServiceRegistry",
                service = name,
                "Service not initialized, no cleanup needed"
            );
            return;
        }

        match service.cleanup() {
            Ok(()) => info!(component = "ServiceRegistry", service = name, "Service cleaned up"),
            Err(e) => {
                let err = ServiceError::CleanupFailed {
                    name: name.to_string(),
                    message: e.to_string(),
                };
                error!(component = "ServiceRegistry", service = name, error = %err, "Cleanup failed");
            }
        }

        self.initialized.remove(name);
        self.init_order.retain(|n| n != name);
    }

    /// Clean up every initialized service, most recently initialized first.
    pub fn cleanup_all(&mut self) {
        let names: Vec<String> = self.init_order.iter().rev().cloned().collect();
        info!(
            component = "ServiceRegistry",
            services = %names.join(", "),
            "Cleaning up all services"
        );

        for name in &names {
            self.cleanup_service(name);
        }

        info!(component = "ServiceRegistry", "All services cleaned up");
    }

    pub fn has_service(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn is_service_initialized(&self, name: &str) -> bool {
        self.initialized.contains(name)
    }

    /// Registered names in registration order.
    pub fn service_names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Initialized names in initialization order.
    pub fn initialized_service_names(&self) -> Vec<String> {
        self.init_order.clone()
    }

    /// Status of every registered service, in registration order.
    pub fn statuses(&self) -> Vec<(String, ServiceStatus)> {
        self.order
            .iter()
            .filter_map(|name| {
                self.services
                    .get(name)
                    .map(|service| (name.clone(), service.status()))
            })
            .collect()
    }
}
