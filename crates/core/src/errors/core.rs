use thiserror::Error;

/// Core error type for the lazy-proxy engine and its host container.
///
/// Every variant carries owned, cloneable data so that a single failed
/// realization can be handed to all callers that raced on the same proxy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Unsupported lazy contract '{contract}': {reason}")]
    UnsupportedContract { contract: String, reason: String },

    #[error("Resolution of '{service_type}' ({name}) failed: {message}")]
    ResolutionFailed {
        service_type: String,
        name: String,
        message: String,
    },

    #[error("Cyclic resolution of '{service_type}': {path}")]
    CyclicResolution { service_type: String, path: String },

    #[error("Invalid service descriptor: {message}")]
    InvalidServiceDescriptor { message: String },

    #[error("Construction of '{service_type}' failed: {message}")]
    Construction {
        service_type: String,
        message: String,
    },

    #[error("Lock error on resource: {resource}")]
    LockError { resource: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl CoreError {
    /// Create an unsupported contract error
    pub fn unsupported_contract(contract: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedContract {
            contract: contract.into(),
            reason: reason.into(),
        }
    }

    /// Create a resolution failure for a service key
    pub fn resolution_failed(
        service_type: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ResolutionFailed {
            service_type: service_type.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a cyclic resolution error
    pub fn cyclic_resolution(service_type: impl Into<String>, path: impl Into<String>) -> Self {
        Self::CyclicResolution {
            service_type: service_type.into(),
            path: path.into(),
        }
    }

    /// Create an invalid descriptor error
    pub fn invalid_descriptor(message: impl Into<String>) -> Self {
        Self::InvalidServiceDescriptor {
            message: message.into(),
        }
    }

    /// Create a construction error raised by a service constructor
    pub fn construction(service_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Construction {
            service_type: service_type.into(),
            message: message.into(),
        }
    }

    /// Create a lock error for a named resource
    pub fn lock(resource: impl Into<String>) -> Self {
        Self::LockError {
            resource: resource.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Check if the error is an unsupported contract error
    pub fn is_unsupported_contract(&self) -> bool {
        matches!(self, Self::UnsupportedContract { .. })
    }

    /// Check if the error is a resolution failure
    pub fn is_resolution_failed(&self) -> bool {
        matches!(self, Self::ResolutionFailed { .. })
    }

    /// Check if the error is a cyclic resolution error
    pub fn is_cyclic(&self) -> bool {
        matches!(self, Self::CyclicResolution { .. })
    }

    /// Whether a later attempt of the same operation may succeed.
    ///
    /// Cycles and contract shape errors are structural; everything else can be
    /// fixed by registering what was missing.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::CyclicResolution { .. } | Self::UnsupportedContract { .. }
        )
    }
}
