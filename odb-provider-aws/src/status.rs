//! Status vocabularies reported by the control plane

use std::fmt;
use std::str::FromStr;

use odb_core::wait::Status;
use thiserror::Error;

/// A status string outside the known vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized {vocabulary} '{value}'")]
pub struct UnknownStatus {
    pub vocabulary: &'static str,
    pub value: String,
}

macro_rules! define_status {
    (
        $(#[$meta:meta])*
        $name:ident, $vocabulary:expr, failures = [$($failure:ident),*] {
            $($variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownStatus;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(UnknownStatus {
                        vocabulary: $vocabulary,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl Status for $name {
            fn is_failure(&self) -> bool {
                false $(|| matches!(self, $name::$failure))*
            }
        }
    };
}

define_status!(
    /// Lifecycle status of infrastructure, clusters, networks and peerings
    ResourceStatus, "resource status", failures = [Failed] {
        Available => "AVAILABLE",
        Failed => "FAILED",
        Provisioning => "PROVISIONING",
        Terminated => "TERMINATED",
        Terminating => "TERMINATING",
        Updating => "UPDATING",
        MaintenanceInProgress => "MAINTENANCE_IN_PROGRESS",
    }
);

define_status!(
    /// Status of a managed service embedded in an ODB network
    ManagedResourceStatus, "managed service status", failures = [] {
        Enabled => "ENABLED",
        Enabling => "ENABLING",
        Disabled => "DISABLED",
        Disabling => "DISABLING",
    }
);

define_status!(
    /// Lifecycle of a Cloud Control resource request
    RequestStatus, "request status", failures = [Failed, CancelComplete] {
        Pending => "PENDING",
        InProgress => "IN_PROGRESS",
        Success => "SUCCESS",
        Failed => "FAILED",
        CancelInProgress => "CANCEL_IN_PROGRESS",
        CancelComplete => "CANCEL_COMPLETE",
    }
);

impl ManagedResourceStatus {
    /// The settled status for a desired enablement
    pub fn settled(enabled: bool) -> Self {
        if enabled {
            ManagedResourceStatus::Enabled
        } else {
            ManagedResourceStatus::Disabled
        }
    }

    /// The transitional status on the way to a desired enablement
    pub fn transitioning(enabled: bool) -> Self {
        if enabled {
            ManagedResourceStatus::Enabling
        } else {
            ManagedResourceStatus::Disabling
        }
    }
}
