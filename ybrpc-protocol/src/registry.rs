//! Request type to remote method resolution.

use crate::message::RemoteMethodPb;
use crate::schema::{ServiceDescriptor, SERVICES};
use prost::Name;
use std::collections::HashMap;

/// The remote method a request type is sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Fully-qualified name of the request message.
    pub request_type: String,
    pub method_name: String,
    pub service_name: String,
}

impl RegistryEntry {
    /// Builds the `remote_method` field of a request header.
    pub fn remote_method(&self) -> RemoteMethodPb {
        RemoteMethodPb {
            service_name: self.service_name.clone(),
            method_name: self.method_name.clone(),
        }
    }
}

/// Read-only map from request message type to the method that accepts it.
///
/// Built once and shared by reference (typically behind an `Arc`) with every
/// connection.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl ServiceRegistry {
    /// Registers every method of every service in `sources`, keyed by the
    /// method's input type. A later declaration of the same input type
    /// replaces an earlier one.
    pub fn build<'a, I>(sources: I) -> Self
    where
        I: IntoIterator<Item = &'a ServiceDescriptor>,
    {
        let mut entries = HashMap::new();
        for service in sources {
            for method in service.methods {
                entries.insert(
                    method.input_type.to_string(),
                    RegistryEntry {
                        request_type: method.input_type.to_string(),
                        method_name: method.name.to_string(),
                        service_name: service.name.to_string(),
                    },
                );
            }
        }
        Self { entries }
    }

    /// Resolves the method for a request message.
    pub fn lookup<M: Name>(&self, _request: &M) -> Option<&RegistryEntry> {
        self.lookup_type(&M::full_name())
    }

    /// Resolves the method for a fully-qualified request type name.
    pub fn lookup_type(&self, full_name: &str) -> Option<&RegistryEntry> {
        self.entries.get(full_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::build(SERVICES.iter().copied())
    }
}
