//! Capability objects and the proxy registry.
//!
//! A capability object exposes a closed, fixed set of named operations.
//! Registering it under a proxy name makes every operation invocable as
//! `proxyName.methodName` without registering each method individually,
//! and without open-ended runtime introspection: only names listed by
//! [`Capability::methods`] ever cross the process boundary.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use super::error::{HandlerError, RegisterError};

/// Separator between proxy name and method name in a qualified command
pub const SEPARATOR: char = '.';

/// A host-side object whose operations are remotely invocable.
///
/// Implementations own their resources for the lifetime of the
/// registration; arguments and results are JSON-compatible values and
/// no operation may assume UI-thread access.
pub trait Capability: Send + Sync {
    /// The closed set of invocable operation names, fixed at
    /// registration time.
    fn methods(&self) -> &[&str];

    /// Invoke the named operation. The router only passes names listed
    /// by [`methods`](Self::methods).
    fn invoke<'a>(
        &'a self,
        method: &'a str,
        args: Vec<Value>,
    ) -> BoxFuture<'a, Result<Value, HandlerError>>;
}

/// Split a qualified name into (proxy, method) at the first separator.
///
/// A name with no separator, or with an empty half, never matches a
/// proxy entry.
pub fn split_qualified(name: &str) -> Option<(&str, &str)> {
    name.split_once(SEPARATOR)
        .filter(|(proxy, method)| !proxy.is_empty() && !method.is_empty())
}

/// Qualified command name for one proxy method
pub fn qualify(proxy_name: &str, method: &str) -> String {
    format!("{proxy_name}{SEPARATOR}{method}")
}

/// Registered capability objects, owned exclusively by one router
#[derive(Default)]
pub struct ProxyRegistry {
    entries: HashMap<String, Arc<dyn Capability>>,
}

impl ProxyRegistry {
    /// Every qualified name a capability contributes under a proxy name
    pub fn derived_names(proxy_name: &str, target: &dyn Capability) -> Vec<String> {
        target
            .methods()
            .iter()
            .map(|method| qualify(proxy_name, method))
            .collect()
    }

    /// Add a capability object under a proxy name.
    ///
    /// Only the proxy-name uniqueness check lives here; the router
    /// checks derived names against the full effective namespace before
    /// calling this, so a failed registration touches nothing.
    pub fn insert(
        &mut self,
        proxy_name: &str,
        target: Arc<dyn Capability>,
    ) -> Result<(), RegisterError> {
        if self.entries.contains_key(proxy_name) {
            return Err(RegisterError::DuplicateProxy {
                name: proxy_name.to_string(),
            });
        }
        self.entries.insert(proxy_name.to_string(), target);
        Ok(())
    }

    pub fn contains_proxy(&self, proxy_name: &str) -> bool {
        self.entries.contains_key(proxy_name)
    }

    /// Resolve a qualified name to its capability and method name
    pub fn resolve(&self, qualified: &str) -> Option<(Arc<dyn Capability>, String)> {
        let (proxy_name, method) = split_qualified(qualified)?;
        let target = self.entries.get(proxy_name)?;
        if !target.methods().contains(&method) {
            return None;
        }
        Some((target.clone(), method.to_string()))
    }

    /// Drop all entries. Idempotent.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    struct Clipboard;

    impl Capability for Clipboard {
        fn methods(&self) -> &[&str] {
            &["readText", "writeText"]
        }

        fn invoke<'a>(
            &'a self,
            method: &'a str,
            args: Vec<Value>,
        ) -> BoxFuture<'a, Result<Value, HandlerError>> {
            Box::pin(async move {
                match method {
                    "readText" => Ok(json!("clip")),
                    "writeText" => Ok(json!(args.len())),
                    other => Err(HandlerError::new(
                        "UnknownMethodError",
                        format!("no such method: {other}"),
                    )),
                }
            })
        }
    }

    #[test]
    fn test_split_qualified_on_first_separator() {
        assert_eq!(
            split_qualified("LocalFileSystem.readText"),
            Some(("LocalFileSystem", "readText"))
        );
        // Only the first separator splits; the rest stays in the method
        assert_eq!(split_qualified("a.b.c"), Some(("a", "b.c")));
        assert_eq!(split_qualified("RELOAD_APP"), None);
        assert_eq!(split_qualified(".readText"), None);
        assert_eq!(split_qualified("Clipboard."), None);
    }

    #[test]
    fn test_derived_names() {
        let names = ProxyRegistry::derived_names("Clipboard", &Clipboard);
        assert_eq!(names, vec!["Clipboard.readText", "Clipboard.writeText"]);
    }

    #[tokio::test]
    async fn test_resolve_qualified_method() {
        let mut registry = ProxyRegistry::default();
        registry.insert("Clipboard", Arc::new(Clipboard)).unwrap();

        let (target, method) = registry.resolve("Clipboard.readText").expect("resolves");
        assert_eq!(method, "readText");
        assert_eq!(target.invoke(&method, vec![]).await.unwrap(), json!("clip"));
    }

    #[test]
    fn test_resolve_misses() {
        let mut registry = ProxyRegistry::default();
        registry.insert("Clipboard", Arc::new(Clipboard)).unwrap();

        // Unqualified names never match a proxy entry
        assert!(registry.resolve("Clipboard").is_none());
        // Unknown proxy
        assert!(registry.resolve("Unknown.readText").is_none());
        // Method outside the capability's closed set
        assert!(registry.resolve("Clipboard.format").is_none());
    }

    #[test]
    fn test_duplicate_proxy_fails_fast() {
        let mut registry = ProxyRegistry::default();
        registry.insert("Clipboard", Arc::new(Clipboard)).unwrap();

        let err = registry.insert("Clipboard", Arc::new(Clipboard)).unwrap_err();
        assert_eq!(
            err,
            RegisterError::DuplicateProxy {
                name: "Clipboard".into()
            }
        );
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut registry = ProxyRegistry::default();
        registry.insert("Clipboard", Arc::new(Clipboard)).unwrap();

        registry.clear();
        assert!(registry.is_empty());
        registry.clear();
        assert!(registry.is_empty());
    }
}
