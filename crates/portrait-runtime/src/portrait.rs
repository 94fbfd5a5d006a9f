//! Descriptor resolution engine
//!
//! [`Portrait`] resolves qualified names through a priority-ordered chain of
//! providers and memoizes the result. Each name moves through
//! `absent → loading → {resolved | absent}`:
//!
//! - a `loading` slot records the thread that owns the resolution;
//! - the owner re-entering the same name is a cycle;
//! - any other thread blocks until the owner settles the slot, unless
//!   waiting would close a cycle of threads waiting on each other, which is
//!   also reported as a cycle.

use crate::descriptor::Descriptor;
use crate::error::{PortraitError, PortraitResult};
use crate::provider::Provider;
use crate::unresolved::UnresolvedDescriptor;
use crate::well_known::WellKnownProvider;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, trace};

/// Memo table entry
#[derive(Clone)]
enum Slot {
    /// Resolution in progress on the given thread
    Loading(ThreadId),
    /// Resolved descriptor
    Resolved(Arc<dyn Descriptor>),
}

/// What a blocked thread is waiting for
#[derive(Debug, Clone, PartialEq, Eq)]
struct WaitEdge {
    owner: ThreadId,
    name: String,
}

/// Resolution engine
///
/// Explicitly constructed and shared by reference; there is no global
/// instance.
pub struct Portrait {
    /// Providers, highest priority first
    providers: Vec<Arc<dyn Provider>>,
    /// Memo table keyed by qualified name
    cache: DashMap<String, Slot>,
    /// Waits-for edges between threads blocked on a loading slot
    waits: Mutex<FxHashMap<ThreadId, WaitEdge>>,
    /// Signalled whenever a loading slot settles
    settled: Condvar,
}

impl Portrait {
    /// Create an engine over `providers`
    ///
    /// Providers are consulted in descending priority; equal priorities keep
    /// their given order.
    pub fn new(mut providers: Vec<Arc<dyn Provider>>) -> Self {
        providers.sort_by_key(|p| std::cmp::Reverse(p.priority()));
        Self {
            providers,
            cache: DashMap::new(),
            waits: Mutex::new(FxHashMap::default()),
            settled: Condvar::new(),
        }
    }

    /// Create an engine over `providers` plus the primitive and array provider
    pub fn with_well_known(mut providers: Vec<Arc<dyn Provider>>) -> Self {
        providers.push(Arc::new(WellKnownProvider::new()));
        Self::new(providers)
    }

    /// Start building an engine
    pub fn builder() -> PortraitBuilder {
        PortraitBuilder::default()
    }

    /// Providers in consultation order
    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    /// Resolve `name`, failing if no provider knows it
    pub fn for_name(&self, name: &str) -> PortraitResult<Arc<dyn Descriptor>> {
        self.load(name)?
            .ok_or_else(|| PortraitError::LookupFailed(name.to_string()))
    }

    /// Resolve `name`, returning `None` if no provider knows it
    pub fn for_name_or_none(&self, name: &str) -> PortraitResult<Option<Arc<dyn Descriptor>>> {
        self.load(name)
    }

    /// Resolve `name`, substituting an unresolved placeholder if no provider
    /// knows it
    ///
    /// Cycles and configuration errors are still reported. Placeholders are
    /// not memoized.
    pub fn for_name_or_unresolved(&self, name: &str) -> PortraitResult<Arc<dyn Descriptor>> {
        Ok(self
            .load(name)?
            .unwrap_or_else(|| Arc::new(UnresolvedDescriptor::new(name))))
    }

    /// Drop every memoized descriptor
    pub fn clear_cache(&self) {
        debug!(entries = self.cache.len(), "clearing descriptor cache");
        self.cache.clear();
        let mut waits = self.waits.lock();
        waits.clear();
        self.settled.notify_all();
    }

    /// Return the engine to its freshly constructed state
    pub fn reset(&self) {
        self.clear_cache();
    }

    /// Number of memoized descriptors
    pub fn cached_len(&self) -> usize {
        self.cache
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Resolved(_)))
            .count()
    }

    /// Check whether `name` has a memoized descriptor
    pub fn is_cached(&self, name: &str) -> bool {
        matches!(self.cache.get(name).as_deref(), Some(Slot::Resolved(_)))
    }

    // ===== Resolution =====

    fn load(&self, name: &str) -> PortraitResult<Option<Arc<dyn Descriptor>>> {
        if self.providers.is_empty() {
            return Err(PortraitError::NoProviders);
        }
        if let Some(Slot::Resolved(descriptor)) = self.cache.get(name).as_deref() {
            trace!(name, "descriptor cache hit");
            return Ok(Some(Arc::clone(descriptor)));
        }

        let me = thread::current().id();
        loop {
            let owner = match self.cache.entry(name.to_string()) {
                Entry::Occupied(entry) => match entry.get() {
                    Slot::Resolved(descriptor) => return Ok(Some(Arc::clone(descriptor))),
                    Slot::Loading(owner) => *owner,
                },
                Entry::Vacant(entry) => {
                    entry.insert(Slot::Loading(me));
                    break;
                }
            };
            if owner == me {
                debug!(name, "re-entrant resolution");
                return Err(PortraitError::CycleDetected(name.to_string()));
            }
            self.wait_for(name, me, owner)?;
        }

        let guard = LoadingGuard {
            portrait: self,
            name,
            owner: me,
            settled: false,
        };
        let found = self.consult(name)?;
        guard.settle(found.clone());
        Ok(found)
    }

    fn consult(&self, name: &str) -> PortraitResult<Option<Arc<dyn Descriptor>>> {
        for provider in &self.providers {
            if let Some(descriptor) = provider.for_name(name, self)? {
                debug!(name, provider = provider.label(), "resolved descriptor");
                return Ok(Some(descriptor));
            }
        }
        debug!(name, "no provider knows type");
        Ok(None)
    }

    /// Block until `owner` no longer holds the loading slot of `name`
    fn wait_for(&self, name: &str, me: ThreadId, owner: ThreadId) -> PortraitResult<()> {
        let mut waits = self.waits.lock();
        while self.is_loading_by(name, owner) {
            let mut cursor = owner;
            for _ in 0..=waits.len() {
                if cursor == me {
                    waits.remove(&me);
                    debug!(name, "cross-thread resolution cycle");
                    return Err(PortraitError::CycleDetected(name.to_string()));
                }
                match waits.get(&cursor) {
                    Some(edge) => cursor = edge.owner,
                    None => break,
                }
            }

            trace!(name, "waiting for concurrent resolution");
            waits.insert(
                me,
                WaitEdge {
                    owner,
                    name: name.to_string(),
                },
            );
            self.settled.wait(&mut waits);
        }
        waits.remove(&me);
        Ok(())
    }

    fn is_loading_by(&self, name: &str, owner: ThreadId) -> bool {
        matches!(self.cache.get(name).as_deref(), Some(Slot::Loading(o)) if *o == owner)
    }

    /// Drop the edges of threads waiting on `owner` for `name`, then wake them
    fn notify_settled(&self, name: &str, owner: ThreadId) {
        // Waiters test the slot while holding the lock, so taking it here
        // orders the notification after their check.
        let mut waits = self.waits.lock();
        waits.retain(|_, edge| edge.owner != owner || edge.name != name);
        self.settled.notify_all();
    }
}

impl Default for Portrait {
    /// Engine with only the well-known provider
    fn default() -> Self {
        Self::builder().well_known().build()
    }
}

impl fmt::Debug for Portrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let providers: Vec<_> = self
            .providers
            .iter()
            .map(|p| (p.label(), p.priority()))
            .collect();
        f.debug_struct("Portrait")
            .field("providers", &providers)
            .field("cached", &self.cached_len())
            .finish()
    }
}

/// Settles a loading slot exactly once, including on early return or panic
struct LoadingGuard<'a> {
    portrait: &'a Portrait,
    name: &'a str,
    owner: ThreadId,
    settled: bool,
}

impl LoadingGuard<'_> {
    fn settle(mut self, found: Option<Arc<dyn Descriptor>>) {
        match found {
            Some(descriptor) => {
                self.portrait
                    .cache
                    .insert(self.name.to_string(), Slot::Resolved(descriptor));
            }
            None => self.release(),
        }
        self.settled = true;
        self.portrait.notify_settled(self.name, self.owner);
    }

    fn release(&self) {
        let owner = self.owner;
        self.portrait
            .cache
            .remove_if(self.name, |_, slot| matches!(slot, Slot::Loading(o) if *o == owner));
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.release();
            self.portrait.notify_settled(self.name, self.owner);
        }
    }
}

/// Builder for [`Portrait`]
#[derive(Default)]
pub struct PortraitBuilder {
    providers: Vec<Arc<dyn Provider>>,
}

impl PortraitBuilder {
    /// Add a provider
    pub fn provider(mut self, provider: impl Provider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Add a shared provider
    pub fn shared_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Add the primitive and array provider
    pub fn well_known(self) -> Self {
        self.provider(WellKnownProvider::new())
    }

    /// Build the engine
    pub fn build(self) -> Portrait {
        Portrait::new(self.providers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorExt;
    use crate::provider::priority;
    use portrait_meta::{TypeDescriptor, TypeKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    /// Descriptor carrying a fixed shape
    #[derive(Debug)]
    struct Shaped(TypeDescriptor);

    impl Descriptor for Shaped {
        fn qualified_name(&self) -> &str {
            &self.0.qualified_name
        }

        fn shape(&self) -> PortraitResult<&TypeDescriptor> {
            Ok(&self.0)
        }
    }

    /// Provider over a fixed hierarchy that eagerly links supertypes
    struct Hierarchy {
        priority: i32,
        parents: Vec<(&'static str, Option<&'static str>)>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl Hierarchy {
        fn new(parents: Vec<(&'static str, Option<&'static str>)>) -> Self {
            Self {
                priority: priority::NATIVE,
                parents,
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }
    }

    impl Provider for Hierarchy {
        fn priority(&self) -> i32 {
            self.priority
        }

        fn for_name(&self, name: &str, portrait: &Portrait) -> PortraitResult<Option<Arc<dyn Descriptor>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let Some((_, parent)) = self.parents.iter().find(|(n, _)| *n == name) else {
                return Ok(None);
            };
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            let mut shape = TypeDescriptor::new(name, TypeKind::Class);
            if let Some(parent) = parent {
                portrait.for_name(parent)?;
                shape.superclass_name = Some(parent.to_string());
            }
            Ok(Some(Arc::new(Shaped(shape))))
        }
    }

    /// Provider answering every name with a tagged descriptor
    struct Tagged(i32, &'static str);

    impl Provider for Tagged {
        fn priority(&self) -> i32 {
            self.0
        }

        fn for_name(&self, name: &str, _portrait: &Portrait) -> PortraitResult<Option<Arc<dyn Descriptor>>> {
            let mut shape = TypeDescriptor::new(name, TypeKind::Class);
            shape.simple_name = self.1.to_string();
            Ok(Some(Arc::new(Shaped(shape))))
        }
    }

    #[test]
    fn test_no_providers() {
        let portrait = Portrait::new(Vec::new());
        assert!(matches!(
            portrait.for_name("a.B"),
            Err(PortraitError::NoProviders)
        ));
        assert!(matches!(
            portrait.for_name_or_unresolved("a.B"),
            Err(PortraitError::NoProviders)
        ));
    }

    #[test]
    fn test_lookup_failed_and_placeholder() {
        let portrait = Portrait::builder()
            .provider(Hierarchy::new(vec![("a.Known", None)]))
            .build();
        assert!(matches!(
            portrait.for_name("a.Missing"),
            Err(PortraitError::LookupFailed(name)) if name == "a.Missing"
        ));
        assert!(portrait.for_name_or_none("a.Missing").unwrap().is_none());
        let placeholder = portrait.for_name_or_unresolved("a.Missing").unwrap();
        assert!(placeholder.is_unresolved());
        assert!(!portrait.is_cached("a.Missing"));
        assert!(!portrait.for_name_or_unresolved("a.Known").unwrap().is_unresolved());
    }

    #[test]
    fn test_memoization() {
        let provider = Arc::new(Hierarchy::new(vec![("a.A", None)]));
        let portrait = Portrait::builder()
            .shared_provider(provider.clone())
            .build();
        let first = portrait.for_name("a.A").unwrap();
        let second = portrait.for_name("a.A").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        portrait.clear_cache();
        assert_eq!(portrait.cached_len(), 0);
        let third = portrait.for_name("a.A").unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_priority_order() {
        let portrait = Portrait::builder()
            .provider(Tagged(priority::NATIVE, "native"))
            .provider(Tagged(priority::GENERATED, "generated"))
            .build();
        let desc = portrait.for_name("a.B").unwrap();
        assert_eq!(desc.simple_name().unwrap(), "generated");
        assert_eq!(portrait.providers()[0].priority(), priority::GENERATED);
    }

    #[test]
    fn test_self_cycle_detected() {
        let portrait = Portrait::builder()
            .provider(Hierarchy::new(vec![("a.A", Some("a.A"))]))
            .build();
        assert!(matches!(
            portrait.for_name("a.A"),
            Err(PortraitError::CycleDetected(name)) if name == "a.A"
        ));
        // The failed resolution leaves no loading marker behind
        assert!(!portrait.is_cached("a.A"));
        assert!(matches!(
            portrait.for_name("a.A"),
            Err(PortraitError::CycleDetected(_))
        ));
    }

    #[test]
    fn test_transitive_cycle_detected() {
        let portrait = Portrait::builder()
            .provider(Hierarchy::new(vec![
                ("a.A", Some("a.B")),
                ("a.B", Some("a.C")),
                ("a.C", Some("a.A")),
            ]))
            .build();
        assert!(matches!(
            portrait.for_name("a.B"),
            Err(PortraitError::CycleDetected(name)) if name == "a.B"
        ));
        assert_eq!(portrait.cached_len(), 0);
    }

    #[test]
    fn test_acyclic_chain_resolves() {
        let portrait = Portrait::builder()
            .provider(Hierarchy::new(vec![
                ("a.Leaf", Some("a.Mid")),
                ("a.Mid", Some("a.Base")),
                ("a.Base", None),
            ]))
            .build();
        let leaf = portrait.for_name("a.Leaf").unwrap();
        assert_eq!(portrait.cached_len(), 3);
        assert!(leaf.is_subclass_of("a.Base", &portrait).unwrap());
        assert!(!leaf.is_subclass_of("a.Other", &portrait).unwrap());
        let base = portrait.for_name("a.Base").unwrap();
        assert!(base.is_assignable_from(&*leaf, &portrait).unwrap());
        assert!(!leaf.is_assignable_from(&*base, &portrait).unwrap());
    }

    #[test]
    fn test_concurrent_first_resolution_blocks() {
        let mut provider = Hierarchy::new(vec![("a.Slow", None)]);
        provider.delay = Some(Duration::from_millis(50));
        let provider = Arc::new(provider);
        let portrait = Arc::new(
            Portrait::builder()
                .shared_provider(provider.clone())
                .build(),
        );

        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let portrait = Arc::clone(&portrait);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    portrait.for_name("a.Slow")
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        for result in &results[1..] {
            assert!(Arc::ptr_eq(&results[0], result));
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_resolution_releases_waiters() {
        struct Failing;

        impl Provider for Failing {
            fn priority(&self) -> i32 {
                priority::NATIVE
            }

            fn for_name(&self, name: &str, _portrait: &Portrait) -> PortraitResult<Option<Arc<dyn Descriptor>>> {
                thread::sleep(Duration::from_millis(20));
                Err(PortraitError::Provider(format!("cannot load {name}")))
            }
        }

        let portrait = Arc::new(Portrait::builder().provider(Failing).build());
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let portrait = Arc::clone(&portrait);
                thread::spawn(move || portrait.for_name("a.Broken"))
            })
            .collect();
        for handle in handles {
            assert!(matches!(
                handle.join().unwrap(),
                Err(PortraitError::Provider(_))
            ));
        }
        assert!(portrait.cache.is_empty());
    }

    #[test]
    fn test_settling_drops_edges_on_that_slot_only() {
        let portrait = Portrait::new(Vec::new());
        let me = thread::current().id();
        let other = thread::spawn(|| thread::current().id()).join().unwrap();
        let third = thread::spawn(|| thread::current().id()).join().unwrap();
        {
            let mut waits = portrait.waits.lock();
            waits.insert(
                other,
                WaitEdge {
                    owner: me,
                    name: "a.Done".to_string(),
                },
            );
            waits.insert(
                third,
                WaitEdge {
                    owner: me,
                    name: "a.Pending".to_string(),
                },
            );
        }
        portrait.cache.insert("a.Done".to_string(), Slot::Loading(me));
        let guard = LoadingGuard {
            portrait: &portrait,
            name: "a.Done",
            owner: me,
            settled: false,
        };
        guard.settle(None);

        let waits = portrait.waits.lock();
        assert!(!waits.contains_key(&other));
        assert_eq!(waits.get(&third).map(|e| e.name.as_str()), Some("a.Pending"));
        drop(waits);
        assert!(portrait.cache.is_empty());
    }

    #[test]
    fn test_default_has_well_known_provider() {
        let portrait = Portrait::default();
        assert!(portrait.for_name("int").unwrap().is_primitive());
        let array = portrait.for_name("[I").unwrap();
        assert_eq!(array.component_type().unwrap().qualified_name(), "int");
        let unknown = portrait.for_name("java.lang.String[]").unwrap();
        assert!(unknown.component_type().unwrap().is_unresolved());
    }
}
