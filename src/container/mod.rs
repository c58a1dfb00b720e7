//! Type-keyed registry of factories and shared instances.

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::Error;

type Instance = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&Container) -> Result<Instance, Error> + Send + Sync>;

/// How long a resolved instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Created on first resolution and shared for the life of the container.
    Singleton,
    /// Created anew on every resolution.
    Transient,
}

struct Registration {
    type_name: &'static str,
    lifetime: Lifetime,
    factory: Factory,
    instance: OnceCell<Instance>,
}

impl Registration {
    fn instantiate(&self, container: &Container) -> Result<Instance, Error> {
        match self.lifetime {
            Lifetime::Transient => (self.factory)(container),
            // Concurrent callers block until the first factory call finishes.
            Lifetime::Singleton => self
                .instance
                .get_or_try_init(|| (self.factory)(container))
                .map(Arc::clone),
        }
    }
}

thread_local! {
    static RESOLVING: RefCell<Vec<TypeId>> = const { RefCell::new(Vec::new()) };
}

/// Marks a type as being resolved on this thread until dropped.
struct ResolutionGuard;

impl ResolutionGuard {
    fn enter(id: TypeId, type_name: &'static str) -> Result<Self, Error> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&id) {
                return Err(Error::CircularDependency(type_name));
            }
            stack.push(id);
            Ok(Self)
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Maps each registered type to the factory that produces it.
///
/// Built once at startup and then shared by reference; resolution only needs `&self`.
///
/// ## Example
///
/// ```
/// use appsettings_di::{Container, Lifetime};
///
/// let mut container = Container::new();
/// container.register_instance(String::from("shared"));
/// container.register(Lifetime::Transient, |c| {
///     let name = c.resolve::<String>()?;
///     Ok(name.len())
/// });
///
/// assert_eq!(*container.resolve::<usize>()?, 6);
/// # Ok::<(), appsettings_di::Error>(())
/// ```
#[derive(Default)]
pub struct Container {
    registrations: HashMap<TypeId, Registration>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for `T`. The factory may resolve other registrations.
    ///
    /// A later registration for the same type replaces this one.
    pub fn register<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, Error> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |container| {
            let value = factory(container)?;
            Ok(Arc::new(value) as Instance)
        });
        self.insert::<T>(Registration {
            type_name: type_name::<T>(),
            lifetime,
            factory,
            instance: OnceCell::new(),
        })
    }

    /// Registers an already-built value as a singleton.
    pub fn register_instance<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        let instance: Instance = Arc::new(value);
        let factory_instance = Arc::clone(&instance);
        let factory: Factory = Arc::new(move |_| Ok(Arc::clone(&factory_instance)));
        self.insert::<T>(Registration {
            type_name: type_name::<T>(),
            lifetime: Lifetime::Singleton,
            factory,
            instance: OnceCell::with_value(instance),
        })
    }

    fn insert<T: 'static>(&mut self, registration: Registration) -> &mut Self {
        let type_name = registration.type_name;
        let lifetime = registration.lifetime;
        if self.registrations.insert(TypeId::of::<T>(), registration).is_some() {
            tracing::warn!(type_name, "replacing existing registration");
        }
        tracing::debug!(type_name, ?lifetime, "registered");
        self
    }

    /// Resolves `T`, failing with [`Error::UnregisteredType`] if nothing was registered.
    ///
    /// A factory that, directly or through other registrations, resolves the type it
    /// is producing fails with [`Error::CircularDependency`].
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, Error> {
        let id = TypeId::of::<T>();
        let registration = self
            .registrations
            .get(&id)
            .ok_or(Error::UnregisteredType(type_name::<T>()))?;

        let instance = {
            let _guard = ResolutionGuard::enter(id, registration.type_name)?;
            registration.instantiate(self)?
        };
        tracing::debug!(type_name = registration.type_name, "resolved");
        // Factories are wrapped per `T` in `register`, so a mismatch means the map was built wrong.
        instance
            .downcast::<T>()
            .map_err(|_| Error::InstanceTypeMismatch(type_name::<T>()))
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut registered: Vec<_> = self
            .registrations
            .values()
            .map(|r| (r.type_name, r.lifetime))
            .collect();
        registered.sort_unstable_by_key(|(name, _)| *name);
        f.debug_struct("Container")
            .field("registrations", &registered)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    struct Greeting(String);

    #[test]
    fn test_resolve_unregistered_type_fails() {
        let container = Container::new();

        let result = container.resolve::<Greeting>();

        match result {
            Err(Error::UnregisteredType(name)) => assert!(name.ends_with("Greeting")),
            other => panic!("expected unregistered type error, got {other:?}"),
        }
    }

    #[test]
    fn test_instance_is_shared() {
        let mut container = Container::new();
        container.register_instance(Greeting("hi".into()));

        let a = container.resolve::<Greeting>().unwrap();
        let b = container.resolve::<Greeting>().unwrap();

        assert_eq!(*a, Greeting("hi".into()));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_singleton_factory_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut container = Container::new();
        container.register(Lifetime::Singleton, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Greeting("lazy".into()))
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let a = container.resolve::<Greeting>().unwrap();
        let b = container.resolve::<Greeting>().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_transient_factory_runs_every_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut container = Container::new();
        container.register(Lifetime::Transient, move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(Greeting(format!("call {n}")))
        });

        let a = container.resolve::<Greeting>().unwrap();
        let b = container.resolve::<Greeting>().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(a.0, "call 0");
        assert_eq!(b.0, "call 1");
    }

    #[test]
    fn test_factory_resolves_dependencies() {
        let mut container = Container::new();
        container
            .register_instance(String::from("world"))
            .register(Lifetime::Transient, |c| {
                let name = c.resolve::<String>()?;
                Ok(Greeting(format!("hello {name}")))
            });

        let greeting = container.resolve::<Greeting>().unwrap();

        assert_eq!(greeting.0, "hello world");
    }

    #[test]
    fn test_factory_error_propagates() {
        let mut container = Container::new();
        container.register(Lifetime::Singleton, |c| {
            let name = c.resolve::<String>()?;
            Ok(Greeting(name.to_string()))
        });

        assert!(matches!(
            container.resolve::<Greeting>(),
            Err(Error::UnregisteredType(_))
        ));
    }

    #[test]
    fn test_second_registration_replaces_first() {
        let mut container = Container::new();
        container.register_instance(Greeting("first".into()));
        container.register_instance(Greeting("second".into()));

        assert_eq!(container.len(), 1);
        assert_eq!(container.resolve::<Greeting>().unwrap().0, "second");
    }

    #[test]
    fn test_concurrent_singleton_factory_runs_once() {
        const THREADS: usize = 8;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut container = Container::new();
        container.register(Lifetime::Singleton, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            Ok(Greeting("slow".into()))
        });
        let container = Arc::new(container);
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let container = Arc::clone(&container);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    container.resolve::<Greeting>().unwrap()
                })
            })
            .collect();
        let resolved: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(resolved.iter().all(|g| Arc::ptr_eq(g, &resolved[0])));
    }

    #[test]
    fn test_self_dependency_fails() {
        let mut container = Container::new();
        container.register(Lifetime::Transient, |c| {
            let inner = c.resolve::<Greeting>()?;
            Ok(Greeting(inner.0.clone()))
        });

        match container.resolve::<Greeting>() {
            Err(Error::CircularDependency(name)) => assert!(name.ends_with("Greeting")),
            other => panic!("expected circular dependency, got {other:?}"),
        }
    }

    #[test]
    fn test_indirect_cycle_fails_and_container_recovers() {
        let mut container = Container::new();
        container
            .register(Lifetime::Singleton, |c| {
                let name = c.resolve::<String>()?;
                Ok(Greeting(name.to_string()))
            })
            .register(Lifetime::Singleton, |c| {
                let greeting = c.resolve::<Greeting>()?;
                Ok(greeting.0.clone())
            });

        assert!(matches!(
            container.resolve::<Greeting>(),
            Err(Error::CircularDependency(_))
        ));
        assert!(matches!(
            container.resolve::<String>(),
            Err(Error::CircularDependency(_))
        ));

        container.register_instance(String::from("fixed"));
        assert_eq!(container.resolve::<Greeting>().unwrap().0, "fixed");
    }

    #[test]
    fn test_type_mismatch_is_reported_distinctly() {
        let mismatch = Error::InstanceTypeMismatch(type_name::<Greeting>());
        let unregistered = Error::UnregisteredType(type_name::<Greeting>());

        assert!(mismatch.to_string().contains("another type"));
        assert_ne!(mismatch.to_string(), unregistered.to_string());
    }

    #[test]
    fn test_container_is_shareable_across_threads() {
        let mut container = Container::new();
        container.register_instance(Greeting("shared".into()));
        let container = Arc::new(container);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let container = Arc::clone(&container);
                std::thread::spawn(move || container.resolve::<Greeting>().unwrap().0.clone())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "shared");
        }
    }
}
