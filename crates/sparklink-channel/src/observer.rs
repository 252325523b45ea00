use std::sync::Arc;

use parking_lot::Mutex;

/// Receives notifications from a [`Subject`].
pub trait Observer<T>: Send + Sync {
    fn update(&self, content: &T);
}

impl<T, F> Observer<T> for F
where
    F: Fn(&T) + Send + Sync,
{
    fn update(&self, content: &T) {
        self(content)
    }
}

/// Publish/subscribe list of observers.
///
/// Notification works on a snapshot of the list, so observers may attach or
/// detach (themselves included) while a notification is being delivered.
pub struct Subject<T> {
    observers: Mutex<Vec<Arc<dyn Observer<T>>>>,
}

impl<T> Subject<T> {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Register an observer. Attaching the same observer twice is a no-op.
    pub fn attach(&self, observer: Arc<dyn Observer<T>>) {
        let mut observers = self.observers.lock();
        if !observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            observers.push(observer);
        }
    }

    /// Remove an observer; false if it was not attached.
    pub fn detach(&self, observer: &Arc<dyn Observer<T>>) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|o| !Arc::ptr_eq(o, observer));
        observers.len() != before
    }

    pub fn detach_all(&self) {
        self.observers.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.observers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.lock().is_empty()
    }

    /// Deliver `content` to every attached observer.
    pub fn on_state_change(&self, content: &T) {
        let snapshot: Vec<_> = self.observers.lock().clone();
        for observer in snapshot {
            observer.update(content);
        }
    }
}

impl<T> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("observers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct Counter {
        calls: AtomicUsize,
    }

    impl Observer<String> for Counter {
        fn update(&self, _content: &String) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counter() -> (Arc<Counter>, Arc<dyn Observer<String>>) {
        let counter = Arc::new(Counter::default());
        let observer: Arc<dyn Observer<String>> = counter.clone();
        (counter, observer)
    }

    #[test]
    fn attach_and_notify() {
        let subject = Subject::new();
        let (count, observer) = counter();
        subject.attach(observer);
        subject.on_state_change(&"test".to_string());
        assert_eq!(count.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn attach_no_duplicates() {
        let subject = Subject::new();
        let (count, observer) = counter();
        subject.attach(observer.clone());
        subject.attach(observer);
        subject.on_state_change(&"test".to_string());
        assert_eq!(subject.len(), 1);
        assert_eq!(count.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detach() {
        let subject = Subject::new();
        let (count1, observer1) = counter();
        let (count2, observer2) = counter();

        subject.attach(observer1.clone());
        subject.attach(observer2.clone());
        assert!(subject.detach(&observer2));
        subject.on_state_change(&"test".to_string());

        assert!(subject.detach(&observer1));
        subject.on_state_change(&"test".to_string());

        assert!(!subject.detach(&observer1));
        assert_eq!(count1.calls.load(Ordering::SeqCst), 1);
        assert_eq!(count2.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn detach_all() {
        let subject = Subject::new();
        let (count1, observer1) = counter();
        let (count2, observer2) = counter();
        subject.attach(observer1.clone());
        subject.attach(observer2.clone());
        subject.on_state_change(&"test".to_string());

        subject.detach_all();
        subject.on_state_change(&"test".to_string());

        assert!(!subject.detach(&observer1));
        assert!(!subject.detach(&observer2));
        assert_eq!(count1.calls.load(Ordering::SeqCst), 1);
        assert_eq!(count2.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn observer_detaches_itself_during_notification() {
        let subject: Arc<Subject<u32>> = Arc::new(Subject::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Arc<dyn Observer<u32>>>>> = Arc::new(Mutex::new(None));

        let observer: Arc<dyn Observer<u32>> = {
            let subject = Arc::clone(&subject);
            let seen = Arc::clone(&seen);
            let slot = Arc::clone(&slot);
            Arc::new(move |_: &u32| {
                seen.fetch_add(1, Ordering::SeqCst);
                if let Some(me) = slot.lock().take() {
                    subject.detach(&me);
                }
            })
        };
        *slot.lock() = Some(observer.clone());
        subject.attach(observer);

        subject.on_state_change(&1);
        subject.on_state_change(&2);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(subject.is_empty());
    }

    #[test]
    fn closures_are_observers() {
        let subject: Subject<usize> = Subject::new();
        let total = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&total);
        subject.attach(Arc::new(move |n: &usize| {
            sink.fetch_add(*n, Ordering::SeqCst);
        }));
        subject.on_state_change(&3);
        subject.on_state_change(&4);
        assert_eq!(total.load(Ordering::SeqCst), 7);
    }
}
