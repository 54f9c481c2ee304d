use parking_lot::Mutex;
use tokio::sync::watch;

/// Client-side router collaborator.
pub trait Router: Send + Sync {
    fn current_path(&self) -> String;

    /// Imperative navigation, used for forced redirects.
    fn go_to(&self, path: &str);

    /// Path changes from any source, including back/forward.
    fn subscribe(&self) -> watch::Receiver<String>;
}

/// In-process router that records every imperative navigation.
pub struct MemoryRouter {
    sender: watch::Sender<String>,
    history: Mutex<Vec<String>>,
}

impl MemoryRouter {
    pub fn new(initial_path: &str) -> Self {
        let (sender, _) = watch::channel(initial_path.to_string());
        Self {
            sender,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Simulate a path change the navigator did not ask for.
    pub fn external_change(&self, path: &str) {
        self.sender.send_replace(path.to_string());
    }

    /// Paths passed to [`Router::go_to`], oldest first.
    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }
}

impl Default for MemoryRouter {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Router for MemoryRouter {
    fn current_path(&self) -> String {
        self.sender.borrow().clone()
    }

    fn go_to(&self, path: &str) {
        self.history.lock().push(path.to_string());
        self.sender.send_if_modified(|current| {
            if current == path {
                false
            } else {
                *current = path.to_string();
                true
            }
        });
    }

    fn subscribe(&self) -> watch::Receiver<String> {
        self.sender.subscribe()
    }
}
