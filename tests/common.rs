use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use figment::providers::{Format, Serialized, Yaml};
use figment::Figment;
use passway::config::ModuleOptions;
use passway::{AppContext, Environment, Navigation, Navigator};

/// Navigator that records every navigation instead of routing anywhere.
pub struct RecordingNavigator {
    navigations: Mutex<Vec<Navigation>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        RecordingNavigator {
            navigations: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<Navigation> {
        self.navigations
            .lock()
            .expect("navigation mutex poisoned")
            .clone()
    }

    pub fn recorded_paths(&self) -> Vec<String> {
        self.recorded()
            .into_iter()
            .map(|navigation| navigation.path)
            .collect()
    }
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn navigate(&self, navigation: Navigation) {
        self.navigations
            .lock()
            .expect("navigation mutex poisoned")
            .push(navigation);
    }
}

/// Parses test options the same way the crate loads them: defaults merged
/// under a YAML overlay.
pub fn options_from_yaml(yaml: &str) -> ModuleOptions {
    Figment::from(Serialized::defaults(ModuleOptions::default()))
        .merge(Yaml::string(yaml))
        .extract()
        .expect("test options YAML should parse")
}

pub fn build_context(
    options: ModuleOptions,
    environment: Environment,
) -> (Arc<AppContext>, Arc<RecordingNavigator>) {
    let navigator = Arc::new(RecordingNavigator::new());
    let ctx = Arc::new(AppContext::new(options, navigator.clone(), environment));
    (ctx, navigator)
}
