//! In-memory fakes for the catalog and the subscription bus.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use catalog_client::{
    CatalogError, CatalogResult, CoverageList, CoverageRef, Granule, GranuleCollection,
    GranuleProperties, MosaicCatalog, RemoteGranule, StoreRef,
};
use mosaic_sync::{Notification, Subscribe, SubscriberOptions, Subscription, SyncResult};
use tokio::sync::broadcast;

/// Call-recording catalog fake whose granule set reflects additions.
pub struct FakeCatalog {
    pub granules: Mutex<Vec<Granule>>,
    pub store_exists: bool,
    pub fail_add: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn new(locations: &[&str]) -> Self {
        Self::with_times(&locations.iter().map(|l| (*l, None)).collect::<Vec<_>>())
    }

    pub fn with_times(locations: &[(&str, Option<&str>)]) -> Self {
        let granules = locations
            .iter()
            .enumerate()
            .map(|(index, (location, time))| Granule {
                id: format!("granule.{}", index),
                properties: GranuleProperties {
                    location: location.to_string(),
                    time: time.map(str::to_string),
                },
            })
            .collect();
        Self {
            granules: Mutex::new(granules),
            store_exists: true,
            fail_add: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_named(&self, name: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(name))
            .collect()
    }

    pub fn locations(&self) -> Vec<String> {
        self.granules
            .lock()
            .unwrap()
            .iter()
            .map(|granule| granule.properties.location.clone())
            .collect()
    }
}

#[async_trait]
impl MosaicCatalog for FakeCatalog {
    async fn get_store(&self, workspace: &str, store: &str) -> CatalogResult<Option<StoreRef>> {
        self.record(format!("get_store:{}:{}", workspace, store));
        if self.store_exists {
            Ok(Some(StoreRef {
                workspace: workspace.to_string(),
                name: store.to_string(),
            }))
        } else {
            Ok(None)
        }
    }

    async fn mosaic_coverages(&self, store: &StoreRef) -> CatalogResult<CoverageList> {
        self.record(format!("mosaic_coverages:{}", store.name));
        Ok(CoverageList {
            coverages: vec![CoverageRef {
                name: store.name.clone(),
                href: None,
            }],
        })
    }

    async fn list_granules(
        &self,
        coverage: &str,
        _store: &StoreRef,
    ) -> CatalogResult<GranuleCollection> {
        self.record(format!("list_granules:{}", coverage));
        Ok(GranuleCollection {
            features: self.granules.lock().unwrap().clone(),
        })
    }

    async fn add_granule(
        &self,
        _workspace: &str,
        _store: &str,
        file_path: &str,
    ) -> CatalogResult<()> {
        self.record(format!("add_granule:{}", file_path));
        if self.fail_add {
            return Err(CatalogError::request("503: service unavailable"));
        }
        let mut granules = self.granules.lock().unwrap();
        let id = format!("granule.{}", granules.len());
        granules.push(Granule {
            id,
            properties: GranuleProperties {
                location: file_path.to_string(),
                time: None,
            },
        });
        Ok(())
    }

    async fn delete_granule(
        &self,
        _coverage: &str,
        _store: &StoreRef,
        granule_id: &str,
    ) -> CatalogResult<()> {
        self.record(format!("delete_granule:{}", granule_id));
        self.granules
            .lock()
            .unwrap()
            .retain(|granule| granule.id != granule_id);
        Ok(())
    }

    async fn add_remote_granule(&self, remote: &RemoteGranule) -> CatalogResult<()> {
        self.record(format!("add_remote_granule:{}", remote.image_url));
        let mut granules = self.granules.lock().unwrap();
        let id = format!("granule.{}", granules.len());
        granules.push(Granule {
            id,
            properties: GranuleProperties {
                location: remote.image_url.clone(),
                time: None,
            },
        });
        Ok(())
    }
}

/// Subscriber fake that plays scripted notification sessions.
///
/// Each session is a list of `Option<Notification>` handed out one per
/// `recv` call. When a session (or the session list) runs dry, the fake
/// fires the shutdown channel and blocks, so the adder exits cleanly.
pub struct ScriptedSubscriber {
    sessions: Mutex<VecDeque<Vec<Option<Notification>>>>,
    shutdown: broadcast::Sender<()>,
    opens: AtomicUsize,
}

impl ScriptedSubscriber {
    pub fn new(
        sessions: Vec<Vec<Option<Notification>>>,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            sessions: Mutex::new(sessions.into()),
            shutdown,
            opens: AtomicUsize::new(0),
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Subscribe for ScriptedSubscriber {
    async fn open(&self, _options: &SubscriberOptions) -> SyncResult<Box<dyn Subscription>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let items = self
            .sessions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Ok(Box::new(ScriptedSubscription {
            items: items.into(),
            shutdown: self.shutdown.clone(),
        }))
    }
}

struct ScriptedSubscription {
    items: VecDeque<Option<Notification>>,
    shutdown: broadcast::Sender<()>,
}

#[async_trait]
impl Subscription for ScriptedSubscription {
    async fn recv(&mut self, _timeout: Duration) -> SyncResult<Option<Notification>> {
        match self.items.pop_front() {
            Some(item) => Ok(item),
            None => {
                let _ = self.shutdown.send(());
                futures::future::pending().await
            }
        }
    }
}

pub fn notification(productname: &str, uri: &str) -> Notification {
    Notification {
        productname: productname.to_string(),
        uri: uri.to_string(),
    }
}
