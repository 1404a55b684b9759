//! In-memory registry used by unit tests.

use crate::digest::Digest;
use crate::error::{Result, RetagError};
use crate::reference::Reference;
use crate::registry::{ImageMetadata, RegistryTransport};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::Mutex;

pub(crate) const DIGEST_A: &str =
    "sha256:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub(crate) const DIGEST_B: &str =
    "sha256:bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

pub(crate) fn digest(s: &str) -> Digest {
    Digest::from_str(s).unwrap()
}

pub(crate) fn created(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, hour, 0, 0).unwrap()
}

pub(crate) fn metadata(d: &str, hour: Option<u32>) -> ImageMetadata {
    ImageMetadata::new(digest(d), hour.map(created))
}

/// Registry fake keyed by the canonical reference string.
#[derive(Default)]
pub(crate) struct FakeTransport {
    images: Mutex<HashMap<String, ImageMetadata>>,
    fetch_failures: Mutex<HashMap<String, VecDeque<RetagError>>>,
    write_failures: Mutex<VecDeque<RetagError>>,
    fetches: Mutex<Vec<String>>,
    writes: Mutex<Vec<(String, String)>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_image(self, reference: &str, metadata: ImageMetadata) -> Self {
        let key = Reference::from_str(reference).unwrap().to_string();
        self.images.lock().unwrap().insert(key, metadata);
        self
    }

    /// Queues failures returned by the next fetches of `reference`.
    pub(crate) fn fail_fetch(self, reference: &str, errors: Vec<RetagError>) -> Self {
        let key = Reference::from_str(reference).unwrap().to_string();
        self.fetch_failures
            .lock()
            .unwrap()
            .entry(key)
            .or_default()
            .extend(errors);
        self
    }

    /// Queues failures returned by the next writes.
    pub(crate) fn fail_write(self, errors: Vec<RetagError>) -> Self {
        self.write_failures.lock().unwrap().extend(errors);
        self
    }

    pub(crate) fn fetch_count(&self, reference: &str) -> usize {
        let key = Reference::from_str(reference).unwrap().to_string();
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|r| **r == key)
            .count()
    }

    pub(crate) fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    pub(crate) fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap().clone()
    }

    pub(crate) fn current(&self, reference: &str) -> Option<ImageMetadata> {
        let key = Reference::from_str(reference).unwrap().to_string();
        self.images.lock().unwrap().get(&key).cloned()
    }

    fn lookup(&self, reference: &Reference) -> Option<ImageMetadata> {
        let images = self.images.lock().unwrap();
        match reference.digest() {
            Some(d) => images
                .iter()
                .find(|(key, m)| {
                    m.digest.to_string() == d
                        && Reference::from_str(key)
                            .is_ok_and(|r| r.repository() == reference.repository())
                })
                .map(|(_, m)| m.clone()),
            None => images.get(&reference.to_string()).cloned(),
        }
    }
}

#[async_trait]
impl RegistryTransport for FakeTransport {
    async fn fetch_metadata(&self, reference: &Reference) -> Result<ImageMetadata> {
        let key = reference.to_string();
        self.fetches.lock().unwrap().push(key.clone());

        if let Some(err) = self
            .fetch_failures
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }

        self.lookup(reference)
            .ok_or_else(|| RetagError::not_found("manifest", key.as_str()))
    }

    async fn put_tag(&self, source: &Reference, destination: &Reference) -> Result<()> {
        self.writes
            .lock()
            .unwrap()
            .push((source.to_string(), destination.to_string()));

        if let Some(err) = self.write_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let metadata = self
            .lookup(source)
            .ok_or_else(|| RetagError::not_found("manifest", source.to_string().as_str()))?;
        self.images
            .lock()
            .unwrap()
            .insert(destination.to_string(), metadata);
        Ok(())
    }
}
