//! In-memory face recognition service
//!
//! Images are keyed by URL. `identify` returns the scripted candidates
//! unfiltered, so confidence handling is left to the client under test.

use async_trait::async_trait;
use facetag::recognition::{FaceError, FaceService};
use facetag::types::{Candidate, FaceId, FaceIdentification, IdentityId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct FakeFaceService {
    /// URL -> detected faces in order
    images: Mutex<HashMap<String, Vec<FaceId>>>,
    candidates: Mutex<HashMap<FaceId, Vec<Candidate>>>,
    broken_urls: Mutex<HashSet<String>>,
    group_exists: AtomicBool,
    fail_group_creation: AtomicBool,
    fail_training: AtomicBool,
    persons: Mutex<Vec<(IdentityId, String)>>,
    person_faces: Mutex<HashMap<IdentityId, Vec<String>>>,
    next_face: AtomicUsize,
    trainings: AtomicUsize,
    calls: Mutex<Vec<String>>,
    /// Cancelled once this many detections have been requested
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
}

impl FakeFaceService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script one image: each face with its (identity, confidence) candidates
    pub fn add_image(&self, url: &str, faces: &[&[(&str, f64)]]) {
        let mut face_ids = Vec::new();
        for face in faces {
            let n = self.next_face.fetch_add(1, Ordering::SeqCst);
            let face_id = FaceId::new(format!("face-{}", n));
            self.candidates.lock().unwrap().insert(
                face_id.clone(),
                face.iter()
                    .map(|(identity, confidence)| Candidate {
                        identity_id: IdentityId::new(*identity),
                        confidence: *confidence,
                    })
                    .collect(),
            );
            face_ids.push(face_id);
        }
        self.images.lock().unwrap().insert(url.to_string(), face_ids);
    }

    /// Script an image with `count` faces that match nobody
    pub fn add_crowd(&self, url: &str, count: usize) {
        let no_match: &[(&str, f64)] = &[];
        let faces = vec![no_match; count];
        self.add_image(url, &faces);
    }

    /// Requests for this URL fail as an unreachable image
    pub fn break_url(&self, url: &str) {
        self.broken_urls.lock().unwrap().insert(url.to_string());
    }

    /// Cancel `token` when the `detections`-th detection is requested
    pub fn cancel_after_detections(&self, detections: usize, token: CancellationToken) {
        *self.cancel_after.lock().unwrap() = Some((detections, token));
    }

    pub fn set_group_exists(&self) {
        self.group_exists.store(true, Ordering::SeqCst);
    }

    pub fn fail_group_creation(&self) {
        self.fail_group_creation.store(true, Ordering::SeqCst);
    }

    pub fn fail_training(&self) {
        self.fail_training.store(true, Ordering::SeqCst);
    }

    pub fn persons(&self) -> Vec<(IdentityId, String)> {
        self.persons.lock().unwrap().clone()
    }

    pub fn faces_of(&self, person: &IdentityId) -> Vec<String> {
        self.person_faces
            .lock()
            .unwrap()
            .get(person)
            .cloned()
            .unwrap_or_default()
    }

    pub fn trainings(&self) -> usize {
        self.trainings.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn invalid_url(url: &str) -> FaceError {
        FaceError::Api {
            status: 400,
            code: "InvalidURL".to_string(),
            message: format!("Invalid image URL {}", url),
        }
    }
}

#[async_trait]
impl FaceService for FakeFaceService {
    async fn detect_faces(&self, image_url: &str) -> Result<Vec<FaceId>, FaceError> {
        self.calls.lock().unwrap().push(format!("detect:{}", image_url));
        if let Some((after, token)) = &*self.cancel_after.lock().unwrap() {
            if self.count_calls("detect:") >= *after {
                token.cancel();
            }
        }
        if self.broken_urls.lock().unwrap().contains(image_url) {
            return Err(Self::invalid_url(image_url));
        }
        Ok(self
            .images
            .lock()
            .unwrap()
            .get(image_url)
            .cloned()
            .unwrap_or_default())
    }

    async fn identify(
        &self,
        _group_id: &str,
        face_ids: &[FaceId],
        _max_candidates: u32,
        _min_confidence: f64,
    ) -> Result<Vec<FaceIdentification>, FaceError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("identify:{}", face_ids.len()));
        let candidates = self.candidates.lock().unwrap();
        Ok(face_ids
            .iter()
            .map(|face_id| FaceIdentification {
                face_id: face_id.clone(),
                candidates: candidates.get(face_id).cloned().unwrap_or_default(),
            })
            .collect())
    }

    async fn create_group(&self, group_id: &str, _name: &str) -> Result<(), FaceError> {
        self.calls.lock().unwrap().push(format!("create_group:{}", group_id));
        if self.fail_group_creation.load(Ordering::SeqCst) {
            return Err(FaceError::InvalidKey);
        }
        if self.group_exists.swap(true, Ordering::SeqCst) {
            return Err(FaceError::GroupExists);
        }
        Ok(())
    }

    async fn create_person(&self, _group_id: &str, name: &str) -> Result<IdentityId, FaceError> {
        self.calls.lock().unwrap().push(format!("create_person:{}", name));
        let mut persons = self.persons.lock().unwrap();
        let id = IdentityId::new(format!("person-{}", persons.len() + 1));
        persons.push((id.clone(), name.to_string()));
        Ok(id)
    }

    async fn add_person_face(
        &self,
        _group_id: &str,
        person_id: &IdentityId,
        image_url: &str,
    ) -> Result<(), FaceError> {
        self.calls.lock().unwrap().push(format!("add_face:{}", image_url));
        if self.broken_urls.lock().unwrap().contains(image_url) {
            return Err(Self::invalid_url(image_url));
        }
        self.person_faces
            .lock()
            .unwrap()
            .entry(person_id.clone())
            .or_default()
            .push(image_url.to_string());
        Ok(())
    }

    async fn train_group(&self, group_id: &str) -> Result<(), FaceError> {
        self.calls.lock().unwrap().push(format!("train:{}", group_id));
        if self.fail_training.load(Ordering::SeqCst) {
            return Err(FaceError::Api {
                status: 409,
                code: "PersonGroupTrainingNotFinished".to_string(),
                message: "Training already in progress".to_string(),
            });
        }
        self.trainings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
