//! Passport photo processor and segmentation engine selection
//!
//! `PassportPhotoProcessor` owns the engine lifecycle: an ordered list of
//! candidate constructors is tried in sequence, the first that succeeds
//! becomes the engine for the processor lifetime, and construction failures
//! are logged and recovered, never propagated. The classical strategy closes
//! every chain because its construction cannot fail, so engine selection
//! always terminates.
//!
//! Inference failures on an already-selected engine advance the same chain;
//! the error is surfaced only when no candidate remains.

use crate::backends::ClassicalSegmenter;
use crate::composite;
use crate::config::{PhotoFormat, RemovalConfig, RemovalStrategy};
use crate::crop::PassportCropper;
use crate::error::{PhotoError, Result};
use crate::facedetect::FaceLocator;
use crate::inference::SegmentationBackend;
use crate::refine::MaskRefiner;
use crate::types::{FaceRegion, ProcessingMetadata, RemovalResult, SegmentationMask};
use image::{DynamicImage, Rgba};
use instant::Instant;
use std::sync::{Mutex, MutexGuard};
use tracing::{instrument, span, Level};

/// Constructor for one engine candidate
///
/// Candidates are closures so tests can inject failing constructors and the
/// neural strategies stay feature-gated without leaking `cfg` into the
/// selection logic.
pub type EngineConstructor =
    Box<dyn Fn(&RemovalConfig) -> Result<Box<dyn SegmentationBackend>> + Send + Sync>;

/// A named engine candidate in the fallback chain
pub struct EngineCandidate {
    /// Strategy name used in logs and result metadata
    pub name: &'static str,
    /// Constructor tried when the chain reaches this candidate
    pub construct: EngineConstructor,
}

impl EngineCandidate {
    pub fn new(
        name: &'static str,
        construct: impl Fn(&RemovalConfig) -> Result<Box<dyn SegmentationBackend>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name,
            construct: Box::new(construct),
        }
    }
}

impl std::fmt::Debug for EngineCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineCandidate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Currently selected engine plus the chain position for further fallback
struct EngineSlot {
    backend: Option<Box<dyn SegmentationBackend>>,
    next_candidate: usize,
}

/// Passport photo pipeline: segmentation, refinement, compositing, cropping
///
/// The engine is selected lazily on first use and reused across requests.
/// Inference sessions are not assumed reentrant, so all engine access is
/// serialized behind one mutex per processor.
pub struct PassportPhotoProcessor {
    config: RemovalConfig,
    candidates: Vec<EngineCandidate>,
    refiner: MaskRefiner,
    face_locator: FaceLocator,
    cropper: PassportCropper,
    engine: Mutex<EngineSlot>,
}

impl PassportPhotoProcessor {
    /// Create a processor with the default candidate chain for the
    /// configured strategy
    ///
    /// # Errors
    /// Returns `PhotoError::InvalidInput` for invalid configuration values.
    pub fn new(config: RemovalConfig) -> Result<Self> {
        let candidates = Self::default_candidates(&config);
        Self::with_candidates(config, candidates)
    }

    /// Create a processor with an explicit candidate chain
    ///
    /// # Errors
    /// Returns `PhotoError::InvalidInput` for invalid configuration values
    /// or an empty candidate list.
    pub fn with_candidates(config: RemovalConfig, candidates: Vec<EngineCandidate>) -> Result<Self> {
        config.validate()?;
        if candidates.is_empty() {
            return Err(PhotoError::invalid_input(
                "Engine candidate chain must not be empty",
            ));
        }
        let refiner = MaskRefiner::new(config.refinement, config.edge_policy);
        Ok(Self {
            config,
            candidates,
            refiner,
            face_locator: FaceLocator::new(),
            cropper: PassportCropper::new(),
            engine: Mutex::new(EngineSlot {
                backend: None,
                next_candidate: 0,
            }),
        })
    }

    /// Default candidate chain for a strategy
    ///
    /// Explicit modes put the requested strategy first; `auto` orders the
    /// neural tensor path before the managed runtime. Every chain ends with
    /// the classical segmenter, whose construction is infallible.
    #[must_use]
    pub fn default_candidates(config: &RemovalConfig) -> Vec<EngineCandidate> {
        let mut candidates = Vec::new();

        let want_neural = matches!(
            config.strategy,
            RemovalStrategy::Auto | RemovalStrategy::Neural
        );
        let want_managed = matches!(
            config.strategy,
            RemovalStrategy::Auto | RemovalStrategy::Managed
        );

        #[cfg(feature = "onnx")]
        if want_neural {
            candidates.push(EngineCandidate::new("neural", |config| {
                Ok(Box::new(crate::backends::NeuralTensorSegmenter::new(config)?))
            }));
        }
        #[cfg(not(feature = "onnx"))]
        if want_neural {
            log::warn!("Neural strategy requested but the onnx feature is disabled");
        }

        #[cfg(feature = "tract")]
        if want_managed {
            candidates.push(EngineCandidate::new("managed", |config| {
                Ok(Box::new(crate::backends::ManagedModelSegmenter::new(config)?))
            }));
        }
        #[cfg(not(feature = "tract"))]
        if want_managed {
            log::warn!("Managed strategy requested but the tract feature is disabled");
        }

        candidates.push(EngineCandidate::new("classical", |config| {
            Ok(Box::new(ClassicalSegmenter::new(config)))
        }));
        candidates
    }

    /// The configuration this processor was built with
    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    /// Name of the currently selected engine, if one has been constructed
    #[must_use]
    pub fn engine_name(&self) -> Option<&'static str> {
        self.engine
            .lock()
            .ok()
            .and_then(|slot| slot.backend.as_ref().map(|backend| backend.name()))
    }

    /// Release the selected engine
    ///
    /// The next request re-runs engine selection from the top of the chain.
    pub fn close(&self) {
        if let Ok(mut slot) = self.engine.lock() {
            if let Some(mut backend) = slot.backend.take() {
                log::debug!("Closing segmentation engine '{}'", backend.name());
                backend.close();
            }
            slot.next_candidate = 0;
        }
    }

    fn lock_engine(&self) -> Result<MutexGuard<'_, EngineSlot>> {
        self.engine
            .lock()
            .map_err(|_| PhotoError::internal("Segmentation engine mutex poisoned"))
    }

    /// Advance the chain until a candidate constructs
    fn select_engine(&self, slot: &mut EngineSlot) -> Result<()> {
        while slot.next_candidate < self.candidates.len() {
            let candidate = &self.candidates[slot.next_candidate];
            slot.next_candidate += 1;
            match (candidate.construct)(&self.config) {
                Ok(backend) => {
                    log::info!("Selected segmentation engine '{}'", candidate.name);
                    slot.backend = Some(backend);
                    return Ok(());
                },
                Err(err) => {
                    log::warn!(
                        "Engine '{}' unavailable, trying next candidate: {err}",
                        candidate.name
                    );
                },
            }
        }
        Err(PhotoError::engine_unavailable(
            "Every candidate in the engine chain failed to construct",
        ))
    }

    /// Segment with the selected engine, falling back along the chain on
    /// inference failure
    fn segment_with_fallback(
        &self,
        image: &DynamicImage,
    ) -> Result<(SegmentationMask, &'static str, bool)> {
        let mut slot = self.lock_engine()?;
        if slot.backend.is_none() {
            self.select_engine(&mut slot)?;
        }

        loop {
            let backend = slot
                .backend
                .as_mut()
                .ok_or_else(|| PhotoError::internal("Engine selection left no backend"))?;

            match backend.segment(image) {
                Ok(mask) => {
                    return Ok((mask, backend.name(), backend.last_run_degraded()));
                },
                Err(err) => {
                    log::warn!(
                        "Engine '{}' failed during inference: {err}",
                        backend.name()
                    );
                    if let Some(mut failed) = slot.backend.take() {
                        failed.close();
                    }
                    if self.select_engine(&mut slot).is_err() {
                        // No fallback remains; surface the inference failure
                        return Err(err);
                    }
                },
            }
        }
    }

    /// Remove the background from an image
    ///
    /// Segments with the selected engine, refines the raw mask, generates an
    /// alpha matte per the configured edge policy and applies it. The result
    /// always has the input dimensions and an alpha channel, regardless of
    /// which strategy ran.
    ///
    /// # Errors
    /// - `PhotoError::InvalidInput` for empty images
    /// - `PhotoError::Inference` when inference failed and no fallback
    ///   candidate remained
    #[instrument(
        skip(self, image),
        fields(
            strategy = %self.config.strategy,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn remove_background(&self, image: &DynamicImage) -> Result<RemovalResult> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PhotoError::invalid_input(
                "Cannot remove background from an empty image",
            ));
        }

        let total_start = Instant::now();

        let segmentation_start = Instant::now();
        let (raw_mask, strategy, degraded) = {
            let _span = span!(Level::INFO, "segmentation").entered();
            self.segment_with_fallback(image)?
        };
        let segmentation_ms = segmentation_start.elapsed().as_millis() as u64;

        let refinement_start = Instant::now();
        let (refined, matte) = {
            let _span = span!(Level::DEBUG, "refinement").entered();
            let refined = self.refiner.refine(&raw_mask)?;
            let matte = self.refiner.to_alpha_matte(&refined)?;
            (refined, matte)
        };
        let refinement_ms = refinement_start.elapsed().as_millis() as u64;

        let compositing_start = Instant::now();
        let rgba = {
            let _span = span!(Level::DEBUG, "compositing").entered();
            composite::apply_alpha(image, &matte)?
        };
        let compositing_ms = compositing_start.elapsed().as_millis() as u64;

        let mut metadata = ProcessingMetadata::new(strategy);
        metadata.degraded = degraded;
        metadata.timings.segmentation_ms = segmentation_ms;
        metadata.timings.refinement_ms = refinement_ms;
        metadata.timings.compositing_ms = compositing_ms;
        metadata.timings.total_ms = total_start.elapsed().as_millis() as u64;

        if degraded {
            log::info!("Segmentation degraded to a heuristic-only mask (strategy '{strategy}')");
        }

        if self.config.debug {
            self.write_debug_artifacts(&raw_mask, &refined, &matte, &metadata);
        }

        Ok(RemovalResult::new(rgba, refined, metadata))
    }

    /// Normalize an image to a passport format
    ///
    /// Removes the background, then (when a format is given) crops around
    /// the face and resizes to the format's exact pixel size. Without a
    /// format only removal and the configured border are applied. A caller
    /// may supply the face rectangle; otherwise the locator runs on the
    /// input image.
    ///
    /// # Errors
    /// - Everything [`Self::remove_background`] can return
    /// - `PhotoError::Geometry` when no crop rectangle fits the image
    pub fn normalize_to_passport(
        &self,
        image: &DynamicImage,
        face: Option<FaceRegion>,
        format: Option<&PhotoFormat>,
    ) -> Result<DynamicImage> {
        let result = self.remove_background(image)?;
        let removed = DynamicImage::ImageRgba8(result.into_image());

        let output = match format {
            Some(format) => {
                let face_start = Instant::now();
                let face = face.unwrap_or_else(|| self.face_locator.locate(image));
                log::debug!(
                    "Face anchor ({}, {}) {}x{} located in {}ms",
                    face.x,
                    face.y,
                    face.width,
                    face.height,
                    face_start.elapsed().as_millis()
                );

                let crop_start = Instant::now();
                let cropped = self.cropper.crop(&removed, &face, format)?;
                log::debug!("Cropped to format in {}ms", crop_start.elapsed().as_millis());
                cropped
            },
            None => removed,
        };

        if self.config.border_width > 0 {
            Ok(composite::add_border(
                &output,
                self.config.border_width,
                Rgba([0, 0, 0, 255]),
            ))
        } else {
            Ok(output)
        }
    }

    fn write_debug_artifacts(
        &self,
        raw_mask: &SegmentationMask,
        refined: &SegmentationMask,
        matte: &SegmentationMask,
        metadata: &ProcessingMetadata,
    ) {
        for (name, mask) in [
            ("debug_raw_mask.png", raw_mask),
            ("debug_refined_mask.png", refined),
            ("debug_alpha_matte.png", matte),
        ] {
            if let Err(err) = mask.save_png(name) {
                log::warn!("Failed to write debug artifact {name}: {err}");
            }
        }
        match serde_json::to_string_pretty(metadata) {
            Ok(json) => {
                if let Err(err) = std::fs::write("debug_metadata.json", json) {
                    log::warn!("Failed to write debug metadata: {err}");
                }
            },
            Err(err) => log::warn!("Failed to serialize debug metadata: {err}"),
        }
    }
}

impl std::fmt::Debug for PassportPhotoProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassportPhotoProcessor")
            .field("strategy", &self.config.strategy)
            .field("candidates", &self.candidates)
            .finish_non_exhaustive()
    }
}
