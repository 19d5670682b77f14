//! Scan orchestration
//!
//! Drives one capture through upload, the mode's recognition path,
//! normalization, reconciliation and ranking. Individual recognition calls may
//! fail or time out without failing the scan; only capture and upload
//! failures are fatal.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::capture::{CaptureError, CapturedImage};
use super::evidence::{merge_in_order, RecognitionEvidence};
use super::pipeline::{base_product, finish_record, recalculate_record, Draft, ScanOverrides};
use super::services::{
    ImageUploader, ProductDatabase, RecognitionInput, RecognitionService, RecognitionTask, RecordSink,
    ServiceError,
};
use super::session::SessionRegistry;
use super::stages::GENERIC_FOOD_STAGES;
use crate::config::ScanConfig;
use crate::models::{AlternativeCandidate, NutritionRecord, Provenance, ScanMode};
use crate::products::alternatives::{merge_sources, needs_fallback};
use crate::products::{rank_alternatives, select_barcode, ProductQuery, ProductRecord};

const EVENT_CAPACITY: usize = 64;

/// Where a scan session currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "mode", rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Capturing,
    Uploading,
    Recognizing(ScanMode),
    Normalizing,
    Reconciling,
    Ranking,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub session_id: u64,
    pub state: ScanState,
}

/// Caller surface state at the moment of capture
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanContext {
    /// A sheet covering the camera; captures are refused while open
    pub sheet_open: bool,
    pub active_tab: Option<ScanMode>,
    pub locale: Option<String>,
    /// Free-text description from the user, used when recognition finds no title
    pub hint: Option<String>,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Upload failed: {0}")]
    Upload(#[source] ServiceError),

    #[error("Scan session {session_id} was superseded by a newer scan")]
    Superseded { session_id: u64 },
}

/// Result of a single recognition call
#[derive(Debug)]
pub struct StageOutcome {
    pub stage: &'static str,
    pub task: RecognitionTask,
    pub result: Result<RecognitionEvidence, ServiceError>,
}

impl Provenance {
    /// Record a stage outcome and hand back its evidence, if any
    fn absorb(&mut self, outcome: StageOutcome) -> Option<RecognitionEvidence> {
        match outcome.result {
            Ok(evidence) => {
                self.stages_run.push(outcome.stage.to_string());
                Some(evidence)
            }
            Err(_) => {
                self.stages_failed.push(outcome.stage.to_string());
                None
            }
        }
    }
}

/// What a recognition path produced
enum Recognized {
    Evidence {
        evidence: RecognitionEvidence,
        catalog: Option<ProductRecord>,
    },
    Product {
        product: ProductRecord,
        barcode: String,
    },
    Unknown {
        barcode: Option<String>,
    },
}

pub struct Scanner {
    uploader: Arc<dyn ImageUploader>,
    recognizer: Arc<dyn RecognitionService>,
    products: Arc<dyn ProductDatabase>,
    sink: Option<Arc<dyn RecordSink>>,
    config: ScanConfig,
    sessions: SessionRegistry,
    events: broadcast::Sender<ScanEvent>,
}

impl Scanner {
    pub fn new(
        uploader: Arc<dyn ImageUploader>,
        recognizer: Arc<dyn RecognitionService>,
        products: Arc<dyn ProductDatabase>,
        config: ScanConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            uploader,
            recognizer,
            products,
            sink: None,
            config,
            sessions: SessionRegistry::new(),
            events,
        }
    }

    /// Finished records are handed to `sink` without waiting for the write
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    fn emit(&self, session_id: u64, state: ScanState) {
        // no subscribers is fine
        let _ = self.events.send(ScanEvent { session_id, state });
    }

    fn ensure_current(&self, session_id: u64) -> Result<(), ScanError> {
        if self.sessions.is_current(session_id) {
            Ok(())
        } else {
            info!(session = session_id, "scan superseded, discarding late results");
            Err(ScanError::Superseded { session_id })
        }
    }

    fn fail(&self, session_id: u64, err: ScanError) -> ScanError {
        error!(session = session_id, error = %err, "scan failed");
        self.emit(session_id, ScanState::Failed);
        err
    }

    /// Read the image from disk as part of the capture step, then scan it
    pub async fn start_scan_from_path(
        &self,
        path: impl AsRef<std::path::Path>,
        mode: ScanMode,
        context: ScanContext,
    ) -> Result<NutritionRecord, ScanError> {
        match CapturedImage::from_path(path) {
            Ok(image) => self.start_scan(image, mode, context).await,
            Err(err) => {
                let session_id = self.sessions.begin();
                self.emit(session_id, ScanState::Capturing);
                Err(self.fail(session_id, err.into()))
            }
        }
    }

    /// Run one scan session to a finished record
    pub async fn start_scan(
        &self,
        image: CapturedImage,
        mode: ScanMode,
        context: ScanContext,
    ) -> Result<NutritionRecord, ScanError> {
        let session_id = self.sessions.begin();
        let scan_id = uuid::Uuid::new_v4().to_string();
        info!(session = session_id, scan_id = %scan_id, mode = mode.as_str(), locale = ?context.locale, "scan started");

        self.emit(session_id, ScanState::Capturing);
        if context.sheet_open {
            return Err(self.fail(session_id, CaptureError::SheetOpen.into()));
        }
        if let Some(tab) = context.active_tab.filter(|tab| *tab != mode) {
            warn!(
                session = session_id,
                active_tab = tab.as_str(),
                mode = mode.as_str(),
                "active tab disagrees with requested mode, using the mode"
            );
        }

        self.emit(session_id, ScanState::Uploading);
        let url = match self.uploader.upload(&image).await {
            Ok(url) => url,
            Err(err) => return Err(self.fail(session_id, ScanError::Upload(err))),
        };
        self.ensure_current(session_id)?;

        self.emit(session_id, ScanState::Recognizing(mode));
        let mut provenance = Provenance::default();
        let recognized = match mode {
            ScanMode::Barcode => self.recognize_barcode(session_id, &url, &mut provenance).await?,
            ScanMode::Label => self.recognize_label(session_id, &url, &mut provenance).await?,
            ScanMode::GenericFood => self.recognize_generic(session_id, &url, &mut provenance).await?,
        };
        self.ensure_current(session_id)?;

        self.emit(session_id, ScanState::Normalizing);
        let (draft, barcode) = match recognized {
            Recognized::Evidence { evidence, catalog } => {
                let mut draft = Draft::from_evidence(&evidence);
                if draft.title.is_none() {
                    draft.title = context.hint.clone();
                }
                if let Some(product) = catalog {
                    provenance.catalog_fill = draft.fill_from_catalog(&product);
                }
                (draft, None)
            }
            Recognized::Product { product, barcode } => (Draft::from_product(&product), Some(barcode)),
            Recognized::Unknown { barcode } => {
                let mut record = NutritionRecord::unknown(scan_id, mode, barcode);
                provenance.unknown_product = true;
                record.provenance = provenance;
                record.icon = Some(self.config.keywords.default_icon.clone());
                info!(session = session_id, "no usable evidence, returning unknown product");
                return self.complete(session_id, record);
            }
        };

        self.emit(session_id, ScanState::Reconciling);
        let mut record = finish_record(&scan_id, mode, draft, &self.config);
        record.barcode = barcode;
        provenance.unknown_product = record.provenance.unknown_product;
        provenance.water_override = record.provenance.water_override;
        record.provenance = provenance;

        if record.icon.is_none() {
            record.icon = Some(self.select_icon(session_id, &record).await);
        }
        self.ensure_current(session_id)?;

        self.emit(session_id, ScanState::Ranking);
        if !record.provenance.unknown_product {
            let (alternatives, fallback_used) = self.rank(session_id, &record).await;
            record.alternatives = alternatives;
            record.provenance.alternatives_fallback_used = fallback_used;
        }
        self.ensure_current(session_id)?;

        self.complete(session_id, record)
    }

    fn complete(&self, session_id: u64, record: NutritionRecord) -> Result<NutritionRecord, ScanError> {
        self.ensure_current(session_id)?;
        self.emit(session_id, ScanState::Ready);
        info!(
            session = session_id,
            scan_id = %record.scan_id,
            title = %record.title,
            energy_kcal = ?record.energy_kcal_total,
            "scan ready"
        );
        self.persist(&record);
        Ok(record)
    }

    /// Fire-and-forget write; the record is final whether or not it lands
    fn persist(&self, record: &NutritionRecord) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let record = record.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(err) = sink.save(&record) {
                error!(scan_id = %record.scan_id, error = %err, "failed to persist scan");
            }
        });
    }

    /// Rerun reconciliation and ranking with user overrides
    pub async fn recalculate(&self, record: &NutritionRecord, overrides: &ScanOverrides) -> NutritionRecord {
        let next = recalculate_record(record, overrides, &self.config);
        info!(scan_id = %next.scan_id, energy_kcal = ?next.energy_kcal_total, "scan recalculated");
        self.persist(&next);
        next
    }

    async fn call(
        &self,
        session_id: u64,
        stage: &'static str,
        task: RecognitionTask,
        input: RecognitionInput,
        first_attempt: bool,
    ) -> StageOutcome {
        let request = self.recognizer.recognize(input, task);
        let result = if first_attempt {
            let limit = self.config.first_attempt_timeout;
            match tokio::time::timeout(limit, request).await {
                Ok(result) => result,
                Err(_) => Err(ServiceError::Timeout(limit)),
            }
        } else {
            request.await
        };

        let result = result.map(|body| RecognitionEvidence::parse(&body, task));
        match &result {
            Ok(evidence) if evidence.is_empty() => {
                debug!(session = session_id, stage, "stage returned no evidence")
            }
            Ok(_) => debug!(session = session_id, stage, "stage returned evidence"),
            Err(err) => warn!(session = session_id, stage, error = %err, "recognition stage failed, continuing"),
        }
        StageOutcome { stage, task, result }
    }

    async fn recognize_barcode(
        &self,
        session_id: u64,
        url: &str,
        provenance: &mut Provenance,
    ) -> Result<Recognized, ScanError> {
        let outcome = self
            .call(session_id, "digit_ocr", RecognitionTask::DigitOcr, RecognitionInput::ImageUrl(url.to_string()), true)
            .await;
        self.ensure_current(session_id)?;
        let evidence = provenance.absorb(outcome).unwrap_or_default();

        let Some(validated) = select_barcode(&evidence.digits) else {
            warn!(session = session_id, candidates = evidence.digits.len(), "no candidate passed the barcode checksum");
            return Ok(Recognized::Unknown { barcode: None });
        };
        provenance.barcode_validated = true;

        let lookup = self.products.lookup_by_barcode(&validated.code).await;
        self.ensure_current(session_id)?;
        match lookup {
            Ok(Some(product)) => {
                provenance.product_db_hit = true;
                Ok(Recognized::Product {
                    product,
                    barcode: validated.code,
                })
            }
            Ok(None) => {
                info!(session = session_id, code = %validated.code, "barcode not found in product database");
                Ok(Recognized::Unknown {
                    barcode: Some(validated.code),
                })
            }
            Err(err) => {
                warn!(session = session_id, stage = "product_lookup", error = %err, "product lookup failed");
                provenance.stages_failed.push("product_lookup".to_string());
                Ok(Recognized::Unknown {
                    barcode: Some(validated.code),
                })
            }
        }
    }

    async fn recognize_label(
        &self,
        session_id: u64,
        url: &str,
        provenance: &mut Provenance,
    ) -> Result<Recognized, ScanError> {
        let keywords = &self.config.keywords;
        let image = RecognitionInput::ImageUrl(url.to_string());

        // independent passes; merged in fixed order regardless of arrival
        let (label, table) = tokio::join!(
            self.call(session_id, "label", RecognitionTask::LabelParse, image.clone(), true),
            self.call(session_id, "nutrition_table", RecognitionTask::NutritionTableParse, image, true),
        );
        self.ensure_current(session_id)?;
        let mut evidence = merge_in_order([provenance.absorb(label), provenance.absorb(table)].into_iter().flatten());
        evidence.discard_placeholders(keywords);

        if keywords.looks_non_english(&evidence.text_blob()) {
            let payload = serde_json::json!({
                "title": evidence.title,
                "category": evidence.category,
                "items": evidence.items.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            });
            let outcome = self
                .call(
                    session_id,
                    "language_normalization",
                    RecognitionTask::LanguageNormalization,
                    RecognitionInput::Text(payload.to_string()),
                    false,
                )
                .await;
            self.ensure_current(session_id)?;
            if let Some(translated) = provenance.absorb(outcome) {
                evidence.apply_translation(&translated);
                provenance.language_normalized = true;
            }
        }

        let catalog = if Draft::from_evidence(&evidence).has_missing_macros() {
            let query = ProductQuery {
                brand: evidence.brand.clone(),
                title: evidence.title.clone(),
                category: evidence.category.clone(),
            };
            self.catalog_match(session_id, &query).await?
        } else {
            None
        };

        Ok(Recognized::Evidence { evidence, catalog })
    }

    /// First search result carrying per-100g values
    async fn catalog_match(&self, session_id: u64, query: &ProductQuery) -> Result<Option<ProductRecord>, ScanError> {
        if query.search_terms().is_none() {
            return Ok(None);
        }
        let results = self.products.search_by_text(query).await;
        self.ensure_current(session_id)?;
        match results {
            Ok(products) => Ok(products.into_iter().find(|p| !p.per_100g.is_empty())),
            Err(err) => {
                warn!(session = session_id, stage = "catalog_search", error = %err, "catalog search failed");
                Ok(None)
            }
        }
    }

    async fn recognize_generic(
        &self,
        session_id: u64,
        url: &str,
        provenance: &mut Provenance,
    ) -> Result<Recognized, ScanError> {
        let keywords = &self.config.keywords;
        let mut evidence = RecognitionEvidence::default();

        for stage in GENERIC_FOOD_STAGES.iter() {
            if !(stage.runs_when)(&evidence, keywords) {
                debug!(session = session_id, stage = stage.name, "stage not needed");
                continue;
            }
            let outcome = self
                .call(
                    session_id,
                    stage.name,
                    stage.task,
                    RecognitionInput::ImageUrl(url.to_string()),
                    stage.first_attempt,
                )
                .await;
            self.ensure_current(session_id)?;

            if let Some(mut found) = provenance.absorb(outcome) {
                found.discard_placeholders(keywords);
                evidence.merge_missing(found);
            }
            if (stage.halts_when)(&evidence, keywords) {
                info!(session = session_id, stage = stage.name, "usable evidence, stopping fallback chain");
                break;
            }
        }

        let nothing_found = evidence.title.is_none() && evidence.energy_kcal().is_none() && evidence.items.is_empty();
        if nothing_found && evidence.beverage.is_none() {
            return Ok(Recognized::Unknown { barcode: None });
        }
        Ok(Recognized::Evidence {
            evidence,
            catalog: None,
        })
    }

    /// Bounded icon call, then the default icon
    async fn select_icon(&self, session_id: u64, record: &NutritionRecord) -> String {
        let default_icon = self.config.keywords.default_icon.clone();
        if record.provenance.unknown_product {
            return default_icon;
        }
        let text = match &record.category {
            Some(category) => format!("{} ({category})", record.title),
            None => record.title.clone(),
        };
        let outcome = self
            .call(session_id, "icon", RecognitionTask::IconSelection, RecognitionInput::Text(text), true)
            .await;
        outcome
            .result
            .ok()
            .and_then(|e| e.icon)
            .unwrap_or(default_icon)
    }

    async fn rank(&self, session_id: u64, record: &NutritionRecord) -> (Vec<AlternativeCandidate>, bool) {
        let rules = &self.config.ranking;
        let base = base_product(record);
        let query = ProductQuery {
            brand: record.brand.clone(),
            title: Some(record.title.clone()),
            category: record.category.clone(),
        };

        let primary: Vec<AlternativeCandidate> = match self.products.search_by_text(&query).await {
            Ok(products) => products
                .iter()
                .filter(|p| p.barcode.is_none() || p.barcode != record.barcode)
                .filter_map(ProductRecord::to_alternative)
                .collect(),
            Err(err) => {
                warn!(session = session_id, stage = "alternatives_search", error = %err, "alternative search failed");
                Vec::new()
            }
        };

        let mut generated = Vec::new();
        if needs_fallback(&base, &primary, rules) {
            let payload = serde_json::json!({
                "title": record.title,
                "brand": record.brand,
                "category": record.category,
                "calories_per_package_kcal": base.calories_per_package_kcal,
            });
            let outcome = self
                .call(
                    session_id,
                    "alternatives",
                    RecognitionTask::AlternativesGeneration,
                    RecognitionInput::Text(payload.to_string()),
                    false,
                )
                .await;
            generated = outcome.result.map(|e| e.alternatives).unwrap_or_default();
        }

        let (merged, fallback_used) = merge_sources(&base, primary, move || generated, rules);
        (rank_alternatives(&base, merged, rules), fallback_used)
    }
}
