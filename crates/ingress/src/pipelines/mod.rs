//! Orchestration pipelines
//!
//! Each run is bracketed by exactly one ledger event: opened as INITIATED,
//! closed as COMPLETED or FAILED. A failed run is reported through its
//! response and event, not as an `Err`; `Err` means the ledger itself could
//! not be written.

mod make_package;
mod register_content;
mod retrieval;
mod upload;

pub use make_package::{PackageInfo, PackageResponse};
pub use register_content::RegisterResponse;
pub use retrieval::RetrievalResponse;
pub use upload::{validate_package_name, TempUpload, UploadResponse};

use std::sync::Arc;

use spf_common::config::IngressConfig;
use spf_common::db::MetadataStore;
use spf_common::metrics::PipelineMetrics;
use spf_common::records::Event;
use spf_common::storage::ObjectStorage;
use tracing::warn;

use crate::errors::{IngressError, Result};
use crate::extractor::ContentExtractor;
use crate::ledger::{failure_annotation, EventUpdate, Ledger};
use crate::package::PackageBuilder;
use crate::registrar::Registrar;
use crate::synchronizer::Synchronizer;
use crate::versioner::Versioner;

/// Result of one pipeline run
#[derive(Debug)]
pub struct Outcome<T> {
    pub event: Event,
    pub response: T,
    /// The run failed on something a redelivery could get past
    pub transient: bool,
}

impl<T> Outcome<T> {
    pub fn failed(&self) -> bool {
        self.event.status == spf_common::records::EventStatus::Failed
    }
}

#[derive(Clone)]
pub struct Pipelines {
    store: Arc<dyn MetadataStore>,
    registrar: Registrar,
    extractor: ContentExtractor,
    versioner: Versioner,
    synchronizer: Synchronizer,
    ledger: Ledger,
    builder: Arc<dyn PackageBuilder>,
    allowed_extension: String,
}

impl Pipelines {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        storage: Arc<dyn ObjectStorage>,
        builder: Arc<dyn PackageBuilder>,
        config: &IngressConfig,
    ) -> Self {
        let registrar = Registrar::new(storage);
        Self {
            extractor: ContentExtractor::new(registrar.clone()),
            versioner: Versioner::new(store.clone()),
            synchronizer: Synchronizer::new(store.clone()),
            ledger: Ledger::new(store.clone()),
            registrar,
            builder,
            store,
            allowed_extension: config.allowed_extension.clone(),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Close `event` according to `result`.
    async fn settle<T>(
        &self,
        event: Event,
        metrics: PipelineMetrics,
        result: Result<T>,
        on_failure: impl FnOnce(&IngressError) -> T,
    ) -> Result<Outcome<T>> {
        match result {
            Ok(response) => {
                let event = self.ledger.complete(event, EventUpdate::completed()).await?;
                metrics.finish("completed");
                Ok(Outcome {
                    event,
                    response,
                    transient: false,
                })
            }
            Err(err) => {
                warn!(event_id = %event.id, error = %err, kind = err.kind(), "Pipeline failed");
                let update = EventUpdate::failed(failure_annotation(err.kind(), &err));
                let event = self.ledger.complete(event, update).await?;
                metrics.finish("failed");
                Ok(Outcome {
                    event,
                    response: on_failure(&err),
                    transient: err.is_transient(),
                })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Pipelines wired to in-memory collaborators

    use std::path::Path;

    use async_trait::async_trait;
    use spf_common::db::InMemoryStore;
    use spf_common::records::{Article, Issue, Journal, RenditionEntry};
    use spf_common::storage::InMemoryObjectStorage;

    use super::*;
    use crate::errors::PackagingError;
    use crate::package::builder::write_package;
    use crate::package::fixtures::SAMPLE_XML;
    use crate::package::BuiltPackage;

    /// Writes a fixed package, or fails with a malformed-XML error.
    pub struct FakeBuilder {
        pub fail: bool,
    }

    #[async_trait]
    impl PackageBuilder for FakeBuilder {
        async fn build(
            &self,
            pid_v3: &str,
            _xml_uri: &str,
            _renditions: &[RenditionEntry],
            out_dir: &Path,
        ) -> std::result::Result<BuiltPackage, PackagingError> {
            if self.fail {
                return Err(PackagingError::MalformedXml("unexpected end of file".to_string()));
            }
            let path = out_dir.join(format!("{pid_v3}.zip"));
            write_package(&path, &[(format!("{pid_v3}.xml"), SAMPLE_XML.as_bytes().to_vec())])?;
            Ok(BuiltPackage {
                path,
                assets: Vec::new(),
            })
        }
    }

    pub struct Harness {
        pub store: Arc<InMemoryStore>,
        pub storage: InMemoryObjectStorage,
        pub pipelines: Pipelines,
    }

    pub fn pipelines_with(
        storage: InMemoryObjectStorage,
        store: Arc<dyn MetadataStore>,
        fail_build: bool,
    ) -> Pipelines {
        Pipelines::new(
            store,
            Arc::new(storage),
            Arc::new(FakeBuilder { fail: fail_build }),
            &IngressConfig::default(),
        )
    }

    /// Store seeded with journal `j1`, issue `i1` and article `S0001`.
    pub async fn harness(storage: InMemoryObjectStorage, fail_build: bool) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_journal(Journal {
                id: "j1".to_string(),
                acronym: Some("abc".to_string()),
                title: Some("Journal ABC".to_string()),
                eissn: Some("1234-5678".to_string()),
                pissn: None,
            })
            .await;
        store
            .insert_issue(Issue {
                id: "i1".to_string(),
                journal_id: "j1".to_string(),
                number: Some("1".to_string()),
                url_segment: Some("2021.v1n1".to_string()),
            })
            .await;

        let mut article = Article::new("S0001");
        article.issue_id = Some("i1".to_string());
        article.journal_id = Some("j1".to_string());
        article.xml = Some("http://minio:9000/spf/S0001.xml".to_string());
        store.save_article(&article).await.unwrap();

        let pipelines = pipelines_with(storage.clone(), store.clone(), fail_build);
        Harness {
            store,
            storage,
            pipelines,
        }
    }
}
