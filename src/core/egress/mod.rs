//! Egress: session logs, consumed-file disposal and FHIR publishing

pub mod consume;
pub mod publish;
pub mod session_log;

pub use consume::{consume_ingressed, ConsumeActivity, ConsumedEntry};
pub use publish::{fhir_bundle_files, is_fhir_bundle_file, FhirPublisher, PublishResult};
pub use session_log::{read_session_end, write_session_log, SessionEnd, SessionStart};
