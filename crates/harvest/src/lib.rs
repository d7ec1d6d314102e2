//! Test-case harvester
//!
//! This crate pulls test scripts out of a test-management web UI and stores
//! them as plain-text files:
//! - Launches a browser, or attaches to one the user is already logged into
//! - Enumerates test cases from a listing page (or an explicit key list)
//! - Extracts each test script through an ordered list of fallbacks
//! - Writes one file per test case with a fixed provenance header
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    harvest(session, config)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Session (CdpSession | test double)                         │
//! │    └── active_page(hint) -> Page                            │
//! │  Enumerator                                                 │
//! │    └── enumerate(page, source) -> Enumeration               │
//! │  RunCoordinator                                             │
//! │    ├── ContentExtractor::extract(page, case)                │
//! │    │     ├── navigate + settle                              │
//! │    │     ├── activate "Test Script" tab                     │
//! │    │     └── Container -> Table -> MainRegion               │
//! │    ├── ArtifactWriter::write(id, title, content)            │
//! │    └── RunSummary { attempted, succeeded, failed }          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RunReport -> harvest-report.json                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifact;
pub mod browser;
pub mod cdp;
pub mod config;
pub mod enumerate;
pub mod error;
pub mod extract;
pub mod import;
pub mod runner;
pub mod session;

pub use artifact::{ArtifactWriter, Provenance, WrittenArtifact};
pub use browser::{Element, Locator, Page};
pub use cdp::CdpSession;
pub use config::{HarvestConfig, Mode};
pub use enumerate::{CaseSource, Enumeration, Enumerator, TestCaseRef};
pub use error::{HarvestError, HarvestResult};
pub use extract::{ContentExtractor, ContentSource, ContentStrategy, ExtractionResult};
pub use import::{import_paste, ImportOptions};
pub use runner::{harvest, RunCoordinator, RunReport, RunState, RunSummary};
pub use session::{Session, SessionMode};
