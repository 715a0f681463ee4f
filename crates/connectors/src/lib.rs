//! Dash - Connectors
//!
//! Clients for external reporting APIs, exposed to the export engine as
//! [`ReportProvider`](dash_analytics::ReportProvider) implementations.
//!
//! # Available Connectors
//!
//! - **GA4** - Google Analytics 4 Data API (`runReport`), authenticated with a
//!   service account key or a pre-issued bearer token
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dash_analytics::{ExportPlan, Exporter};
//! use dash_connectors::{Ga4Client, Ga4Config};
//!
//! let ga4 = Ga4Client::new(Ga4Config {
//!     property_id: "279889272".into(),
//!     credentials_file: "/etc/secrets/ga4-credentials.json".into(),
//!     ..Default::default()
//! })?;
//!
//! let exporter = Exporter::new(Arc::new(ga4));
//! let result = exporter.buffered(&ExportPlan::single(window)).await?;
//! ```

mod error;
pub mod ga4;

// Re-exports
pub use error::ConnectorError;
pub use ga4::{DEFAULT_API_URL, Ga4Client, Ga4Config};
