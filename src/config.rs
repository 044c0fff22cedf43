//! Configuration types for invoice-to-spreadsheet conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Every knob lives in one struct so a
//! config can be shared across documents, logged, and compared between runs.
//!
//! The defaults reproduce the production deployment: the master order lives
//! in the `OrdenPreparacion` table of the `SURFACE` sheet of the supply-chain
//! workbook on the *DepartamentodeProducto* SharePoint site, and is cached for
//! three minutes.

use crate::error::InvoiceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Microsoft Graph v1.0 endpoint.
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Where the master-order table lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbookLocation {
    /// Graph API root, without trailing slash.
    pub graph_base_url: String,
    /// SharePoint tenant host, e.g. `contoso.sharepoint.com`.
    pub site_host: String,
    /// Site name as it appears after `/sites/`.
    pub site_name: String,
    /// Path of the workbook inside the site's default document library.
    pub workbook_path: String,
    /// Worksheet holding the table.
    pub sheet: String,
    /// Name of the Excel table (ListObject).
    pub table: String,
    /// Header of the column holding item codes.
    pub column: String,
}

impl Default for WorkbookLocation {
    fn default() -> Self {
        Self {
            graph_base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            site_host: "saboraespana.sharepoint.com".to_string(),
            site_name: "DepartamentodeProducto".to_string(),
            workbook_path:
                "General/Aplicaciones/Cadena de Suministro/Herramienta de Aprovisionamiento v1.0.2.xlsx"
                    .to_string(),
            sheet: "SURFACE".to_string(),
            table: "OrdenPreparacion".to_string(),
            column: "SKU".to_string(),
        }
    }
}

/// What the master-order cache does when a refresh fails.
///
/// | Policy | Fetch fails, cache empty | Fetch fails, cache holds old data |
/// |--------|--------------------------|-----------------------------------|
/// | `FailClosed` | error | error |
/// | `ServeStale` | error | old sequence, marked stale |
/// | `DegradeToEmpty` | empty sequence | empty sequence |
///
/// In every case the previously cached sequence is kept, so the next call
/// retries the fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasterOrderPolicy {
    /// Surface the fetch error. (default)
    #[default]
    FailClosed,
    /// Fall back to the last good sequence when there is one.
    ServeStale,
    /// Carry on without master ordering; rows keep document order.
    DegradeToEmpty,
}

/// How store markers are attached to item lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerPolicy {
    /// An item takes the most recent marker above it. (default)
    #[default]
    Forward,
    /// Items wait for the next marker below them; items after the last marker
    /// take that last marker.
    Lookback,
}

/// Configuration for an invoice conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use invoice2xlsx::{ConversionConfig, MasterOrderPolicy};
///
/// let config = ConversionConfig::builder()
///     .cache_ttl_secs(60)
///     .master_policy(MasterOrderPolicy::ServeStale)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Location of the master-order table.
    pub workbook: WorkbookLocation,

    /// How long a fetched master order stays valid, in seconds. Default: 180.
    pub cache_ttl_secs: u64,

    /// Behaviour when the master order cannot be refreshed. Default: fail closed.
    pub master_policy: MasterOrderPolicy,

    /// Per-request timeout for Graph calls, in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Store-marker attachment policy. Default: forward.
    pub marker_policy: MarkerPolicy,

    /// Explicit libpdfium location (file, or directory containing it).
    /// If None, `PDFIUM_LIB_PATH` and then the system library are tried.
    pub pdfium_library_path: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Prefix of the derived output file name. Default: `Factura_`.
    pub output_prefix: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            workbook: WorkbookLocation::default(),
            cache_ttl_secs: 180,
            master_policy: MasterOrderPolicy::default(),
            request_timeout_secs: 30,
            marker_policy: MarkerPolicy::default(),
            pdfium_library_path: None,
            password: None,
            output_prefix: "Factura_".to_string(),
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("workbook", &self.workbook)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("master_policy", &self.master_policy)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("marker_policy", &self.marker_policy)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("output_prefix", &self.output_prefix)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn workbook(mut self, location: WorkbookLocation) -> Self {
        self.config.workbook = location;
        self
    }

    pub fn graph_base_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.config.workbook.graph_base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn site(mut self, host: impl Into<String>, name: impl Into<String>) -> Self {
        self.config.workbook.site_host = host.into();
        self.config.workbook.site_name = name.into();
        self
    }

    pub fn workbook_path(mut self, path: impl Into<String>) -> Self {
        self.config.workbook.workbook_path = path.into();
        self
    }

    pub fn table(
        mut self,
        sheet: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        self.config.workbook.sheet = sheet.into();
        self.config.workbook.table = table.into();
        self.config.workbook.column = column.into();
        self
    }

    pub fn cache_ttl_secs(mut self, secs: u64) -> Self {
        self.config.cache_ttl_secs = secs;
        self
    }

    pub fn master_policy(mut self, policy: MasterOrderPolicy) -> Self {
        self.config.master_policy = policy;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn marker_policy(mut self, policy: MarkerPolicy) -> Self {
        self.config.marker_policy = policy;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.output_prefix = prefix.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, InvoiceError> {
        let c = &self.config;
        if c.request_timeout_secs == 0 {
            return Err(InvoiceError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        let w = &c.workbook;
        for (field, value) in [
            ("sheet", &w.sheet),
            ("table", &w.table),
            ("column", &w.column),
        ] {
            if value.trim().is_empty() {
                return Err(InvoiceError::InvalidConfig(format!(
                    "Master-order {field} name must not be empty"
                )));
            }
        }
        if !w.graph_base_url.starts_with("http://") && !w.graph_base_url.starts_with("https://")
        {
            return Err(InvoiceError::InvalidConfig(format!(
                "Graph base URL must be http(s), got '{}'",
                w.graph_base_url
            )));
        }
        if c.output_prefix.contains(['/', '\\']) {
            return Err(InvoiceError::InvalidConfig(format!(
                "Output prefix must not contain path separators, got '{}'",
                c.output_prefix
            )));
        }
        Ok(self.config)
    }
}
