//! Document providers that turn PDF files into per-page plain text.

use anyhow::Result;
use termpdf_core::DocumentProvider;
use tracing::{info, warn};

#[cfg(feature = "lopdf")]
mod lopdf_backend;
#[cfg(feature = "pdfium")]
mod pdfium_backend;

#[cfg(feature = "lopdf")]
pub use lopdf_backend::LopdfProvider;
#[cfg(feature = "pdfium")]
pub use pdfium_backend::PdfiumProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// pdfium when the library can be bound, lopdf otherwise.
    #[default]
    Auto,
    Pdfium,
    Lopdf,
}

pub fn open_provider(backend: Backend) -> Result<Box<dyn DocumentProvider>> {
    let provider = match backend {
        Backend::Pdfium => pdfium_provider()?,
        Backend::Lopdf => lopdf_provider()?,
        Backend::Auto => match pdfium_provider() {
            Ok(provider) => provider,
            Err(err) => {
                warn!(?err, "pdfium unavailable, falling back to lopdf");
                lopdf_provider()?
            }
        },
    };
    info!(?backend, "document provider ready");
    Ok(provider)
}

#[cfg(feature = "pdfium")]
fn pdfium_provider() -> Result<Box<dyn DocumentProvider>> {
    Ok(Box::new(PdfiumProvider::new()?))
}

#[cfg(not(feature = "pdfium"))]
fn pdfium_provider() -> Result<Box<dyn DocumentProvider>> {
    anyhow::bail!("termpdf was built without pdfium support")
}

#[cfg(feature = "lopdf")]
fn lopdf_provider() -> Result<Box<dyn DocumentProvider>> {
    Ok(Box::new(LopdfProvider))
}

#[cfg(not(feature = "lopdf"))]
fn lopdf_provider() -> Result<Box<dyn DocumentProvider>> {
    anyhow::bail!("termpdf was built without lopdf support")
}
