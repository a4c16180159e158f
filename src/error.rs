use thiserror::Error;

/// Ways that building or executing a clip can fail.
///
/// There is no partial-success mode: when `execute` fails, all partial
/// output has already been discarded and the engine can be reused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A coordinate's magnitude exceeds the representable range.
    #[error("coordinate outside allowed range")]
    CoordinateRange,

    /// Open paths may only be added as subject, never as clip.
    #[error("open paths must be subject")]
    OpenClipPath,

    /// Clipping open paths produces open contours, which only the
    /// tree-shaped result can represent.
    #[error("open path clipping requires a PolyTree result")]
    TreeRequired,

    /// The intersection list for a scanbeam could not be reordered into
    /// adjacent-edge-only form.
    #[error("cannot resolve intersection order")]
    IntersectionOrder,

    /// An edge was promoted past the top of its bound.
    #[error("edge promoted past the end of its bound")]
    EdgeChain,

    /// Two edges met at a local maximum in an inconsistent output state.
    #[error("inconsistent output state at local maximum")]
    MaximaMismatch,
}

pub type Result<T> = std::result::Result<T, Error>;
