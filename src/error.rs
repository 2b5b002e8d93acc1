/// Everything that can go wrong outside the per-frame cycle, plus the two precondition checks
/// (selection size and corner count) that guard the core computations.
#[derive(thiserror::Error, Debug)]
pub enum ArError {
	#[error("frame source acquisition failed: {0}")]
	Acquisition(String),
	#[error("the session has not been started")]
	NotStarted,
	#[error("cannot select markers from an empty dictionary")]
	EmptyDictionary,
	#[error("requested {requested} markers but the dictionary holds {available}")]
	SelectionSize { requested: usize, available: usize },
	#[error("expected {expected} marker corners, found {found}")]
	CornerCount { expected: usize, found: usize },
	#[error("unknown dictionary '{0}'")]
	UnknownDictionary(String),
	#[error("invalid marker model: {0}")]
	InvalidMarker(String),
	#[error(transparent)]
	Config(#[from] serde_json::Error),
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ArError>;
