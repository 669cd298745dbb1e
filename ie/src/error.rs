use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
	/// Template asset missing or undecodable. Fatal for the detector using it.
	#[error("failed to load template {path:?}: {reason}")]
	TemplateLoad { path: PathBuf, reason: String },
	/// Nothing in the frame scored at or above the threshold.
	#[error("no match above threshold (best score {best_score:.3})")]
	NotFound { best_score: f32 },
}
