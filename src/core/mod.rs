mod decision;
mod detection;
mod explanation;
mod severity;
mod verdict;

pub use decision::{Decision, RejectPolicy, decide, primary_damage};
pub use detection::{DetectedDamage, DetectionResponse, default_color};
pub use explanation::{OperatorExplanation, explain, known_classes, normalize_class};
pub use severity::{MODERATE_SCORE, SEVERE_SCORE, Severity, SeverityCounts};
pub use verdict::{ClassExplanation, ImageView, Verdict, available_views};
