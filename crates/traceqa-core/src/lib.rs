pub mod artifacts;
mod error;
pub mod evaluate;
pub mod expected;
pub mod marker;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod reconstruct;
pub mod warnings;

pub use error::{CoreError, CoreResult};
pub use evaluate::{
    evaluate, EvaluateOptions, FailurePolicy, FaqMatcher, MatchRequest, MatchResponse,
    MatchService,
};
pub use expected::{parse_qa_map, resolve_expected, QaMap};
pub use metrics::overview;
pub use model::{
    EvaluationReport, FaqMatch, LogEntry, MatchFailure, MatchResult, Overview, SeriesStats, Span,
    StepStat, Trace, Transaction, WarningRecord,
};
pub use normalize::{normalize, normalize_str};
pub use reconstruct::{qa_pairs, reconstruct, Reconstructor};
pub use warnings::correlate_warnings;
