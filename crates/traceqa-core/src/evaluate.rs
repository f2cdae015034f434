use crate::error::{CoreError, CoreResult};
use crate::expected::QaMap;
use crate::model::{EvaluationReport, FaqMatch, MatchFailure, MatchResult, Transaction};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct MatchRequest<'a> {
    pub query: &'a str,
    pub corpus: &'a [String],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResponse {
    pub matched: String,
    pub score: f64,
}

/// Remote best-match lookup: picks the corpus entry closest to the query.
#[async_trait]
pub trait MatchService: Send + Sync {
    async fn best_match(&self, request: MatchRequest<'_>) -> CoreResult<MatchResponse>;
}

/// Resolves a query to a reference FAQ entry through a [`MatchService`].
pub struct FaqMatcher<S> {
    service: S,
    faqs: QaMap,
    corpus: Vec<String>,
}

impl<S: MatchService> FaqMatcher<S> {
    pub fn new(service: S, faqs: QaMap) -> CoreResult<Self> {
        if faqs.is_empty() {
            return Err(CoreError::validation("reference FAQ corpus is empty"));
        }
        let corpus = faqs.keys().cloned().collect();
        Ok(Self {
            service,
            faqs,
            corpus,
        })
    }

    pub fn corpus(&self) -> &[String] {
        &self.corpus
    }

    pub fn faqs(&self) -> &QaMap {
        &self.faqs
    }

    pub async fn match_query(&self, query: &str) -> CoreResult<FaqMatch> {
        let response = self
            .service
            .best_match(MatchRequest {
                query,
                corpus: &self.corpus,
            })
            .await?;

        if !response.score.is_finite() {
            return Err(CoreError::match_service(format!(
                "non-numeric similarity score for {:?}",
                response.matched
            )));
        }
        let answer = self.faqs.get(&response.matched).ok_or_else(|| {
            CoreError::match_service(format!(
                "matched question {:?} is not in the reference corpus",
                response.matched
            ))
        })?;

        Ok(FaqMatch {
            question: response.matched,
            similarity: response.score.clamp(0.0, 1.0),
            answer: answer.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure and keep going; failed items stay out of accuracy.
    #[default]
    Skip,
    Abort,
}

impl FailurePolicy {
    pub fn parse(raw: &str) -> CoreResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            other => Err(CoreError::validation(format!(
                "unsupported match error policy `{other}`; expected one of: skip, abort"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvaluateOptions {
    pub timeout: Duration,
    pub on_error: FailurePolicy,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            on_error: FailurePolicy::Skip,
        }
    }
}

pub fn accuracy(correct: usize, total: usize) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(100.0 * correct as f64 / total as f64)
    }
}

/// Matches every transaction that has an expected answer, one request at a
/// time, in transaction order.
pub async fn evaluate<S: MatchService>(
    transactions: &[Transaction],
    expected: &QaMap,
    matcher: &FaqMatcher<S>,
    options: &EvaluateOptions,
) -> CoreResult<EvaluationReport> {
    let mut report = EvaluationReport::default();

    for tx in transactions {
        let Some(expected_answer) = expected
            .get(&tx.query)
            .filter(|answer| !answer.trim().is_empty())
        else {
            continue;
        };

        let outcome = match tokio::time::timeout(options.timeout, matcher.match_query(&tx.query))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(CoreError::match_service(format!(
                "timed out after {:.1}s",
                options.timeout.as_secs_f64()
            ))),
        };

        let faq = match outcome {
            Ok(faq) => faq,
            Err(err) => {
                if options.on_error == FailurePolicy::Abort {
                    return Err(err);
                }
                warn!("match failed for query {:?}: {err}", tx.query);
                report.failures.push(MatchFailure {
                    query: tx.query.clone(),
                    error: err.to_string(),
                });
                continue;
            }
        };

        let correct = faq.answer.trim() == expected_answer.trim();
        debug!(
            "matched {:?} -> {:?} (score {:.3}, correct={correct})",
            tx.query, faq.question, faq.similarity
        );
        if correct {
            report.correct_count += 1;
        }
        report.results.push(MatchResult {
            query: tx.query.clone(),
            expected: expected_answer.clone(),
            actual: tx.answer.clone(),
            matched: faq.answer,
            matched_question: faq.question,
            similarity: faq.similarity,
            correct,
        });
    }

    report.accuracy = accuracy(report.correct_count, report.results.len());
    match report.accuracy {
        Some(value) => info!(
            "evaluated {} queries ({} failed): accuracy {value:.1}%",
            report.results.len(),
            report.failures.len()
        ),
        None => info!(
            "no queries evaluated ({} failed)",
            report.failures.len()
        ),
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Answers from a fixed table; unknown queries fail.
    struct TableService {
        answers: HashMap<String, MatchResponse>,
        calls: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl TableService {
        fn new(rows: &[(&str, &str, f64)]) -> Self {
            Self {
                answers: rows
                    .iter()
                    .map(|(query, matched, score)| {
                        (
                            query.to_string(),
                            MatchResponse {
                                matched: matched.to_string(),
                                score: *score,
                            },
                        )
                    })
                    .collect(),
                calls: Mutex::new(Vec::new()),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl MatchService for TableService {
        async fn best_match(&self, request: MatchRequest<'_>) -> CoreResult<MatchResponse> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(request.query.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.answers
                .get(request.query)
                .cloned()
                .ok_or_else(|| CoreError::match_service("connection refused"))
        }
    }

    fn faqs() -> QaMap {
        QaMap::from([
            ("What is AI?".to_string(), "Artificial Intelligence".to_string()),
            ("Opening hours?".to_string(), "9 to 5".to_string()),
        ])
    }

    fn tx(query: &str, answer: &str) -> Transaction {
        Transaction {
            query: query.to_string(),
            answer: Some(answer.to_string()),
            start_time: None,
            end_time: None,
            trace_id: None,
            response_time_ms: Some(1000.0),
            completed: true,
        }
    }

    #[tokio::test]
    async fn no_qualifying_transactions_gives_null_accuracy() {
        let matcher = FaqMatcher::new(TableService::new(&[]), faqs()).expect("matcher");
        let report = evaluate(
            &[tx("unknown", "x")],
            &faqs(),
            &matcher,
            &EvaluateOptions::default(),
        )
        .await
        .expect("evaluation should succeed");

        assert!(report.results.is_empty());
        assert_eq!(report.accuracy, None);
    }

    #[tokio::test]
    async fn accuracy_counts_trimmed_exact_matches() {
        let service = TableService::new(&[
            ("What is AI?", "What is AI?", 0.97),
            ("When do you open?", "What is AI?", 0.41),
            ("Opening times?", "Opening hours?", 0.88),
        ]);
        let matcher = FaqMatcher::new(service, faqs()).expect("matcher");
        let mut expected = faqs();
        expected.insert("When do you open?".to_string(), " 9 to 5 ".to_string());
        // Matched answer is "9 to 5"; only surrounding whitespace differs.
        expected.insert("Opening times?".to_string(), "\t 9 to 5 \n".to_string());

        let transactions = vec![
            tx("What is AI?", "AI is..."),
            tx("When do you open?", "nine"),
            tx("Not expected", "skip me"),
            tx("Opening times?", "nine to five"),
        ];
        let report = evaluate(&transactions, &expected, &matcher, &EvaluateOptions::default())
            .await
            .expect("evaluation should succeed");

        assert_eq!(report.results.len(), 3);
        assert!(report.results[0].correct);
        assert_eq!(report.results[0].actual.as_deref(), Some("AI is..."));
        assert_eq!(report.results[0].matched, "Artificial Intelligence");
        assert!(!report.results[1].correct);
        assert_eq!(report.results[2].matched, "9 to 5");
        assert_eq!(report.results[2].expected, "\t 9 to 5 \n");
        assert!(report.results[2].correct);
        assert_eq!(report.correct_count, 2);
        let accuracy = report.accuracy.expect("accuracy over three results");
        assert!((accuracy - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            *matcher.service.calls.lock().expect("calls lock"),
            vec![
                "What is AI?".to_string(),
                "When do you open?".to_string(),
                "Opening times?".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn failed_matches_are_recorded_and_excluded() {
        let service = TableService::new(&[("What is AI?", "What is AI?", 0.9)]);
        let matcher = FaqMatcher::new(service, faqs()).expect("matcher");

        let transactions = vec![tx("Opening hours?", "?"), tx("What is AI?", "!")];
        let report = evaluate(&transactions, &faqs(), &matcher, &EvaluateOptions::default())
            .await
            .expect("skip policy should not abort");

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].query, "Opening hours?");
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.accuracy, Some(100.0));
    }

    #[tokio::test]
    async fn abort_policy_surfaces_first_failure() {
        let matcher = FaqMatcher::new(TableService::new(&[]), faqs()).expect("matcher");
        let options = EvaluateOptions {
            on_error: FailurePolicy::Abort,
            ..EvaluateOptions::default()
        };

        let err = evaluate(&[tx("What is AI?", "x")], &faqs(), &matcher, &options)
            .await
            .expect_err("abort policy should fail");
        assert!(matches!(err, CoreError::MatchService(_)));
    }

    #[tokio::test]
    async fn slow_match_times_out() {
        let mut service = TableService::new(&[("What is AI?", "What is AI?", 0.9)]);
        service.delay = Some(Duration::from_millis(200));
        let matcher = FaqMatcher::new(service, faqs()).expect("matcher");
        let options = EvaluateOptions {
            timeout: Duration::from_millis(20),
            on_error: FailurePolicy::Skip,
        };

        let report = evaluate(&[tx("What is AI?", "x")], &faqs(), &matcher, &options)
            .await
            .expect("timeouts are skipped");
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.contains("timed out"));
        assert_eq!(report.accuracy, None);
    }

    #[tokio::test]
    async fn unknown_matched_question_is_a_service_error() {
        let service = TableService::new(&[("What is AI?", "Not in corpus", 0.9)]);
        let matcher = FaqMatcher::new(service, faqs()).expect("matcher");

        let err = matcher
            .match_query("What is AI?")
            .await
            .expect_err("unknown question must fail");
        assert!(matches!(err, CoreError::MatchService(message) if message.contains("not in the reference corpus")));
    }

    #[test]
    fn failure_policy_parses_known_values() {
        assert_eq!(FailurePolicy::parse("Skip").expect("skip"), FailurePolicy::Skip);
        assert_eq!(FailurePolicy::parse("abort").expect("abort"), FailurePolicy::Abort);
        assert!(FailurePolicy::parse("retry").is_err());
        assert!(FaqMatcher::new(TableService::new(&[]), QaMap::new()).is_err());
    }
}
