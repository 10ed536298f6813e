use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use ordered_float::NotNan;
use tracing::{debug, warn};

use crate::gateway::{GatewayError, MetadataGateway};
use crate::media::{Candidate, CandidateKey, MediaType};
use crate::parser::{ParsedFilename, collapse_whitespace};
use crate::search_terms::{SearchQuery, term_specificity};

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "of", "and", "or", "to", "in", "on", "at", "for", "with", "from", "by",
];

/// Lower-cased title with punctuation folded to single spaces, plus its
/// significant words.
#[derive(Debug, Clone)]
struct TitleKey {
    normalized: String,
    words: HashSet<String>,
}

impl TitleKey {
    fn new(raw: &str) -> Self {
        let spaced: String = raw
            .chars()
            .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
            .collect();
        let normalized = collapse_whitespace(&spaced.to_lowercase());
        let words = normalized
            .split_whitespace()
            .filter(|word| word.chars().count() > 1 && !STOPWORDS.contains(word))
            .map(str::to_string)
            .collect();
        Self { normalized, words }
    }
}

/// How well a candidate title matches the search term that found it.
/// Ratios are per mille.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleMatch {
    pub exact: bool,
    /// Share of the term's words present in the candidate title.
    pub coverage: u16,
    /// Shared words over all distinct words of both titles.
    pub similarity: u16,
}

impl TitleMatch {
    const MIN_COVERAGE: u16 = 650;
    const MIN_SIMILARITY: u16 = 420;

    fn between(term: &TitleKey, candidate: &TitleKey) -> Self {
        let shared = term.words.intersection(&candidate.words).count();
        let distinct = term.words.union(&candidate.words).count();
        let per_mille = |part: usize, whole: usize| match whole {
            0 => 0,
            whole => (part * 1000 / whole) as u16,
        };

        Self {
            exact: !term.normalized.is_empty() && term.normalized == candidate.normalized,
            coverage: per_mille(shared, term.words.len()),
            similarity: per_mille(shared, distinct),
        }
    }

    pub fn is_acceptable(self) -> bool {
        self.exact
            || (self.coverage >= Self::MIN_COVERAGE && self.similarity >= Self::MIN_SIMILARITY)
    }
}

fn not_nan_or_zero(value: f64) -> NotNan<f64> {
    NotNan::new(value).unwrap_or_else(|_| NotNan::new(0.0).expect("0 is not NaN"))
}

/// Numeric ids first in numeric order, then the rest lexically.
fn cmp_provider_ids(a: &CandidateKey, b: &CandidateKey) -> Ordering {
    let sort_key = |key: &CandidateKey| {
        let numeric = key.provider_id.as_str().parse::<u64>().ok();
        (numeric.is_none(), numeric, key.provider_id.as_str().to_owned(), key.kind)
    };
    sort_key(a).cmp(&sort_key(b))
}

/// A merged candidate together with the sighting it is ranked by.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    /// Search term of the kept sighting.
    pub term: String,
    pub specificity: usize,
    pub kind_match: bool,
    pub title: TitleMatch,
}

impl RankedCandidate {
    fn new(candidate: Candidate, term: &str, expected: Option<MediaType>) -> Self {
        let title = TitleMatch::between(&TitleKey::new(term), &TitleKey::new(&candidate.title));
        let kind_match = expected.is_none_or(|kind| kind == candidate.kind);
        Self {
            candidate,
            term: term.to_string(),
            specificity: term_specificity(term),
            kind_match,
            title,
        }
    }

    /// Right kind and an acceptable title for the term that found it.
    pub fn is_plausible(&self) -> bool {
        self.kind_match && self.title.is_acceptable()
    }

    fn cmp_best(&self, other: &Self) -> Ordering {
        self.kind_match
            .cmp(&other.kind_match)
            .then_with(|| self.specificity.cmp(&other.specificity))
            .then_with(|| {
                not_nan_or_zero(self.candidate.match_score)
                    .cmp(&not_nan_or_zero(other.candidate.match_score))
            })
            // lower id wins the final tiebreak
            .then_with(|| cmp_provider_ids(&other.candidate.key(), &self.candidate.key()))
    }
}

/// What the worker has to do with a ranking.
#[derive(Debug, Clone, PartialEq)]
pub enum RankingOutcome {
    NoMatch,
    Confident(Candidate),
    /// Offer these to the user, best first.
    Ambiguous(Vec<Candidate>),
}

/// Deduplicated candidates, best first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking {
    ranked: Vec<RankedCandidate>,
}

impl Ranking {
    pub fn from_sightings(sightings: Vec<RankedCandidate>) -> Self {
        let mut merged: HashMap<CandidateKey, RankedCandidate> = HashMap::new();
        for sighting in sightings {
            let key = sighting.candidate.key();
            match merged.get_mut(&key) {
                None => {
                    merged.insert(key, sighting);
                }
                Some(kept) => {
                    let upgrade = (sighting.is_plausible() && !kept.is_plausible())
                        || (sighting.is_plausible() == kept.is_plausible()
                            && sighting.specificity > kept.specificity);
                    if upgrade {
                        *kept = sighting;
                    }
                }
            }
        }

        let mut ranked: Vec<RankedCandidate> = merged.into_values().collect();
        ranked.sort_by(|a, b| a.cmp_best(b).reverse());
        Self { ranked }
    }

    pub fn candidates(&self) -> &[RankedCandidate] {
        &self.ranked
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    pub fn plausible(&self) -> impl Iterator<Item = &RankedCandidate> {
        self.ranked.iter().filter(|ranked| ranked.is_plausible())
    }

    pub fn plausible_count(&self) -> usize {
        self.plausible().count()
    }

    pub fn outcome(&self) -> RankingOutcome {
        if self.ranked.is_empty() {
            return RankingOutcome::NoMatch;
        }

        let plausible: Vec<Candidate> = self.plausible().map(|r| r.candidate.clone()).collect();
        match plausible.len() {
            1 => plausible
                .into_iter()
                .next()
                .map_or(RankingOutcome::NoMatch, RankingOutcome::Confident),
            0 => RankingOutcome::Ambiguous(
                self.ranked.iter().map(|r| r.candidate.clone()).collect(),
            ),
            _ => RankingOutcome::Ambiguous(plausible),
        }
    }
}

/// Runs the search terms of one file against the gateway and ranks the
/// merged results.
#[derive(Debug, Clone)]
pub struct Aggregator {
    gateway: MetadataGateway,
    confident_results_target: usize,
}

impl Aggregator {
    pub fn new(gateway: MetadataGateway, confident_results_target: usize) -> Self {
        Self {
            gateway,
            confident_results_target: confident_results_target.max(1),
        }
    }

    pub fn gateway(&self) -> &MetadataGateway {
        &self.gateway
    }

    /// Queries terms in order until enough plausible candidates are found.
    ///
    /// A failing term is skipped. The last error is returned only when no
    /// term succeeded, and an unavailable provider ends the search at once.
    pub async fn aggregate(&self, parsed: &ParsedFilename) -> Result<Ranking, GatewayError> {
        let query = SearchQuery::from_parsed(parsed);
        let expected = parsed.kind.expected_type();

        let mut sightings = Vec::new();
        let mut last_error = None;
        let mut any_succeeded = false;

        for term in query.iter() {
            match self.gateway.search(term, expected).await {
                Ok(candidates) => {
                    any_succeeded = true;
                    debug!(term, found = candidates.len(), "search term answered");
                    sightings.extend(
                        candidates
                            .into_iter()
                            .map(|candidate| RankedCandidate::new(candidate, term, expected)),
                    );
                }
                Err(err @ GatewayError::Unavailable { .. }) => return Err(err),
                Err(err) => {
                    warn!(term, error = %err, "search term failed, trying next");
                    last_error = Some(err);
                    continue;
                }
            }

            let plausible = distinct_plausible(&sightings);
            if plausible >= self.confident_results_target {
                debug!(term, plausible, "enough plausible candidates");
                break;
            }
        }

        if !any_succeeded && let Some(err) = last_error {
            return Err(err);
        }

        Ok(Ranking::from_sightings(sightings))
    }
}

fn distinct_plausible(sightings: &[RankedCandidate]) -> usize {
    sightings
        .iter()
        .filter(|sighting| sighting.is_plausible())
        .map(|sighting| sighting.candidate.key())
        .collect::<HashSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaKind, ProviderId};
    use crate::parser::FilenameParser;
    use crate::providers::{MockMetadataProvider, ProviderError};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn candidate(id: u64, title: &str, year: Option<u16>, kind: MediaType, score: f64) -> Candidate {
        Candidate {
            provider_id: ProviderId::from(id),
            title: title.to_string(),
            year,
            kind,
            match_score: score,
        }
    }

    fn aggregator(mock: MockMetadataProvider) -> Aggregator {
        Aggregator::new(
            MetadataGateway::new(Arc::new(mock), Duration::from_secs(5)),
            1,
        )
    }

    #[test]
    fn title_acceptance_thresholds() {
        let accept = |query: &str, title: &str| {
            TitleMatch::between(&TitleKey::new(query), &TitleKey::new(title)).is_acceptable()
        };

        assert!(accept("sherlock", "Sherlock"));
        assert!(accept("sherlock holmes", "Sherlock Holmes"));
        assert!(accept("it welcome to derry", "IT: Welcome to Derry"));
        assert!(!accept("sherlock holmes bbc", "Sherlock"));
        assert!(!accept("heat", "Heat Wave Summer Nights"));
    }

    #[test]
    fn provider_ids_order_totally_across_numeric_and_textual_ids() {
        let key = |id: &str| CandidateKey {
            provider_id: ProviderId::from(id),
            kind: MediaType::Movie,
        };
        let mut keys = vec![key("1a"), key("10"), key("tt01"), key("9")];
        keys.sort_by(cmp_provider_ids);

        let ids: Vec<&str> = keys.iter().map(|k| k.provider_id.as_str()).collect();
        assert_eq!(ids, ["9", "10", "1a", "tt01"]);

        assert_eq!(cmp_provider_ids(&key("9"), &key("10")), Ordering::Less);
        assert_eq!(cmp_provider_ids(&key("10"), &key("1a")), Ordering::Less);
        assert_eq!(cmp_provider_ids(&key("9"), &key("1a")), Ordering::Less);
    }

    #[test]
    fn ranking_orders_kind_then_specificity_then_popularity_then_id() {
        let expected = Some(MediaType::Tv);
        let sightings = vec![
            RankedCandidate::new(candidate(5, "Sherlock", None, MediaType::Movie, 900.0), "sherlock", expected),
            RankedCandidate::new(candidate(9, "Sherlock", None, MediaType::Tv, 1.0), "sherlock", expected),
            RankedCandidate::new(candidate(10, "Sherlock", None, MediaType::Tv, 1.0), "sherlock", expected),
            RankedCandidate::new(candidate(3, "Sherlock Holmes", None, MediaType::Tv, 0.5), "sherlock holmes", expected),
            RankedCandidate::new(candidate(4, "Sherlock", None, MediaType::Tv, 50.0), "sherlock", expected),
        ];

        let ranking = Ranking::from_sightings(sightings);
        let ids: Vec<&str> = ranking
            .candidates()
            .iter()
            .map(|r| r.candidate.provider_id.as_str())
            .collect();
        assert_eq!(ids, ["3", "4", "9", "10", "5"]);
    }

    #[test]
    fn ranking_is_deterministic_regardless_of_input_order() {
        let expected = Some(MediaType::Movie);
        let mut sightings: Vec<RankedCandidate> = (1..=6)
            .map(|id| {
                RankedCandidate::new(
                    candidate(id, "Heat", Some(1995), MediaType::Movie, (id % 2) as f64),
                    "heat",
                    expected,
                )
            })
            .collect();

        let forward = Ranking::from_sightings(sightings.clone());
        sightings.reverse();
        let backward = Ranking::from_sightings(sightings);
        assert_eq!(forward, backward);
    }

    #[test]
    fn outcome_sends_implausible_results_to_the_user() {
        let expected = Some(MediaType::Movie);
        let ranking = Ranking::from_sightings(vec![RankedCandidate::new(
            candidate(1, "Completely Different", None, MediaType::Movie, 1.0),
            "heat",
            expected,
        )]);
        assert!(matches!(ranking.outcome(), RankingOutcome::Ambiguous(c) if c.len() == 1));
        assert_eq!(Ranking::default().outcome(), RankingOutcome::NoMatch);
    }

    #[tokio::test]
    async fn first_term_with_a_tv_candidate_wins() {
        let asked = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&asked);

        let mut mock = MockMetadataProvider::new();
        mock.expect_name().return_const("mock");
        mock.expect_search().returning(move |term, _| {
            log.lock().unwrap().push(term.to_string());
            Ok(match term {
                "sherlock holmes bbc" => Vec::new(),
                "sherlock holmes" => vec![
                    candidate(48, "Sherlock Holmes", Some(2009), MediaType::Movie, 90.0),
                    candidate(7, "Sherlock Holmes", Some(1954), MediaType::Tv, 2.0),
                ],
                _ => vec![candidate(19885, "Sherlock", Some(2010), MediaType::Tv, 80.0)],
            })
        });

        let parsed = FilenameParser::new().parse("Sherlock.Holmes.BBC.S01E01.mkv");
        assert_eq!(parsed.kind, MediaKind::Episode);
        let ranking = aggregator(mock).aggregate(&parsed).await.unwrap();

        assert_eq!(*asked.lock().unwrap(), ["sherlock holmes bbc", "sherlock holmes"]);
        match ranking.outcome() {
            RankingOutcome::Confident(best) => assert_eq!(best.provider_id, ProviderId::from(7)),
            other => panic!("expected a confident match, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failing_terms_are_skipped_and_last_error_surfaces_when_all_fail() {
        let mut mock = MockMetadataProvider::new();
        mock.expect_name().return_const("mock");
        mock.expect_search().returning(|term, _| match term {
            "heat" => Ok(vec![candidate(949, "Heat", Some(1995), MediaType::Movie, 30.0)]),
            _ => Err(ProviderError::RateLimited),
        });
        let ranking = aggregator(mock)
            .aggregate(&FilenameParser::new().parse("Heat.Los.Angeles.mkv"))
            .await;
        assert!(matches!(ranking.map(|r| r.outcome()), Ok(RankingOutcome::Confident(_))));

        let mut mock = MockMetadataProvider::new();
        mock.expect_name().return_const("mock");
        mock.expect_search()
            .returning(|_, _| Err(ProviderError::ApiError("boom".into())));
        let err = aggregator(mock)
            .aggregate(&FilenameParser::new().parse("Two Words.mkv"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unexpected { .. }));
    }

    #[tokio::test]
    async fn unavailable_provider_stops_immediately() {
        let mut mock = MockMetadataProvider::new();
        mock.expect_name().return_const("mock");
        mock.expect_search()
            .times(1)
            .returning(|_, _| Err(ProviderError::InvalidApiKey));

        let err = aggregator(mock)
            .aggregate(&FilenameParser::new().parse("The.Long.Title.Here.mkv"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable { .. }));
    }
}
